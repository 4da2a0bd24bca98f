use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use mockall::mock;
use serde_json::{Map, Value};
use workday_soap::{EngineError, ServiceBinding, SignatureBackend, SigningMaterial};

mock! {
    pub Binding {}

    #[async_trait]
    impl ServiceBinding for Binding {
        fn operations(&self) -> Vec<String>;

        async fn call(
            &self,
            operation: &str,
            args: &[Value],
            kwargs: &Map<String, Value>,
        ) -> Result<Value, EngineError>;
    }
}

/// Signs with a fixed value and records what it was asked to sign
#[derive(Default)]
pub struct StaticSignatureBackend {
    calls: AtomicUsize,
    last_signed_info: Mutex<Vec<u8>>,
}

impl StaticSignatureBackend {
    pub const SIGNATURE: &'static [u8] = b"static-test-signature";

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_signed_info(&self) -> String {
        String::from_utf8(self.last_signed_info.lock().unwrap().clone()).unwrap()
    }
}

impl SignatureBackend for StaticSignatureBackend {
    fn sign(&self, material: &SigningMaterial, signed_info: &[u8]) -> Result<Vec<u8>, String> {
        if !material.private_key_pem.contains("PRIVATE KEY") {
            return Err("not a private key".to_string());
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_signed_info.lock().unwrap() = signed_info.to_vec();
        Ok(Self::SIGNATURE.to_vec())
    }
}
