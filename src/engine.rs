//! The SOAP engine seam.
//!
//! A [`SoapEngine`] turns a WSDL URL plus session and security parameters
//! into a [`ServiceBinding`], which exposes the service's operations. The
//! client only depends on these traits; [`HttpSoapEngine`] is the default
//! implementation built on reqwest and the WSDL reader in this crate.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::auth::SecurityParameters;
use crate::envelope::{self, SoapResponse};
use crate::error::{Result, SoapFault, TransportError, WorkdayError};
use crate::http_client::{HttpSession, SoapRequest, status_error};
use crate::wsdl::{ServiceDefinition, SoapVersion, load_wsdl};
use crate::wsse::{SignatureBackend, requires_signature};

/// Failures a binding reports for a single call.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The server answered with a SOAP fault
    #[error("SOAP fault: {0}")]
    Fault(SoapFault),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    /// Arguments that cannot be mapped onto the operation's input
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The request could not be secured (missing signer, unreadable key)
    #[error("security error: {0}")]
    Security(String),
}

impl From<EngineError> for WorkdayError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Fault(fault) => WorkdayError::SoapApi(fault),
            EngineError::Transport(e) => WorkdayError::Transport(e),
            EngineError::UnknownOperation(operation) => {
                WorkdayError::OperationNotFound { operation }
            }
            EngineError::InvalidArguments(msg) => WorkdayError::InvalidArgument(msg),
            EngineError::Security(msg) => WorkdayError::Configuration(msg),
        }
    }
}

/// Inputs for binding one API.
#[derive(Debug)]
pub struct BindRequest<'a> {
    /// Client-side API name, for logs
    pub api: &'a str,
    /// WSDL location, `?wsdl` already applied
    pub wsdl_url: &'a str,
    pub session: &'a HttpSession,
    pub security: SecurityParameters,
}

/// Builds service bindings from WSDLs.
#[async_trait]
pub trait SoapEngine: Send + Sync {
    async fn bind(&self, request: BindRequest<'_>) -> Result<Arc<dyn ServiceBinding>>;
}

/// A bound service: the set of operations one WSDL describes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceBinding: Send + Sync {
    /// Names of the operations the service exposes, sorted.
    fn operations(&self) -> Vec<String>;

    /// Invoke `operation` and return its decoded response payload.
    async fn call(
        &self,
        operation: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> std::result::Result<Value, EngineError>;
}

/// Default engine: fetches the WSDL over the client session and posts
/// envelopes to the endpoint it declares.
#[derive(Clone, Default)]
pub struct HttpSoapEngine {
    signature_backend: Option<Arc<dyn SignatureBackend>>,
}

impl HttpSoapEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `backend` to sign requests for certificate-based strategies.
    pub fn with_signature_backend(mut self, backend: Arc<dyn SignatureBackend>) -> Self {
        self.signature_backend = Some(backend);
        self
    }
}

#[async_trait]
impl SoapEngine for HttpSoapEngine {
    #[instrument(skip(self, request), fields(api = request.api, wsdl = request.wsdl_url))]
    async fn bind(&self, request: BindRequest<'_>) -> Result<Arc<dyn ServiceBinding>> {
        if requires_signature(&request.security.tokens) && self.signature_backend.is_none() {
            return Err(WorkdayError::Configuration(format!(
                "API '{}' uses certificate signing but no signature backend is configured",
                request.api
            )));
        }

        let definition = load_wsdl(
            request.session,
            request.wsdl_url,
            request.security.http_basic.as_ref(),
        )
        .await?;

        let binding = HttpServiceBinding::new(
            definition,
            request.session.clone(),
            request.security,
            self.signature_backend.clone(),
        );
        debug!(
            endpoint = %binding.definition().endpoint,
            operations = binding.operations().len(),
            "service bound"
        );
        Ok(Arc::new(binding))
    }
}

/// Binding produced by [`HttpSoapEngine`].
pub struct HttpServiceBinding {
    definition: ServiceDefinition,
    session: HttpSession,
    security: SecurityParameters,
    signature_backend: Option<Arc<dyn SignatureBackend>>,
}

impl HttpServiceBinding {
    /// `signature_backend` is required for calls whose security carries a
    /// signature token; without it those calls fail with [`EngineError::Security`].
    pub fn new(
        definition: ServiceDefinition,
        session: HttpSession,
        security: SecurityParameters,
        signature_backend: Option<Arc<dyn SignatureBackend>>,
    ) -> Self {
        Self {
            definition,
            session,
            security,
            signature_backend,
        }
    }

    pub fn definition(&self) -> &ServiceDefinition {
        &self.definition
    }
}

#[async_trait]
impl ServiceBinding for HttpServiceBinding {
    fn operations(&self) -> Vec<String> {
        self.definition.operation_names()
    }

    async fn call(
        &self,
        operation: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> std::result::Result<Value, EngineError> {
        let info = self
            .definition
            .operation(operation)
            .ok_or_else(|| EngineError::UnknownOperation(operation.to_string()))?;

        let version = self.definition.soap_version;
        let body = envelope::build_request(
            version,
            info,
            args,
            kwargs,
            &self.security,
            self.signature_backend.as_deref(),
        )?;
        let action = info.soap_action.as_deref();
        let content_type = envelope::content_type(version, action);
        let soap_action = match version {
            SoapVersion::Soap11 => Some(action.unwrap_or("")),
            SoapVersion::Soap12 => None,
        };

        let reply = self
            .session
            .post_soap(SoapRequest {
                endpoint: &self.definition.endpoint,
                body,
                content_type: &content_type,
                soap_action,
                http_basic: self.security.http_basic.as_ref(),
            })
            .await?;

        let success = (200..300).contains(&reply.status);
        match envelope::parse_response(&reply.body) {
            Ok(SoapResponse::Fault(fault)) => {
                debug!(operation, code = %fault.code, "service returned a fault");
                Err(EngineError::Fault(fault))
            }
            Ok(SoapResponse::Payload(value)) if success => Ok(value),
            Ok(SoapResponse::Payload(_)) => Err(EngineError::Transport(status_error(
                &self.definition.endpoint,
                reply.status,
            ))),
            Err(_) if !success => Err(EngineError::Transport(status_error(
                &self.definition.endpoint,
                reply.status,
            ))),
            Err(e) => Err(EngineError::Transport(e)),
        }
    }
}
