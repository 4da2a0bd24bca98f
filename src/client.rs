//! The Workday client: a set of named APIs sharing one HTTP session and one
//! authentication strategy.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::auth::Authentication;
use crate::engine::{HttpSoapEngine, SoapEngine};
use crate::error::{Result, WorkdayError};
use crate::http_client::{HttpClientConfig, HttpSession};
use crate::proxy::ServiceProxy;
use crate::wsse::SignatureBackend;

/// Validated mapping of API name to WSDL base URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WsdlMap {
    entries: BTreeMap<String, String>,
}

impl WsdlMap {
    /// Build from name/URL pairs. Empty URLs are rejected.
    pub fn new<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (name, url) in entries {
            let name = name.into();
            let url = url.into();
            if url.trim().is_empty() {
                return Err(WorkdayError::InvalidArgument(format!(
                    "WSDL URL for API '{}' must be a non-empty string",
                    name
                )));
            }
            map.insert(name, url);
        }
        Ok(Self { entries: map })
    }

    /// Build from an untyped value, such as a configuration table.
    ///
    /// Fails with `InvalidWsdlMapping` when `value` is not an object, and with
    /// `InvalidArgument` when any entry is not a non-empty string.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            WorkdayError::InvalidWsdlMapping(format!(
                "expected a mapping of API names to WSDL URLs, got {}",
                type_name(value)
            ))
        })?;

        let mut entries = Vec::with_capacity(object.len());
        for (name, url) in object {
            let url = url.as_str().ok_or_else(|| {
                WorkdayError::InvalidArgument(format!(
                    "WSDL URL for API '{}' must be a string, got {}",
                    name,
                    type_name(url)
                ))
            })?;
            entries.push((name.clone(), url.to_string()));
        }
        Self::new(entries)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<HashMap<String, String>> for WsdlMap {
    type Error = WorkdayError;

    fn try_from(map: HashMap<String, String>) -> Result<Self> {
        Self::new(map)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

/// Location of the WSDL document for a configured API URL.
pub fn wsdl_endpoint(base_url: &str) -> String {
    if base_url.to_ascii_lowercase().ends_with("?wsdl") {
        base_url.to_string()
    } else if base_url.contains('?') {
        format!("{}&wsdl", base_url)
    } else {
        format!("{}?wsdl", base_url)
    }
}

struct ApiEntry {
    wsdl_url: String,
    proxy: OnceCell<Arc<ServiceProxy>>,
}

/// Client for one Workday tenant.
///
/// Each configured API is bound on first access through [`WorkdayClient::api`]
/// and the resulting proxy is reused for the lifetime of the client.
pub struct WorkdayClient {
    session: HttpSession,
    authentication: Arc<dyn Authentication>,
    engine: Arc<dyn SoapEngine>,
    apis: BTreeMap<String, ApiEntry>,
}

impl WorkdayClient {
    /// Client with default network settings and the built-in engine.
    pub fn new(
        wsdls: HashMap<String, String>,
        authentication: impl Authentication + 'static,
    ) -> Result<Self> {
        Self::builder(WsdlMap::try_from(wsdls)?, Arc::new(authentication)).build()
    }

    pub fn builder(wsdls: WsdlMap, authentication: Arc<dyn Authentication>) -> WorkdayClientBuilder {
        WorkdayClientBuilder {
            wsdls,
            authentication,
            http: HttpClientConfig::default(),
            engine: None,
            signature_backend: None,
        }
    }

    /// The proxy for `name`, built on first access.
    ///
    /// Concurrent first accesses build the proxy once. A failed build is not
    /// cached.
    pub async fn api(&self, name: &str) -> Result<Arc<ServiceProxy>> {
        let entry = self
            .apis
            .get(name)
            .ok_or_else(|| WorkdayError::WsdlNotProvided {
                api: name.to_string(),
            })?;

        let proxy = entry
            .proxy
            .get_or_try_init(|| async {
                let wsdl_url = wsdl_endpoint(&entry.wsdl_url);
                debug!(api = name, %wsdl_url, "binding API");
                ServiceProxy::connect(
                    name,
                    &wsdl_url,
                    &self.session,
                    self.authentication.as_ref(),
                    self.engine.as_ref(),
                )
                .await
                .map(Arc::new)
            })
            .await?;

        Ok(Arc::clone(proxy))
    }

    /// Configured API names, sorted.
    pub fn api_names(&self) -> Vec<&str> {
        self.apis.keys().map(String::as_str).collect()
    }

    /// Whether the proxy for `name` has already been built.
    pub fn is_resolved(&self, name: &str) -> bool {
        self.apis
            .get(name)
            .is_some_and(|entry| entry.proxy.initialized())
    }

    /// Configured base URL for `name`, without `?wsdl`.
    pub fn wsdl_url(&self, name: &str) -> Option<&str> {
        self.apis.get(name).map(|entry| entry.wsdl_url.as_str())
    }

    pub fn session(&self) -> &HttpSession {
        &self.session
    }
}

impl std::fmt::Debug for WorkdayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkdayClient")
            .field("apis", &self.api_names())
            .field("authentication", &self.authentication.describe())
            .finish()
    }
}

/// Builder for [`WorkdayClient`].
pub struct WorkdayClientBuilder {
    wsdls: WsdlMap,
    authentication: Arc<dyn Authentication>,
    http: HttpClientConfig,
    engine: Option<Arc<dyn SoapEngine>>,
    signature_backend: Option<Arc<dyn SignatureBackend>>,
}

impl WorkdayClientBuilder {
    /// Route all HTTPS traffic through `proxy_url`.
    pub fn proxy_url(mut self, proxy_url: impl Into<String>) -> Self {
        self.http.proxy_url = Some(proxy_url.into());
        self
    }

    pub fn disable_ssl_verification(mut self, disable: bool) -> Self {
        self.http.disable_ssl_verification = disable;
        self
    }

    /// Whole-request timeout. Sub-second values are kept as given.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.http.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.http.user_agent = user_agent.into();
        self
    }

    /// Replace all network settings at once.
    pub fn http_config(mut self, config: HttpClientConfig) -> Self {
        self.http = config;
        self
    }

    /// Use a custom engine instead of [`HttpSoapEngine`].
    pub fn engine(mut self, engine: Arc<dyn SoapEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Signer for certificate-based strategies. Ignored when a custom engine is set.
    pub fn signature_backend(mut self, backend: Arc<dyn SignatureBackend>) -> Self {
        self.signature_backend = Some(backend);
        self
    }

    pub fn build(self) -> Result<WorkdayClient> {
        if self
            .http
            .proxy_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            return Err(WorkdayError::InvalidArgument(
                "proxy URL must not be empty".to_string(),
            ));
        }

        let session = HttpSession::new(self.http)?;
        let engine = match self.engine {
            Some(engine) => engine,
            None => {
                let mut engine = HttpSoapEngine::new();
                if let Some(backend) = self.signature_backend {
                    engine = engine.with_signature_backend(backend);
                }
                Arc::new(engine)
            }
        };

        let apis = self
            .wsdls
            .entries
            .into_iter()
            .map(|(name, wsdl_url)| {
                (
                    name,
                    ApiEntry {
                        wsdl_url,
                        proxy: OnceCell::new(),
                    },
                )
            })
            .collect();

        Ok(WorkdayClient {
            session,
            authentication: self.authentication,
            engine,
            apis,
        })
    }
}
