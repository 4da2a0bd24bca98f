use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Proxy, Response};
use tracing::{debug, warn};

use crate::auth::BasicCredentials;
use crate::error::{Result, TransportError, WorkdayError};

/// Configuration for the shared HTTP session
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Whole-request timeout, applied to every call of the session
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Route all HTTPS traffic through this proxy
    pub proxy_url: Option<String>,
    /// Accept any server certificate. Opt-in only; exposes calls to interception.
    pub disable_ssl_verification: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("workday-soap/{}", env!("CARGO_PKG_VERSION")),
            proxy_url: None,
            disable_ssl_verification: false,
        }
    }
}

/// A SOAP message ready to be posted.
#[derive(Debug, Clone)]
pub struct SoapRequest<'a> {
    pub endpoint: &'a str,
    pub body: String,
    pub content_type: &'a str,
    /// Value for the SOAP 1.1 `SOAPAction` header
    pub soap_action: Option<&'a str>,
    pub http_basic: Option<&'a BasicCredentials>,
}

/// Raw HTTP reply to a SOAP request. Faults arrive with 500, so the status is
/// left for the caller to interpret.
#[derive(Debug, Clone)]
pub struct SoapReply {
    pub status: u16,
    pub body: String,
}

/// The HTTP session shared by every service proxy of one client.
///
/// Cloning is cheap: clones share the same connection pool and settings.
#[derive(Debug, Clone)]
pub struct HttpSession {
    client: Client,
    config: HttpClientConfig,
}

impl HttpSession {
    /// Create a new session with the given configuration
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        // Environment proxy variables are ignored; only the configured proxy applies
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .pool_idle_timeout(Duration::from_secs(30))
            .no_proxy();

        if let Some(proxy_url) = &config.proxy_url {
            let proxy = Proxy::https(proxy_url.as_str()).map_err(|e| {
                WorkdayError::InvalidArgument(format!("invalid proxy URL '{}': {}", proxy_url, e))
            })?;
            builder = builder.proxy(proxy);
        }

        if config.disable_ssl_verification {
            warn!("TLS certificate verification is disabled for this session");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(TransportError::from)?;

        Ok(Self { client, config })
    }

    /// Fetch a document (a WSDL) as text
    pub async fn get_text(
        &self,
        url: &str,
        http_basic: Option<&BasicCredentials>,
    ) -> std::result::Result<String, TransportError> {
        debug!(%url, "fetching document");

        let mut request = self.client.get(url);
        if let Some(credentials) = http_basic {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = request.send().await.map_err(|e| self.map_send_error(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(url, status.as_u16()));
        }

        self.read_body(url, response).await
    }

    /// Post a SOAP envelope and return the reply, whatever its status
    pub async fn post_soap(
        &self,
        request: SoapRequest<'_>,
    ) -> std::result::Result<SoapReply, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(request.content_type)
                .map_err(|e| TransportError::Xml(format!("invalid content type: {}", e)))?,
        );
        if let Some(action) = request.soap_action {
            headers.insert(
                "SOAPAction",
                HeaderValue::from_str(&format!("\"{}\"", action))
                    .map_err(|e| TransportError::Xml(format!("invalid SOAPAction: {}", e)))?,
            );
        }

        let mut builder = self
            .client
            .post(request.endpoint)
            .headers(headers)
            .body(request.body);
        if let Some(credentials) = request.http_basic {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
        }

        debug!(endpoint = %request.endpoint, action = ?request.soap_action, "posting SOAP request");
        let response = builder
            .send()
            .await
            .map_err(|e| self.map_send_error(request.endpoint, e))?;

        let status = response.status().as_u16();
        let body = self.read_body(request.endpoint, response).await?;
        debug!(endpoint = %request.endpoint, status, bytes = body.len(), "received SOAP reply");

        Ok(SoapReply { status, body })
    }

    fn map_send_error(&self, url: &str, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
                timeout: self.config.timeout,
            }
        } else {
            TransportError::Http(error)
        }
    }

    // The timeout also covers streaming the body, so read errors go through the same mapping
    async fn read_body(
        &self,
        url: &str,
        response: Response,
    ) -> std::result::Result<String, TransportError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_send_error(url, e))?;
        String::from_utf8(bytes.to_vec()).map_err(|_| {
            TransportError::Xml(format!("response body from {} is not valid UTF-8", url))
        })
    }

    /// Get the underlying reqwest client (for advanced usage)
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get the session configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

pub(crate) fn status_error(url: &str, status: u16) -> TransportError {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    TransportError::HttpStatus {
        url: url.to_string(),
        status,
        message: format!("HTTP {}: {}", status, reason),
    }
}
