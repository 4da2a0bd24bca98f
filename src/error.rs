use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Main library error type covering every failure a caller can observe
#[derive(Error, Debug)]
pub enum WorkdayError {
    /// Invalid or unusable authentication inputs (empty fields, unreadable key files)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The WSDL mapping handed to the client is not a mapping at all
    #[error("Invalid WSDL mapping: {0}")]
    InvalidWsdlMapping(String),

    /// A constructor or call argument has the right shape but an unusable value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("API '{api}' was not loaded")]
    WsdlNotProvided { api: String },

    /// Application-level fault returned by the remote service
    #[error("SOAP API error: {0}")]
    SoapApi(SoapFault),

    #[error("Malformed response: missing or invalid '{field}'")]
    MalformedResponse { field: String },

    #[error("Operation '{operation}' is not defined by the service")]
    OperationNotFound { operation: String },

    /// Transport-level failures, passed through untranslated
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures of the HTTP transport or of reading the documents it returned
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status error: {status} for {url} - {message}")]
    HttpStatus {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Request timeout: {url} after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("WSDL error: {url} - {details}")]
    Wsdl { url: String, details: String },

    #[error("XML parsing error: {0}")]
    Xml(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A SOAP fault as reported by the server.
///
/// `code` and `message` come from `faultcode`/`faultstring` (SOAP 1.1) or
/// `Code/Value`/`Reason/Text` (SOAP 1.2). `detail` holds the converted
/// contents of the detail element, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoapFault {
    pub code: String,
    pub message: String,
    pub actor: Option<String>,
    pub detail: Option<Value>,
}

impl SoapFault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            actor: None,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

impl fmt::Display for SoapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl WorkdayError {
    /// The server fault, when this error is one.
    pub fn fault(&self) -> Option<&SoapFault> {
        match self {
            WorkdayError::SoapApi(fault) => Some(fault),
            _ => None,
        }
    }

    pub(crate) fn malformed(field: impl Into<String>) -> Self {
        WorkdayError::MalformedResponse {
            field: field.into(),
        }
    }
}

impl From<crate::config::ConfigError> for WorkdayError {
    fn from(err: crate::config::ConfigError) -> Self {
        WorkdayError::Configuration(err.to_string())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, WorkdayError>;
