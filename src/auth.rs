//! Authentication strategies.
//!
//! A strategy turns credential material into the [`SecurityParameters`] the
//! SOAP engine attaches to every request of a service binding. Strategies are
//! plain immutable data; credentials are only checked (and key files only
//! read) when parameters are requested, which happens when a service proxy
//! is first built.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use crate::error::{Result, WorkdayError};

/// Capability implemented by anything that can authenticate SOAP calls.
pub trait Authentication: Send + Sync {
    /// Build the security parameters for the SOAP engine.
    fn security_parameters(&self) -> Result<SecurityParameters>;

    /// Short name of the strategy, used in logs.
    fn describe(&self) -> &'static str;
}

/// Everything the engine needs to secure a request.
#[derive(Clone, Default, PartialEq)]
pub struct SecurityParameters {
    /// WS-Security tokens, in the order they must appear in the header
    pub tokens: Vec<SecurityToken>,
    /// Credentials sent as an HTTP `Authorization: Basic` header
    pub http_basic: Option<BasicCredentials>,
}

impl SecurityParameters {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.http_basic.is_none()
    }
}

impl fmt::Debug for SecurityParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityParameters")
            .field("tokens", &self.tokens)
            .field("http_basic", &self.http_basic.as_ref().map(|c| &c.username))
            .finish()
    }
}

#[derive(Clone, PartialEq)]
pub enum SecurityToken {
    /// Plaintext WS-Security UsernameToken
    UsernameToken { username: String, password: String },
    /// XML signature over the message, made with the given key material
    Signature(SigningMaterial),
}

impl fmt::Debug for SecurityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityToken::UsernameToken { username, .. } => f
                .debug_struct("UsernameToken")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            SecurityToken::Signature(material) => {
                f.debug_tuple("Signature").field(material).finish()
            }
        }
    }
}

/// PEM key material loaded from disk for signing.
#[derive(Clone, PartialEq)]
pub struct SigningMaterial {
    pub private_key_pem: String,
    pub certificate_pem: String,
    pub passphrase: Option<String>,
    pub private_key_path: PathBuf,
    pub certificate_path: PathBuf,
}

impl SigningMaterial {
    /// DER bytes of the certificate, base64 encoded, as carried in a BinarySecurityToken.
    pub fn certificate_base64(&self) -> Result<String> {
        let der = pem_body(&self.certificate_pem, "CERTIFICATE").ok_or_else(|| {
            WorkdayError::Configuration(format!(
                "{} does not contain a PEM certificate",
                self.certificate_path.display()
            ))
        })?;
        Ok(STANDARD.encode(der))
    }
}

impl fmt::Debug for SigningMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningMaterial")
            .field("private_key_path", &self.private_key_path)
            .field("certificate_path", &self.certificate_path)
            .field("has_passphrase", &self.passphrase.is_some())
            .finish()
    }
}

#[derive(Clone, PartialEq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Built-in authentication strategies.
///
/// Deserializes from a tagged table, e.g. `mode = "username_password"`.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthStrategy {
    Anonymous,
    UsernamePassword {
        username: String,
        password: String,
    },
    CertificateSignature {
        private_key_path: PathBuf,
        certificate_path: PathBuf,
        #[serde(default)]
        passphrase: Option<String>,
    },
    UsernamePasswordCertificateSignature {
        username: String,
        password: String,
        private_key_path: PathBuf,
        certificate_path: PathBuf,
        #[serde(default)]
        passphrase: Option<String>,
    },
    /// HTTP basic authentication on the transport instead of WS-Security
    HttpBasic {
        username: String,
        password: String,
    },
}

impl AuthStrategy {
    pub fn anonymous() -> Self {
        AuthStrategy::Anonymous
    }

    pub fn username_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        AuthStrategy::UsernamePassword {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn certificate(
        private_key_path: impl Into<PathBuf>,
        certificate_path: impl Into<PathBuf>,
        passphrase: Option<String>,
    ) -> Self {
        AuthStrategy::CertificateSignature {
            private_key_path: private_key_path.into(),
            certificate_path: certificate_path.into(),
            passphrase,
        }
    }

    pub fn username_password_certificate(
        username: impl Into<String>,
        password: impl Into<String>,
        private_key_path: impl Into<PathBuf>,
        certificate_path: impl Into<PathBuf>,
        passphrase: Option<String>,
    ) -> Self {
        AuthStrategy::UsernamePasswordCertificateSignature {
            username: username.into(),
            password: password.into(),
            private_key_path: private_key_path.into(),
            certificate_path: certificate_path.into(),
            passphrase,
        }
    }

    pub fn http_basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        AuthStrategy::HttpBasic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Replace the username/password of the variants that carry them.
    pub fn with_credentials(self, new_username: Option<String>, new_password: Option<String>) -> Self {
        match self {
            AuthStrategy::UsernamePassword { username, password } => AuthStrategy::UsernamePassword {
                username: new_username.unwrap_or(username),
                password: new_password.unwrap_or(password),
            },
            AuthStrategy::HttpBasic { username, password } => AuthStrategy::HttpBasic {
                username: new_username.unwrap_or(username),
                password: new_password.unwrap_or(password),
            },
            AuthStrategy::UsernamePasswordCertificateSignature {
                username,
                password,
                private_key_path,
                certificate_path,
                passphrase,
            } => AuthStrategy::UsernamePasswordCertificateSignature {
                username: new_username.unwrap_or(username),
                password: new_password.unwrap_or(password),
                private_key_path,
                certificate_path,
                passphrase,
            },
            other => other,
        }
    }
}

impl Authentication for AuthStrategy {
    fn security_parameters(&self) -> Result<SecurityParameters> {
        match self {
            AuthStrategy::Anonymous => Ok(SecurityParameters::default()),
            AuthStrategy::UsernamePassword { username, password } => Ok(SecurityParameters {
                tokens: vec![username_token(username, password)?],
                http_basic: None,
            }),
            AuthStrategy::CertificateSignature {
                private_key_path,
                certificate_path,
                passphrase,
            } => Ok(SecurityParameters {
                tokens: vec![signature_token(
                    private_key_path,
                    certificate_path,
                    passphrase.as_deref(),
                )?],
                http_basic: None,
            }),
            AuthStrategy::UsernamePasswordCertificateSignature {
                username,
                password,
                private_key_path,
                certificate_path,
                passphrase,
            } => Ok(SecurityParameters {
                tokens: vec![
                    username_token(username, password)?,
                    signature_token(private_key_path, certificate_path, passphrase.as_deref())?,
                ],
                http_basic: None,
            }),
            AuthStrategy::HttpBasic { username, password } => {
                require("username", username)?;
                Ok(SecurityParameters {
                    tokens: Vec::new(),
                    http_basic: Some(BasicCredentials {
                        username: username.clone(),
                        password: password.clone(),
                    }),
                })
            }
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            AuthStrategy::Anonymous => "anonymous",
            AuthStrategy::UsernamePassword { .. } => "username_password",
            AuthStrategy::CertificateSignature { .. } => "certificate_signature",
            AuthStrategy::UsernamePasswordCertificateSignature { .. } => {
                "username_password_certificate_signature"
            }
            AuthStrategy::HttpBasic { .. } => "http_basic",
        }
    }
}

impl fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStrategy::Anonymous => f.write_str("Anonymous"),
            AuthStrategy::UsernamePassword { username, .. } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .finish_non_exhaustive(),
            AuthStrategy::CertificateSignature {
                private_key_path,
                certificate_path,
                ..
            } => f
                .debug_struct("CertificateSignature")
                .field("private_key_path", private_key_path)
                .field("certificate_path", certificate_path)
                .finish_non_exhaustive(),
            AuthStrategy::UsernamePasswordCertificateSignature {
                username,
                private_key_path,
                certificate_path,
                ..
            } => f
                .debug_struct("UsernamePasswordCertificateSignature")
                .field("username", username)
                .field("private_key_path", private_key_path)
                .field("certificate_path", certificate_path)
                .finish_non_exhaustive(),
            AuthStrategy::HttpBasic { username, .. } => f
                .debug_struct("HttpBasic")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(WorkdayError::Configuration(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

fn username_token(username: &str, password: &str) -> Result<SecurityToken> {
    require("username", username)?;
    Ok(SecurityToken::UsernameToken {
        username: username.to_string(),
        password: password.to_string(),
    })
}

fn signature_token(
    private_key_path: &Path,
    certificate_path: &Path,
    passphrase: Option<&str>,
) -> Result<SecurityToken> {
    let private_key_pem = read_pem(private_key_path, "private key", "PRIVATE KEY")?;
    let certificate_pem = read_pem(certificate_path, "certificate", "CERTIFICATE")?;

    Ok(SecurityToken::Signature(SigningMaterial {
        private_key_pem,
        certificate_pem,
        passphrase: passphrase.map(str::to_string),
        private_key_path: private_key_path.to_path_buf(),
        certificate_path: certificate_path.to_path_buf(),
    }))
}

fn read_pem(path: &Path, what: &str, label: &str) -> Result<String> {
    if path.as_os_str().is_empty() {
        return Err(WorkdayError::Configuration(format!(
            "{} path must not be empty",
            what
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        WorkdayError::Configuration(format!(
            "cannot read {} file {}: {}",
            what,
            path.display(),
            e
        ))
    })?;

    if pem_body(&content, label).is_none() {
        return Err(WorkdayError::Configuration(format!(
            "{} does not contain PEM {} data",
            path.display(),
            what
        )));
    }

    Ok(content)
}

/// Decode the first PEM block whose label ends with `label`
/// (so "PRIVATE KEY" also matches "RSA PRIVATE KEY" and "ENCRYPTED PRIVATE KEY").
fn pem_body(pem: &str, label: &str) -> Option<Vec<u8>> {
    let mut lines = pem.lines().map(str::trim);
    lines.find(|line| {
        line.strip_prefix("-----BEGIN ")
            .and_then(|rest| rest.strip_suffix("-----"))
            .is_some_and(|found| found.ends_with(label))
    })?;

    let mut body = String::new();
    for line in lines {
        if line.starts_with("-----END ") {
            return STANDARD.decode(body.as_bytes()).ok();
        }
        // Encrypted legacy keys carry "Proc-Type:"/"DEK-Info:" headers
        if line.contains(':') {
            continue;
        }
        body.push_str(line);
    }
    None
}
