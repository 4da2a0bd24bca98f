//! WS-Security header rendering.
//!
//! UsernameTokens are rendered as plain text. Signatures cover the SOAP Body
//! and a Timestamp; both are emitted in their exclusive-canonical form so the
//! SHA-256 digests can be computed over the exact bytes that go on the wire.
//! Producing the RSA signature value itself is left to a [`SignatureBackend`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::{SecurityToken, SigningMaterial};
use crate::engine::EngineError;
use crate::xml::{DSIG_NS, WSSE_NS, WSU_NS};

pub const PASSWORD_TEXT: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordText";
pub const X509_V3: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-x509-token-profile-1.0#X509v3";
pub const BASE64_BINARY: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const SHA256_DIGEST: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

/// How long a signed message stays valid
const TIMESTAMP_TTL_SECONDS: i64 = 300;

/// Produces raw signature bytes for a canonical `SignedInfo` element.
///
/// Implementations typically wrap an RSA or ECDSA library and load the
/// private key from `material.private_key_pem`, decrypting it with
/// `material.passphrase` when present.
pub trait SignatureBackend: Send + Sync {
    /// Algorithm URI written into `SignatureMethod`.
    fn signature_method(&self) -> &str {
        RSA_SHA256
    }

    fn sign(&self, material: &SigningMaterial, signed_info: &[u8]) -> Result<Vec<u8>, String>;
}

/// A Body prepared for signing: its `wsu:Id` and canonical serialization.
#[derive(Debug, Clone)]
pub struct SignedBody {
    pub id: String,
    pub xml: String,
}

pub fn requires_signature(tokens: &[SecurityToken]) -> bool {
    tokens
        .iter()
        .any(|t| matches!(t, SecurityToken::Signature(_)))
}

pub fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

/// Render `<wsse:Security>` for the given tokens, in order.
///
/// `body` must be provided whenever a signature token is present.
pub fn render_security_header(
    tokens: &[SecurityToken],
    body: Option<&SignedBody>,
    backend: Option<&dyn SignatureBackend>,
    now: DateTime<Utc>,
) -> Result<String, EngineError> {
    let mut out = format!(
        r#"<wsse:Security xmlns:wsse="{}" xmlns:wsu="{}">"#,
        WSSE_NS, WSU_NS
    );

    for token in tokens {
        match token {
            SecurityToken::UsernameToken { username, password } => {
                out.push_str(&format!(
                    r#"<wsse:UsernameToken wsu:Id="{}"><wsse:Username>{}</wsse:Username><wsse:Password Type="{}">{}</wsse:Password></wsse:UsernameToken>"#,
                    new_id("UsernameToken"),
                    escape_text(username),
                    PASSWORD_TEXT,
                    escape_text(password)
                ));
            }
            SecurityToken::Signature(material) => {
                let body = body.ok_or_else(|| {
                    EngineError::Security("signature requested without a signable body".to_string())
                })?;
                let backend = backend.ok_or_else(|| {
                    EngineError::Security(
                        "certificate signature requires a signature backend".to_string(),
                    )
                })?;
                out.push_str(&render_signature(material, body, backend, now)?);
            }
        }
    }

    out.push_str("</wsse:Security>");
    Ok(out)
}

fn render_signature(
    material: &SigningMaterial,
    body: &SignedBody,
    backend: &dyn SignatureBackend,
    now: DateTime<Utc>,
) -> Result<String, EngineError> {
    let certificate = material
        .certificate_base64()
        .map_err(|e| EngineError::Security(e.to_string()))?;
    let token_id = new_id("X509");
    let timestamp_id = new_id("TS");

    let timestamp = format!(
        r#"<wsu:Timestamp xmlns:wsu="{}" wsu:Id="{}"><wsu:Created>{}</wsu:Created><wsu:Expires>{}</wsu:Expires></wsu:Timestamp>"#,
        WSU_NS,
        timestamp_id,
        format_instant(now),
        format_instant(now + Duration::seconds(TIMESTAMP_TTL_SECONDS))
    );

    let mut signed_info = format!(
        r#"<ds:SignedInfo xmlns:ds="{}"><ds:CanonicalizationMethod Algorithm="{}"></ds:CanonicalizationMethod><ds:SignatureMethod Algorithm="{}"></ds:SignatureMethod>"#,
        DSIG_NS,
        EXC_C14N,
        escape_attr(backend.signature_method())
    );
    signed_info.push_str(&reference(&body.id, &body.xml));
    signed_info.push_str(&reference(&timestamp_id, &timestamp));
    signed_info.push_str("</ds:SignedInfo>");

    let signature = backend
        .sign(material, signed_info.as_bytes())
        .map_err(EngineError::Security)?;

    Ok(format!(
        concat!(
            "{timestamp}",
            r#"<wsse:BinarySecurityToken EncodingType="{encoding}" ValueType="{value_type}" wsu:Id="{token_id}">{certificate}</wsse:BinarySecurityToken>"#,
            r#"<ds:Signature xmlns:ds="{dsig}">{signed_info}<ds:SignatureValue>{signature}</ds:SignatureValue>"#,
            r##"<ds:KeyInfo><wsse:SecurityTokenReference><wsse:Reference URI="#{token_id}" ValueType="{value_type}"></wsse:Reference></wsse:SecurityTokenReference></ds:KeyInfo></ds:Signature>"##,
        ),
        timestamp = timestamp,
        encoding = BASE64_BINARY,
        value_type = X509_V3,
        token_id = token_id,
        certificate = certificate,
        dsig = DSIG_NS,
        signed_info = signed_info,
        signature = STANDARD.encode(signature),
    ))
}

fn reference(id: &str, canonical: &str) -> String {
    let digest = STANDARD.encode(Sha256::digest(canonical.as_bytes()));
    format!(
        r##"<ds:Reference URI="#{}"><ds:Transforms><ds:Transform Algorithm="{}"></ds:Transform></ds:Transforms><ds:DigestMethod Algorithm="{}"></ds:DigestMethod><ds:DigestValue>{}</ds:DigestValue></ds:Reference>"##,
        id, EXC_C14N, SHA256_DIGEST, digest
    )
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Escape character data the way canonical XML does.
pub fn escape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape an attribute value the way canonical XML does.
pub fn escape_attr(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
    out
}
