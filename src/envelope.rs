//! SOAP envelope construction and response decoding.
//!
//! Requests are written directly in exclusive-canonical form (no
//! self-closing tags, attributes sorted, canonical escaping) so a signed Body
//! can be digested exactly as sent. Responses are converted to JSON values:
//! attributes become `@name` keys, mixed text becomes `#text`, and repeated
//! elements collapse into arrays.

use chrono::Utc;
use serde_json::{Map, Value};

use crate::auth::SecurityParameters;
use crate::engine::EngineError;
use crate::error::{SoapFault, TransportError};
use crate::wsdl::{OperationInfo, SoapVersion};
use crate::wsse::{
    SignatureBackend, SignedBody, escape_attr, escape_text, new_id, render_security_header,
    requires_signature,
};
use crate::xml::{SOAP_11_NS, SOAP_12_NS, WSU_NS, XmlElement, parse_document, split_qname};

const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const ENVELOPE_PREFIX: &str = "soap-env";
const PAYLOAD_PREFIX: &str = "ns0";

/// A decoded SOAP response body.
#[derive(Debug, Clone, PartialEq)]
pub enum SoapResponse {
    Payload(Value),
    Fault(SoapFault),
}

/// Content-Type header for a request.
pub fn content_type(version: SoapVersion, soap_action: Option<&str>) -> String {
    match (version, soap_action) {
        (SoapVersion::Soap11, _) => "text/xml; charset=utf-8".to_string(),
        (SoapVersion::Soap12, Some(action)) if !action.is_empty() => {
            format!("application/soap+xml; charset=utf-8; action=\"{}\"", action)
        }
        (SoapVersion::Soap12, _) => "application/soap+xml; charset=utf-8".to_string(),
    }
}

/// Build a complete request envelope for `operation`.
pub fn build_request(
    version: SoapVersion,
    operation: &OperationInfo,
    args: &[Value],
    kwargs: &Map<String, Value>,
    security: &SecurityParameters,
    backend: Option<&dyn SignatureBackend>,
) -> Result<String, EngineError> {
    let payload = render_payload(operation, args, kwargs)?;
    let envelope_ns = version.envelope_namespace();

    let (body, signed) = if requires_signature(&security.tokens) {
        let id = new_id("id");
        let xml = format!(
            r#"<{p}:Body xmlns:{p}="{ns}" xmlns:wsu="{wsu}" wsu:Id="{id}">{payload}</{p}:Body>"#,
            p = ENVELOPE_PREFIX,
            ns = envelope_ns,
            wsu = WSU_NS,
            id = id,
            payload = payload
        );
        (xml.clone(), Some(SignedBody { id, xml }))
    } else {
        (
            format!("<{p}:Body>{}</{p}:Body>", payload, p = ENVELOPE_PREFIX),
            None,
        )
    };

    let header = if security.tokens.is_empty() {
        String::new()
    } else {
        let security_header =
            render_security_header(&security.tokens, signed.as_ref(), backend, Utc::now())?;
        format!("<{p}:Header>{}</{p}:Header>", security_header, p = ENVELOPE_PREFIX)
    };

    Ok(format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<{p}:Envelope xmlns:{p}=\"{ns}\">{header}{body}</{p}:Envelope>",
        p = ENVELOPE_PREFIX,
        ns = envelope_ns,
        header = header,
        body = body
    ))
}

/// Render the operation's input element with its arguments.
pub fn render_payload(
    operation: &OperationInfo,
    args: &[Value],
    kwargs: &Map<String, Value>,
) -> Result<String, EngineError> {
    let fields = bind_arguments(operation, args, kwargs)?;
    let wrapper = &operation.input.wrapper;

    let (open, close, child_prefix) = match &wrapper.namespace {
        Some(ns) => {
            let open = format!(
                r#"<{p}:{name} xmlns:{p}="{ns}">"#,
                p = PAYLOAD_PREFIX,
                name = wrapper.local_name,
                ns = escape_attr(ns)
            );
            let close = format!("</{}:{}>", PAYLOAD_PREFIX, wrapper.local_name);
            let prefix = operation.input.qualified.then_some(PAYLOAD_PREFIX);
            (open, close, prefix)
        }
        None => (
            format!("<{}>", wrapper.local_name),
            format!("</{}>", wrapper.local_name),
            None,
        ),
    };

    let mut out = open;
    for (name, value) in &fields {
        write_element(&mut out, child_prefix, name, value)?;
    }
    out.push_str(&close);
    Ok(out)
}

/// Match positional and keyword arguments to the operation's declared fields.
///
/// Declared fields come first in declaration order, followed by keyword
/// arguments the WSDL does not declare, in the order given.
pub fn bind_arguments<'a>(
    operation: &OperationInfo,
    args: &'a [Value],
    kwargs: &'a Map<String, Value>,
) -> Result<Vec<(String, &'a Value)>, EngineError> {
    let declared = &operation.input.fields;
    if args.len() > declared.len() {
        return Err(EngineError::InvalidArguments(format!(
            "{}() takes {} positional argument(s) but {} were given",
            operation.name,
            declared.len(),
            args.len()
        )));
    }

    let mut bound: Vec<(String, &Value)> = Vec::with_capacity(declared.len() + kwargs.len());
    for (index, field) in declared.iter().enumerate() {
        let positional = args.get(index);
        let keyword = kwargs.get(field);
        match (positional, keyword) {
            (Some(_), Some(_)) => {
                return Err(EngineError::InvalidArguments(format!(
                    "{}() got multiple values for argument '{}'",
                    operation.name, field
                )));
            }
            (Some(value), None) | (None, Some(value)) => bound.push((field.clone(), value)),
            (None, None) => {}
        }
    }

    for (key, value) in kwargs {
        if declared.iter().any(|f| f == key) {
            continue;
        }
        if !is_xml_name(key) {
            return Err(EngineError::InvalidArguments(format!(
                "'{}' is not a valid element name",
                key
            )));
        }
        bound.push((key.clone(), value));
    }

    Ok(bound)
}

fn write_element(
    out: &mut String,
    prefix: Option<&str>,
    name: &str,
    value: &Value,
) -> Result<(), EngineError> {
    let tag = match prefix {
        Some(p) => format!("{}:{}", p, name),
        None => name.to_string(),
    };

    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                write_element(out, prefix, name, item)?;
            }
        }
        Value::Object(map) => {
            let mut attributes: Vec<(&str, String)> = Vec::new();
            let mut text = None;
            let mut children = Vec::new();
            for (key, child) in map {
                if let Some(attr) = key.strip_prefix('@') {
                    if !is_xml_name(attr) {
                        return Err(EngineError::InvalidArguments(format!(
                            "'{}' is not a valid attribute name",
                            attr
                        )));
                    }
                    attributes.push((attr, scalar_text(child)));
                } else if key == "#text" {
                    text = Some(scalar_text(child));
                } else {
                    if !is_xml_name(key) {
                        return Err(EngineError::InvalidArguments(format!(
                            "'{}' is not a valid element name",
                            key
                        )));
                    }
                    children.push((key.as_str(), child));
                }
            }
            attributes.sort_by(|a, b| a.0.cmp(b.0));

            out.push('<');
            out.push_str(&tag);
            for (attr, value) in &attributes {
                out.push_str(&format!(" {}=\"{}\"", attr, escape_attr(value)));
            }
            out.push('>');
            if let Some(text) = text {
                out.push_str(&escape_text(&text));
            }
            for (child_name, child) in children {
                write_element(out, prefix, child_name, child)?;
            }
            out.push_str(&format!("</{}>", tag));
        }
        scalar => {
            out.push_str(&format!(
                "<{tag}>{}</{tag}>",
                escape_text(&scalar_text(scalar)),
                tag = tag
            ));
        }
    }
    Ok(())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Decode a response envelope.
pub fn parse_response(xml: &str) -> Result<SoapResponse, TransportError> {
    let root = parse_document(xml)?;
    let envelope_ns = [SOAP_11_NS, SOAP_12_NS]
        .into_iter()
        .find(|ns| root.is(ns, "Envelope"))
        .ok_or_else(|| TransportError::Xml("response is not a SOAP envelope".to_string()))?;

    let body = root
        .child(envelope_ns, "Body")
        .ok_or_else(|| TransportError::Xml("SOAP envelope has no Body".to_string()))?;

    match body.children.first() {
        None => Ok(SoapResponse::Payload(Value::Null)),
        Some(first) if first.is(envelope_ns, "Fault") => {
            Ok(SoapResponse::Fault(parse_fault(first, envelope_ns)))
        }
        Some(first) => Ok(SoapResponse::Payload(element_to_value(first))),
    }
}

fn parse_fault(fault: &XmlElement, envelope_ns: &str) -> SoapFault {
    let text_of = |element: Option<&XmlElement>| {
        element
            .map(|e| e.trimmed_text().to_string())
            .filter(|t| !t.is_empty())
    };

    let (code, message, actor, detail) = if envelope_ns == SOAP_12_NS {
        (
            text_of(
                fault
                    .child(envelope_ns, "Code")
                    .and_then(|c| c.child(envelope_ns, "Value")),
            ),
            text_of(
                fault
                    .child(envelope_ns, "Reason")
                    .and_then(|r| r.child(envelope_ns, "Text")),
            ),
            text_of(fault.child(envelope_ns, "Role")),
            fault.child(envelope_ns, "Detail"),
        )
    } else {
        (
            text_of(fault.child_local("faultcode")),
            text_of(fault.child_local("faultstring")),
            text_of(fault.child_local("faultactor")),
            fault.child_local("detail"),
        )
    };

    let mut result = SoapFault::new(
        code.unwrap_or_else(|| "Server".to_string()),
        message.unwrap_or_else(|| "Unknown fault".to_string()),
    );
    result.actor = actor;
    if let Some(detail) = detail.map(element_to_value).filter(|v| !v.is_null()) {
        result = result.with_detail(detail);
    }
    result
}

/// Convert an element into a JSON value.
///
/// A leaf with no attributes becomes its text (or null when empty). Anything
/// else becomes an object keyed by child local name.
pub fn element_to_value(element: &XmlElement) -> Value {
    let mut attributes = Vec::new();
    for (key, value) in &element.attributes {
        let name = element.resolve_qname(key);
        if key.contains(':') && name.namespace.as_deref() == Some(XSI_NS) {
            if name.local_name == "nil" && matches!(value.as_str(), "true" | "1") {
                return Value::Null;
            }
            continue;
        }
        attributes.push((split_qname(key).1, value));
    }

    let text = element.trimmed_text();
    if element.children.is_empty() && attributes.is_empty() {
        return if text.is_empty() {
            Value::Null
        } else {
            Value::String(text.to_string())
        };
    }

    let mut map = Map::new();
    for (name, value) in attributes {
        map.insert(format!("@{}", name), Value::String(value.clone()));
    }
    for child in &element.children {
        let value = element_to_value(child);
        match map.get_mut(&child.local_name) {
            None => {
                map.insert(child.local_name.clone(), value);
            }
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }
    if !text.is_empty() {
        map.insert("#text".to_string(), Value::String(text.to_string()));
    }
    Value::Object(map)
}
