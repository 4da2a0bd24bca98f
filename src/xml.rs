//! Minimal namespace-aware XML tree.
//!
//! Uses quick-xml for tokenizing. Entities are never expanded and documents
//! carrying a DOCTYPE are refused outright, so WSDLs and responses cannot
//! smuggle in external entities.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::TransportError;

pub const SOAP_11_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_12_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
pub const WSDL_NS: &str = "http://schemas.xmlsoap.org/wsdl/";
pub const WSDL_SOAP_11_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
pub const WSDL_SOAP_12_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
pub const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
pub const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
pub const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// One element of a parsed document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    /// Resolved namespace URI, if the element is in one
    pub namespace: Option<String>,
    pub local_name: String,
    /// Attributes keyed by their raw (possibly prefixed) name, xmlns declarations excluded
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    /// Concatenated character data directly inside this element
    pub text: String,
    /// Prefix → namespace bindings in scope at this element ("" is the default namespace)
    pub scope: BTreeMap<String, String>,
}

impl XmlElement {
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref() == Some(namespace)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name || local_part(key) == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child(&self, namespace: &str, local_name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.is(namespace, local_name))
    }

    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children
            .iter()
            .filter(move |c| c.is(namespace, local_name))
    }

    /// First child matching `local_name` regardless of namespace.
    pub fn child_local(&self, local_name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.local_name == local_name)
    }

    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }

    /// Resolve a QName-valued attribute (`tns:Foo`) against this element's scope.
    pub fn resolve_qname(&self, qname: &str) -> QualifiedName {
        let (prefix, local) = split_qname(qname);
        QualifiedName {
            namespace: self.scope.get(prefix.unwrap_or("")).cloned(),
            local_name: local.to_string(),
        }
    }
}

/// A namespace-resolved name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    pub namespace: Option<String>,
    pub local_name: String,
}

impl QualifiedName {
    pub fn new(namespace: Option<&str>, local_name: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            local_name: local_name.to_string(),
        }
    }
}

pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

fn local_part(name: &str) -> &str {
    split_qname(name).1
}

/// Parse a document and return its root element.
pub fn parse_document(xml: &str) -> Result<XmlElement, TransportError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let parent_scope = stack.last().map(|p| &p.scope);
                let element = open_element(e, parent_scope)?;
                stack.push(element);
            }
            Ok(Event::Empty(ref e)) => {
                let parent_scope = stack.last().map(|p| &p.scope);
                let element = open_element(e, parent_scope)?;
                close_element(element, &mut stack, &mut root)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| TransportError::Xml("unbalanced end tag".to_string()))?;
                close_element(element, &mut stack, &mut root)?;
            }
            Ok(Event::Text(ref e)) => {
                if let Some(current) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| TransportError::Xml(err.to_string()))?;
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::DocType(_)) => {
                return Err(TransportError::Xml(
                    "DOCTYPE declarations are not allowed".to_string(),
                ));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(TransportError::Xml(format!(
                    "error at position {}: {}",
                    reader.error_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(TransportError::Xml("unexpected end of document".to_string()));
    }

    root.ok_or_else(|| TransportError::Xml("document has no root element".to_string()))
}

fn open_element(
    e: &BytesStart,
    parent_scope: Option<&BTreeMap<String, String>>,
) -> Result<XmlElement, TransportError> {
    let mut scope = parent_scope.cloned().unwrap_or_default();
    let mut attributes = Vec::new();

    for attr in e.attributes() {
        let attr = attr.map_err(|err| TransportError::Xml(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| TransportError::Xml(err.to_string()))?
            .into_owned();

        if key == "xmlns" {
            scope.insert(String::new(), value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.insert(prefix.to_string(), value);
        } else {
            attributes.push((key, value));
        }
    }

    let raw_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let (prefix, local) = split_qname(&raw_name);
    let namespace = scope.get(prefix.unwrap_or("")).cloned();

    Ok(XmlElement {
        namespace,
        local_name: local.to_string(),
        attributes,
        children: Vec::new(),
        text: String::new(),
        scope,
    })
}

fn close_element(
    element: XmlElement,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
) -> Result<(), TransportError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_some() {
                return Err(TransportError::Xml(
                    "document has more than one root element".to_string(),
                ));
            }
            *root = Some(element);
        }
    }
    Ok(())
}
