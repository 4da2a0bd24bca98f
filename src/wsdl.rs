//! WSDL 1.1 introspection.
//!
//! Reads just enough of a service definition to call its operations: the
//! endpoint address, SOAP version, binding style, soapAction values, and the
//! shape of each operation's input (which element wraps the arguments and in
//! what order its fields are declared). Imported documents are not followed.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::auth::BasicCredentials;
use crate::error::TransportError;
use crate::http_client::HttpSession;
use crate::xml::{
    QualifiedName, WSDL_NS, WSDL_SOAP_11_NS, WSDL_SOAP_12_NS, XSD_NS, XmlElement, parse_document,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapVersion {
    Soap11,
    Soap12,
}

impl SoapVersion {
    pub fn envelope_namespace(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => crate::xml::SOAP_11_NS,
            SoapVersion::Soap12 => crate::xml::SOAP_12_NS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingStyle {
    Document,
    Rpc,
}

impl BindingStyle {
    fn parse(value: Option<&str>) -> Option<Self> {
        match value {
            Some("rpc") => Some(BindingStyle::Rpc),
            Some("document") => Some(BindingStyle::Document),
            _ => None,
        }
    }
}

/// How the arguments of an operation are laid out in the request body.
#[derive(Debug, Clone, PartialEq)]
pub struct InputShape {
    /// Element that wraps the arguments
    pub wrapper: QualifiedName,
    /// Field names in declaration order; positional arguments bind to these
    pub fields: Vec<String>,
    /// Whether fields are namespace-qualified
    pub qualified: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationInfo {
    pub name: String,
    pub soap_action: Option<String>,
    pub style: BindingStyle,
    pub input: InputShape,
}

/// What the engine knows about one service after reading its WSDL.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDefinition {
    pub target_namespace: String,
    pub soap_version: SoapVersion,
    pub endpoint: String,
    operations: BTreeMap<String, OperationInfo>,
}

impl ServiceDefinition {
    pub fn operation(&self, name: &str) -> Option<&OperationInfo> {
        self.operations.get(name)
    }

    pub fn operation_names(&self) -> Vec<String> {
        self.operations.keys().cloned().collect()
    }
}

/// Download and read a WSDL.
pub async fn load_wsdl(
    session: &HttpSession,
    wsdl_url: &str,
    http_basic: Option<&BasicCredentials>,
) -> Result<ServiceDefinition, TransportError> {
    let document = session.get_text(wsdl_url, http_basic).await?;
    let definition = parse_wsdl(&document, wsdl_url)?;
    debug!(
        %wsdl_url,
        endpoint = %definition.endpoint,
        operations = definition.operations.len(),
        "loaded service definition"
    );
    Ok(definition)
}

#[derive(Debug, Default)]
struct SchemaIndex {
    elements: HashMap<QualifiedName, ElementDecl>,
    complex_types: HashMap<QualifiedName, Vec<String>>,
}

#[derive(Debug)]
struct ElementDecl {
    fields: Option<Vec<String>>,
    type_ref: Option<QualifiedName>,
    qualified: bool,
}

#[derive(Debug)]
struct MessagePart {
    name: String,
    element: Option<QualifiedName>,
}

/// Read a WSDL document. `wsdl_url` is used for error messages and as the
/// fallback endpoint when the service declares no address.
pub fn parse_wsdl(document: &str, wsdl_url: &str) -> Result<ServiceDefinition, TransportError> {
    let wsdl_error = |details: &str| TransportError::Wsdl {
        url: wsdl_url.to_string(),
        details: details.to_string(),
    };

    let root = parse_document(document).map_err(|e| wsdl_error(&e.to_string()))?;
    if !root.is(WSDL_NS, "definitions") {
        return Err(wsdl_error("root element is not wsdl:definitions"));
    }

    let target_namespace = root
        .attribute("targetNamespace")
        .ok_or_else(|| wsdl_error("definitions has no targetNamespace"))?
        .to_string();

    let schemas = index_schemas(&root, &target_namespace);
    let messages = index_messages(&root, &target_namespace);

    let (binding, soap_version) = root
        .children_named(WSDL_NS, "binding")
        .find_map(|b| {
            if b.child(WSDL_SOAP_11_NS, "binding").is_some() {
                Some((b, SoapVersion::Soap11))
            } else if b.child(WSDL_SOAP_12_NS, "binding").is_some() {
                Some((b, SoapVersion::Soap12))
            } else {
                None
            }
        })
        .ok_or_else(|| wsdl_error("no SOAP binding found"))?;

    let soap_ns = match soap_version {
        SoapVersion::Soap11 => WSDL_SOAP_11_NS,
        SoapVersion::Soap12 => WSDL_SOAP_12_NS,
    };

    let default_style = binding
        .child(soap_ns, "binding")
        .and_then(|b| BindingStyle::parse(b.attribute("style")))
        .unwrap_or(BindingStyle::Document);

    let binding_name = binding.attribute("name").unwrap_or_default().to_string();
    let port_type_name = binding
        .attribute("type")
        .map(|t| binding.resolve_qname(t).local_name)
        .ok_or_else(|| wsdl_error("binding has no type"))?;

    let port_type = root
        .children_named(WSDL_NS, "portType")
        .find(|p| p.attribute("name") == Some(port_type_name.as_str()))
        .ok_or_else(|| wsdl_error(&format!("portType '{}' not found", port_type_name)))?;

    let mut operations = BTreeMap::new();
    for op in port_type.children_named(WSDL_NS, "operation") {
        let Some(name) = op.attribute("name") else {
            continue;
        };

        let bound = binding
            .children_named(WSDL_NS, "operation")
            .find(|b| b.attribute("name") == Some(name))
            .and_then(|b| b.child(soap_ns, "operation"));

        let style = bound
            .and_then(|b| BindingStyle::parse(b.attribute("style")))
            .unwrap_or(default_style);
        let soap_action = bound
            .and_then(|b| b.attribute("soapAction"))
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        let rpc_namespace = binding
            .children_named(WSDL_NS, "operation")
            .find(|b| b.attribute("name") == Some(name))
            .and_then(|b| b.child(WSDL_NS, "input"))
            .and_then(|i| i.child(soap_ns, "body"))
            .and_then(|b| b.attribute("namespace"))
            .unwrap_or(target_namespace.as_str())
            .to_string();

        let parts = op
            .child(WSDL_NS, "input")
            .and_then(|i| i.attribute("message"))
            .map(|m| op.resolve_qname(m))
            .and_then(|m| messages.get(&m.local_name))
            .map(Vec::as_slice)
            .unwrap_or_default();

        let input = match style {
            BindingStyle::Rpc => InputShape {
                wrapper: QualifiedName::new(Some(&rpc_namespace), name),
                fields: parts.iter().map(|p| p.name.clone()).collect(),
                qualified: false,
            },
            BindingStyle::Document => document_input(name, parts, &schemas, &target_namespace),
        };

        operations.insert(
            name.to_string(),
            OperationInfo {
                name: name.to_string(),
                soap_action,
                style,
                input,
            },
        );
    }

    let endpoint = root
        .children_named(WSDL_NS, "service")
        .flat_map(|s| s.children_named(WSDL_NS, "port"))
        .find(|p| {
            p.attribute("binding")
                .map(|b| p.resolve_qname(b).local_name == binding_name)
                .unwrap_or(false)
        })
        .and_then(|p| p.child(soap_ns, "address"))
        .and_then(|a| a.attribute("location"))
        .map(str::to_string)
        .unwrap_or_else(|| strip_query(wsdl_url).to_string());

    Ok(ServiceDefinition {
        target_namespace,
        soap_version,
        endpoint,
        operations,
    })
}

fn document_input(
    operation: &str,
    parts: &[MessagePart],
    schemas: &SchemaIndex,
    target_namespace: &str,
) -> InputShape {
    let Some(element) = parts.first().and_then(|p| p.element.clone()) else {
        // No element part: fall back to a wrapper named after the operation
        return InputShape {
            wrapper: QualifiedName::new(Some(target_namespace), operation),
            fields: parts.iter().map(|p| p.name.clone()).collect(),
            qualified: false,
        };
    };

    let (fields, qualified) = match schemas.elements.get(&element) {
        Some(decl) => {
            let fields = decl
                .fields
                .clone()
                .or_else(|| {
                    decl.type_ref
                        .as_ref()
                        .and_then(|t| schemas.complex_types.get(t).cloned())
                })
                .unwrap_or_default();
            (fields, decl.qualified)
        }
        None => (Vec::new(), true),
    };

    InputShape {
        wrapper: element,
        fields,
        qualified,
    }
}

fn index_messages(root: &XmlElement, target_namespace: &str) -> HashMap<String, Vec<MessagePart>> {
    let mut messages = HashMap::new();
    for message in root.children_named(WSDL_NS, "message") {
        let Some(name) = message.attribute("name") else {
            continue;
        };
        let parts = message
            .children_named(WSDL_NS, "part")
            .map(|part| MessagePart {
                name: part.attribute("name").unwrap_or_default().to_string(),
                element: part.attribute("element").map(|e| {
                    let mut qname = part.resolve_qname(e);
                    if qname.namespace.is_none() {
                        qname.namespace = Some(target_namespace.to_string());
                    }
                    qname
                }),
            })
            .collect();
        messages.insert(name.to_string(), parts);
    }
    messages
}

fn index_schemas(root: &XmlElement, wsdl_namespace: &str) -> SchemaIndex {
    let mut index = SchemaIndex::default();
    let Some(types) = root.child(WSDL_NS, "types") else {
        return index;
    };

    for schema in types.children_named(XSD_NS, "schema") {
        let namespace = schema
            .attribute("targetNamespace")
            .unwrap_or(wsdl_namespace)
            .to_string();
        let qualified = schema.attribute("elementFormDefault") == Some("qualified");

        for element in schema.children_named(XSD_NS, "element") {
            let Some(name) = element.attribute("name") else {
                continue;
            };
            let fields = element
                .child(XSD_NS, "complexType")
                .map(sequence_fields);
            let type_ref = element.attribute("type").map(|t| element.resolve_qname(t));
            index.elements.insert(
                QualifiedName::new(Some(&namespace), name),
                ElementDecl {
                    fields,
                    type_ref,
                    qualified,
                },
            );
        }

        for complex_type in schema.children_named(XSD_NS, "complexType") {
            if let Some(name) = complex_type.attribute("name") {
                index.complex_types.insert(
                    QualifiedName::new(Some(&namespace), name),
                    sequence_fields(complex_type),
                );
            }
        }
    }

    index
}

/// Child element names of a complexType's `sequence` or `all`, in order.
fn sequence_fields(complex_type: &XmlElement) -> Vec<String> {
    let group = complex_type
        .child(XSD_NS, "sequence")
        .or_else(|| complex_type.child(XSD_NS, "all"));

    group
        .map(|g| {
            g.children_named(XSD_NS, "element")
                .filter_map(|e| {
                    e.attribute("name")
                        .map(str::to_string)
                        .or_else(|| e.attribute("ref").map(|r| e.resolve_qname(r).local_name))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn strip_query(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}
