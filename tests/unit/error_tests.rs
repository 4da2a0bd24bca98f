use std::time::Duration;

use serde_json::json;

use workday_soap::config::ConfigError;
use workday_soap::{EngineError, SoapFault, TransportError, WorkdayError};

#[test]
fn test_engine_fault_becomes_soap_api_error() {
    let fault = SoapFault::new("SOAP-ENV:Client.validationError", "Validation error occurred")
        .with_detail(json!({"Validation_Fault": {"Validation_Error": {"Message": "bad ID"}}}));

    let error: WorkdayError = EngineError::Fault(fault.clone()).into();

    assert_eq!(error.fault(), Some(&fault));
    assert!(error.to_string().contains("Validation error occurred"));
}

#[test]
fn test_engine_error_mapping() {
    let unknown: WorkdayError = EngineError::UnknownOperation("Get_Nothing".to_string()).into();
    assert!(matches!(
        unknown,
        WorkdayError::OperationNotFound { ref operation } if operation == "Get_Nothing"
    ));

    let arguments: WorkdayError =
        EngineError::InvalidArguments("too many positional arguments".to_string()).into();
    assert!(matches!(arguments, WorkdayError::InvalidArgument(_)));

    let security: WorkdayError = EngineError::Security("no signature backend".to_string()).into();
    assert!(matches!(security, WorkdayError::Configuration(_)));

    let transport: WorkdayError = EngineError::Transport(TransportError::Xml(
        "unexpected end of input".to_string(),
    ))
    .into();
    assert!(matches!(
        transport,
        WorkdayError::Transport(TransportError::Xml(_))
    ));
}

#[test]
fn test_transport_errors_keep_their_message() {
    let timeout = TransportError::Timeout {
        url: "https://wd2.example.com/api/v30?wsdl".to_string(),
        timeout: Duration::from_secs(30),
    };
    let error = WorkdayError::from(timeout);

    assert_eq!(
        error.to_string(),
        "Request timeout: https://wd2.example.com/api/v30?wsdl after 30s"
    );
    assert!(error.fault().is_none());
}

#[test]
fn test_config_error_becomes_configuration_error() {
    let error: WorkdayError = ConfigError::Validation("Timeout must be greater than 0".to_string()).into();

    match error {
        WorkdayError::Configuration(message) => assert!(message.contains("Timeout")),
        other => panic!("Expected Configuration, got {:?}", other),
    }
}

#[test]
fn test_soap_fault_serializes() {
    let mut fault = SoapFault::new("soap:Server", "Processing error");
    fault.actor = Some("urn:workday".to_string());

    let value = serde_json::to_value(&fault).unwrap();
    assert_eq!(value["code"], "soap:Server");
    assert_eq!(value["actor"], "urn:workday");
    assert_eq!(value["detail"], serde_json::Value::Null);
    assert_eq!(fault.to_string(), "[soap:Server] Processing error");
}

#[test]
fn test_wsdl_not_provided_names_the_api() {
    let error = WorkdayError::WsdlNotProvided {
        api: "payroll".to_string(),
    };
    assert_eq!(error.to_string(), "API 'payroll' was not loaded");
}
