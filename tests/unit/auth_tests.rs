use std::path::PathBuf;

use workday_soap::{AuthStrategy, Authentication, SecurityToken, WorkdayError};

use crate::common::test_helpers::TestFixtures;

#[test]
fn test_username_password_produces_username_token() {
    let params = AuthStrategy::username_password("user1", "password2")
        .security_parameters()
        .unwrap();

    assert_eq!(
        params.tokens,
        vec![SecurityToken::UsernameToken {
            username: "user1".to_string(),
            password: "password2".to_string(),
        }]
    );
    assert!(params.http_basic.is_none());
}

#[test]
fn test_empty_username_is_a_configuration_error() {
    let result = AuthStrategy::username_password("  ", "secret").security_parameters();
    assert!(matches!(result, Err(WorkdayError::Configuration(_))));

    let result = AuthStrategy::http_basic("", "secret").security_parameters();
    assert!(matches!(result, Err(WorkdayError::Configuration(_))));
}

#[test]
fn test_certificate_reads_fixture_files() {
    let fixtures = TestFixtures::new();
    let strategy = AuthStrategy::certificate(
        fixtures.private_key_path(),
        fixtures.certificate_path(),
        Some("passphrase".to_string()),
    );

    let params = strategy.security_parameters().unwrap();
    assert_eq!(params.tokens.len(), 1);
    match &params.tokens[0] {
        SecurityToken::Signature(material) => {
            assert!(material.private_key_pem.contains("PRIVATE KEY"));
            assert!(material.certificate_pem.contains("BEGIN CERTIFICATE"));
            assert_eq!(material.passphrase.as_deref(), Some("passphrase"));
            assert!(!material.certificate_base64().unwrap().is_empty());
        }
        other => panic!("Expected a signature token, got {:?}", other),
    }
}

#[test]
fn test_combined_strategy_orders_tokens() {
    let fixtures = TestFixtures::new();
    let strategy = AuthStrategy::username_password_certificate(
        "user1",
        "password2",
        fixtures.private_key_path(),
        fixtures.certificate_path(),
        None,
    );

    let params = strategy.security_parameters().unwrap();
    assert!(matches!(params.tokens[0], SecurityToken::UsernameToken { .. }));
    assert!(matches!(params.tokens[1], SecurityToken::Signature(_)));
    assert_eq!(strategy.describe(), "username_password_certificate_signature");
}

#[test]
fn test_missing_key_file_is_a_configuration_error() {
    let fixtures = TestFixtures::new();
    let strategy = AuthStrategy::certificate(
        PathBuf::from("/nonexistent/tenant.key"),
        fixtures.certificate_path(),
        None,
    );

    match strategy.security_parameters() {
        Err(WorkdayError::Configuration(message)) => {
            assert!(message.contains("/nonexistent/tenant.key"))
        }
        other => panic!("Expected Configuration error, got {:?}", other),
    }
}

#[test]
fn test_swapped_pem_files_rejected() {
    let fixtures = TestFixtures::new();
    let strategy = AuthStrategy::certificate(
        fixtures.certificate_path(),
        fixtures.private_key_path(),
        None,
    );

    assert!(matches!(
        strategy.security_parameters(),
        Err(WorkdayError::Configuration(_))
    ));
}

#[test]
fn test_http_basic_uses_transport_credentials() {
    let params = AuthStrategy::http_basic("isu@acme", "secret")
        .security_parameters()
        .unwrap();

    assert!(params.tokens.is_empty());
    let credentials = params.http_basic.unwrap();
    assert_eq!(credentials.username, "isu@acme");
    assert_eq!(credentials.password, "secret");
}

#[test]
fn test_anonymous_is_empty() {
    let params = AuthStrategy::anonymous().security_parameters().unwrap();
    assert!(params.is_empty());
}

#[test]
fn test_debug_output_hides_secrets() {
    let strategy = AuthStrategy::username_password("user1", "hunter2");
    let rendered = format!("{:?}", strategy);

    assert!(rendered.contains("user1"));
    assert!(!rendered.contains("hunter2"));

    let params = AuthStrategy::http_basic("user1", "hunter2")
        .security_parameters()
        .unwrap();
    assert!(!format!("{:?}", params).contains("hunter2"));
}
