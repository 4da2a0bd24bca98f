use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde_json::json;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use workday_soap::cli::Cli;
use workday_soap::config::{ConfigError, ConfigManager, EnvProvider, NetworkConfig, TenantConfig};
use workday_soap::{AuthStrategy, WorkdayError};

use crate::common::test_helpers::TestFixtures;

struct MapEnv(HashMap<&'static str, &'static str>);

impl EnvProvider for MapEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).map(|v| v.to_string())
    }
}

fn env(pairs: &[(&'static str, &'static str)]) -> MapEnv {
    MapEnv(pairs.iter().copied().collect())
}

#[test]
fn test_default_config() {
    let config = TenantConfig::default();

    assert_eq!(config.wsdls, json!({}));
    assert_eq!(config.authentication, AuthStrategy::Anonymous);
    assert_eq!(config.network, NetworkConfig::default());
    assert_eq!(config.network.timeout_seconds, 30);
    assert!(!config.network.disable_ssl_verification);
}

#[tokio::test]
async fn test_load_fixture_config() {
    let fixtures = TestFixtures::new();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tenant.toml");
    std::fs::write(&path, fixtures.tenant_config("https://wd2.example.com")).unwrap();

    let config = ConfigManager::load_from_file(&path).await.unwrap();

    assert_eq!(config.wsdls, json!({"hello": "https://wd2.example.com/api/v30"}));
    assert_eq!(
        config.authentication,
        AuthStrategy::username_password("user1", "password2")
    );
    assert_eq!(config.network.timeout_seconds, 10);
    assert_eq!(
        config.network.to_http_config().timeout,
        Duration::from_secs(10)
    );
}

#[tokio::test]
async fn test_load_json_config_with_certificate() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tenant.json");
    std::fs::write(
        &path,
        r#"{
            "wsdls": {"staffing": "https://wd2.example.com/ccx/service/acme/Staffing/v30.0"},
            "authentication": {
                "mode": "certificate_signature",
                "private_key_path": "/keys/tenant.key",
                "certificate_path": "/keys/tenant.crt"
            },
            "network": {"disable_ssl_verification": true}
        }"#,
    )
    .unwrap();

    let config = ConfigManager::load_from_file(&path).await.unwrap();

    assert_eq!(
        config.authentication,
        AuthStrategy::certificate("/keys/tenant.key", "/keys/tenant.crt", None)
    );
    assert!(config.network.disable_ssl_verification);
    assert_eq!(config.network.timeout_seconds, 30);
}

#[tokio::test]
async fn test_unsupported_extension_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tenant.yaml");
    std::fs::write(&path, "wsdls: {}").unwrap();

    let result = ConfigManager::load_from_file(&path).await;
    assert!(matches!(result, Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"));
}

#[tokio::test]
async fn test_unknown_authentication_mode_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tenant.toml");
    std::fs::write(
        &path,
        "[wsdls]\nhr = \"https://wd2.example.com/hr\"\n\n[authentication]\nmode = \"kerberos\"\n",
    )
    .unwrap();

    let result = ConfigManager::load_from_file(&path).await;
    assert!(matches!(result, Err(ConfigError::TomlParsing(_))));
}

#[test]
fn test_environment_overrides() {
    let config = TenantConfig {
        wsdls: json!({"hr": "https://wd2.example.com/hr"}),
        authentication: AuthStrategy::username_password("file-user", "file-pass"),
        network: NetworkConfig::default(),
    };

    let env = env(&[
        ("WORKDAY_PROXY_URL", "http://proxy.corp:3128"),
        ("WORKDAY_DISABLE_SSL_VERIFICATION", "yes"),
        ("WORKDAY_TIMEOUT", "90"),
        ("WORKDAY_PASSWORD", "env-pass"),
    ]);
    let config = ConfigManager::apply_environment_overrides_with(&env, config).unwrap();

    assert_eq!(config.network.proxy_url.as_deref(), Some("http://proxy.corp:3128"));
    assert!(config.network.disable_ssl_verification);
    assert_eq!(config.network.timeout_seconds, 90);
    assert_eq!(
        config.authentication,
        AuthStrategy::username_password("file-user", "env-pass")
    );
}

#[test]
fn test_environment_credentials_leave_anonymous_alone() {
    let env = env(&[("WORKDAY_USERNAME", "someone")]);
    let config =
        ConfigManager::apply_environment_overrides_with(&env, TenantConfig::default()).unwrap();
    assert_eq!(config.authentication, AuthStrategy::Anonymous);
}

#[test]
fn test_invalid_environment_values() {
    let bad_flag = env(&[("WORKDAY_DISABLE_SSL_VERIFICATION", "maybe")]);
    assert!(matches!(
        ConfigManager::apply_environment_overrides_with(&bad_flag, TenantConfig::default()),
        Err(ConfigError::Environment(_))
    ));

    let bad_timeout = env(&[("WORKDAY_TIMEOUT", "soon")]);
    assert!(matches!(
        ConfigManager::apply_environment_overrides_with(&bad_timeout, TenantConfig::default()),
        Err(ConfigError::Environment(_))
    ));
}

#[test]
fn test_cli_takes_precedence() {
    let cli = Cli::try_parse_from([
        "workday-soap",
        "hr",
        "Get_Workers",
        "--proxy-url",
        "http://cli-proxy:8080",
        "--insecure",
        "--timeout",
        "5",
        "--user-agent",
        "nightly-sync/1.0",
    ])
    .unwrap();

    let mut config = TenantConfig::default();
    config.network.proxy_url = Some("http://file-proxy:8080".to_string());
    let config = ConfigManager::merge_with_cli(config, &cli);

    assert_eq!(config.network.proxy_url.as_deref(), Some("http://cli-proxy:8080"));
    assert!(config.network.disable_ssl_verification);
    assert_eq!(config.network.timeout_seconds, 5);
    assert_eq!(config.network.user_agent.as_deref(), Some("nightly-sync/1.0"));
}

#[test]
fn test_validation_rules() {
    let valid = TenantConfig {
        wsdls: json!({"hr": "https://wd2.example.com/hr"}),
        ..TenantConfig::default()
    };
    assert_ok!(ConfigManager::validate_config(&valid));

    let mut zero_timeout = valid.clone();
    zero_timeout.network.timeout_seconds = 0;
    assert_err!(ConfigManager::validate_config(&zero_timeout));

    let mut long_timeout = valid.clone();
    long_timeout.network.timeout_seconds = 3601;
    assert_err!(ConfigManager::validate_config(&long_timeout));

    let mut blank_proxy = valid.clone();
    blank_proxy.network.proxy_url = Some("  ".to_string());
    assert_err!(ConfigManager::validate_config(&blank_proxy));

    assert!(matches!(
        ConfigManager::validate_config(&TenantConfig::default()),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn test_non_mapping_wsdls_reported_by_client() {
    let config = TenantConfig {
        wsdls: json!(["https://wd2.example.com/hr"]),
        ..TenantConfig::default()
    };

    // Shape errors pass validation and surface when the client is built
    assert_ok!(ConfigManager::validate_config(&config));
    assert!(matches!(
        config.build_client(),
        Err(WorkdayError::InvalidWsdlMapping(_))
    ));
}

#[test]
fn test_build_client_from_config() {
    let config = TenantConfig {
        wsdls: json!({
            "hr": "https://wd2.example.com/hr",
            "talent": "https://wd2.example.com/talent",
        }),
        ..TenantConfig::default()
    };

    let client = config.build_client().unwrap();
    let mut names = client.api_names();
    names.sort();
    assert_eq!(names, vec!["hr", "talent"]);
    assert_eq!(client.wsdl_url("hr"), Some("https://wd2.example.com/hr"));
    assert!(!client.is_resolved("hr"));
}

#[test]
fn test_network_config_to_http_config() {
    let network = NetworkConfig {
        timeout_seconds: 12,
        proxy_url: Some("http://proxy:3128".to_string()),
        disable_ssl_verification: true,
        user_agent: None,
    };
    let http = network.to_http_config();

    assert_eq!(http.timeout, Duration::from_secs(12));
    assert_eq!(http.proxy_url.as_deref(), Some("http://proxy:3128"));
    assert!(http.disable_ssl_verification);
    assert!(http.user_agent.starts_with("workday-soap/"));
}

#[test]
fn test_locate_config_file_ignores_missing_paths() {
    // Whatever the machine has, every returned path must exist
    if let Some(path) = ConfigManager::locate_config_file() {
        assert!(PathBuf::from(&path).exists());
    }
}
