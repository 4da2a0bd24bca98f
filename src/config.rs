use crate::auth::AuthStrategy;
use crate::cli::Cli;
use crate::client::{WorkdayClient, WorkdayClientBuilder, WsdlMap};
use crate::error::WorkdayError;
use crate::http_client::HttpClientConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration of one Workday tenant
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TenantConfig {
    /// API name → WSDL base URL. Kept untyped so shape errors are reported
    /// by [`WsdlMap::from_value`].
    #[serde(default = "empty_mapping")]
    pub wsdls: Value,
    #[serde(default = "AuthStrategy::anonymous")]
    pub authentication: AuthStrategy,
    #[serde(default)]
    pub network: NetworkConfig,
}

fn empty_mapping() -> Value {
    Value::Object(Map::new())
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            wsdls: empty_mapping(),
            authentication: AuthStrategy::anonymous(),
            network: NetworkConfig::default(),
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,
    /// HTTPS proxy for all traffic
    pub proxy_url: Option<String>,
    /// Skip TLS certificate verification
    pub disable_ssl_verification: bool,
    pub user_agent: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            proxy_url: None,
            disable_ssl_verification: false,
            user_agent: None,
        }
    }
}

impl NetworkConfig {
    pub fn to_http_config(&self) -> HttpClientConfig {
        let defaults = HttpClientConfig::default();
        HttpClientConfig {
            timeout: Duration::from_secs(self.timeout_seconds),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            proxy_url: self.proxy_url.clone(),
            disable_ssl_verification: self.disable_ssl_verification,
        }
    }
}

impl TenantConfig {
    /// Client builder preloaded with this tenant's APIs, credentials and network settings
    pub fn client_builder(&self) -> std::result::Result<WorkdayClientBuilder, WorkdayError> {
        let wsdls = WsdlMap::from_value(&self.wsdls)?;
        Ok(
            WorkdayClient::builder(wsdls, Arc::new(self.authentication.clone()))
                .http_config(self.network.to_http_config()),
        )
    }

    pub fn build_client(&self) -> std::result::Result<WorkdayClient, WorkdayError> {
        self.client_builder()?.build()
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<TenantConfig> {
        let config = match &cli.config {
            Some(config_path) => Self::load_from_file(config_path).await?,
            None => Self::find_config_file().await?.ok_or_else(|| {
                ConfigError::Validation(
                    "no tenant configuration found; pass --config or create workday.toml"
                        .to_string(),
                )
            })?,
        };

        let config = Self::apply_environment_overrides(config)?;
        let config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<TenantConfig> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<TenantConfig>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub async fn find_config_file() -> Result<Option<TenantConfig>> {
        match Self::locate_config_file() {
            Some(path) => Ok(Some(Self::load_from_file(&path).await?)),
            None => Ok(None),
        }
    }

    /// First existing configuration file: current directory, then the user config directory
    pub fn locate_config_file() -> Option<PathBuf> {
        let config_names = [
            "workday.toml",
            "workday.json",
            ".workday.toml",
            ".workday.json",
        ];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Some(path);
            }
        }

        let app_config_dir = dirs::config_dir()?.join("workday-soap");
        config_names
            .iter()
            .map(|name| app_config_dir.join(name))
            .find(|path| path.exists())
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: TenantConfig) -> Result<TenantConfig> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: TenantConfig,
    ) -> Result<TenantConfig> {
        if let Some(proxy_url) = env.get("WORKDAY_PROXY_URL") {
            config.network.proxy_url = Some(proxy_url).filter(|url| !url.trim().is_empty());
        }

        if let Some(disable) = env.get("WORKDAY_DISABLE_SSL_VERIFICATION") {
            config.network.disable_ssl_verification = parse_flag(&disable).ok_or_else(|| {
                ConfigError::Environment(format!(
                    "Invalid WORKDAY_DISABLE_SSL_VERIFICATION value: {}",
                    disable
                ))
            })?;
        }

        if let Some(timeout) = env.get("WORKDAY_TIMEOUT") {
            config.network.timeout_seconds = timeout.parse().map_err(|_| {
                ConfigError::Environment(format!("Invalid WORKDAY_TIMEOUT value: {}", timeout))
            })?;
        }

        if let Some(user_agent) = env.get("WORKDAY_USER_AGENT") {
            config.network.user_agent = Some(user_agent);
        }

        // Secrets usually live in the environment rather than the file
        let username = env.get("WORKDAY_USERNAME");
        let password = env.get("WORKDAY_PASSWORD");
        if username.is_some() || password.is_some() {
            config.authentication = config.authentication.with_credentials(username, password);
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: TenantConfig, cli: &Cli) -> TenantConfig {
        if let Some(proxy_url) = &cli.proxy_url {
            config.network.proxy_url = Some(proxy_url.clone());
        }
        if cli.insecure {
            config.network.disable_ssl_verification = true;
        }
        if let Some(timeout) = cli.timeout {
            config.network.timeout_seconds = timeout;
        }
        if let Some(user_agent) = &cli.user_agent {
            config.network.user_agent = Some(user_agent.clone());
        }

        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &TenantConfig) -> Result<()> {
        if config.network.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if config.network.timeout_seconds > 3600 {
            return Err(ConfigError::Validation(
                "Timeout cannot exceed 3600 seconds".to_string(),
            ));
        }

        if config
            .network
            .proxy_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "Proxy URL must not be empty".to_string(),
            ));
        }

        // Shape errors in `wsdls` are left to the client, which reports them precisely
        if config.wsdls.as_object().is_some_and(|apis| apis.is_empty()) {
            return Err(ConfigError::Validation(
                "At least one API must be configured under [wsdls]".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
