use clap::Parser;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::Level;

/// Call Workday SOAP operations from the command line
#[derive(Parser, Debug, Clone)]
#[command(name = "workday-soap")]
#[command(about = "Call Workday SOAP operations and print the results as JSON")]
#[command(version)]
pub struct Cli {
    /// API name as configured under [wsdls] (e.g. "talent")
    pub api: String,

    /// Operation to invoke (e.g. "Get_Certifications")
    pub operation: String,

    /// Positional arguments, parsed as JSON when possible and sent as strings otherwise
    pub args: Vec<String>,

    /// Keyword argument as NAME=VALUE; VALUE is parsed like positional arguments
    #[arg(
        short = 'p',
        long = "param",
        value_parser = parse_key_value,
        action = clap::ArgAction::Append
    )]
    pub params: Vec<(String, Value)>,

    /// Tenant configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Route HTTPS traffic through this proxy
    #[arg(long = "proxy-url")]
    pub proxy_url: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long = "insecure")]
    pub insecure: bool,

    /// HTTP request timeout in seconds
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// User agent sent with every request
    #[arg(long = "user-agent")]
    pub user_agent: Option<String>,

    /// Follow Response_Filter paging until the last page
    #[arg(long = "all-pages")]
    pub all_pages: bool,

    /// Print only the records under Response_Data.<KEY>
    #[arg(long = "records", value_name = "KEY")]
    pub records: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", help = "Enable verbose output")]
    pub verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Quiet mode",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn positional_values(&self) -> Vec<Value> {
        self.args.iter().map(|raw| parse_value(raw)).collect()
    }

    pub fn keyword_values(&self) -> Map<String, Value> {
        self.params.iter().cloned().collect()
    }

    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else if self.verbose {
            Level::DEBUG
        } else {
            Level::WARN
        }
    }
}

/// JSON when the text parses as JSON, otherwise the text itself.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_key_value(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing parameter name in '{}'", raw));
    }
    Ok((key.to_string(), parse_value(value)))
}
