use anyhow::{Context, Result};
use futures::TryStreamExt;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use workday_soap::cli::Cli;
use workday_soap::config::ConfigManager;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level())
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = ConfigManager::load_config(&cli)
        .await
        .context("Failed to load tenant configuration")?;
    let client = config
        .build_client()
        .context("Failed to create Workday client")?;

    let proxy = client
        .api(&cli.api)
        .await
        .with_context(|| format!("Failed to load API '{}'", cli.api))?;
    info!(api = %cli.api, operation = %cli.operation, "calling operation");

    let first = proxy
        .call(&cli.operation, cli.positional_values(), cli.keyword_values())
        .await
        .with_context(|| format!("{} failed", cli.operation))?;

    let output = match (&cli.records, cli.all_pages) {
        (Some(key), true) => Value::Array(first.collect_records(key).await?),
        (Some(key), false) => Value::Array(first.records(key)?),
        (None, true) => {
            let mut pages = vec![first.payload().clone()];
            let rest: Vec<Value> = first
                .into_pages()
                .map_ok(|page| page.into_payload())
                .try_collect()
                .await?;
            pages.extend(rest);
            Value::Array(pages)
        }
        (None, false) => first.into_payload(),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
