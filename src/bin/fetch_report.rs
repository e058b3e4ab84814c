//! One-shot call to the report API: fetches, caches the raw document and
//! prints (or writes) the optimized JSON.

use clap::Parser;
use dotenvy::dotenv;
use report_wrapper::cache_store::CacheStore;
use report_wrapper::cli::SlotArgs;
use report_wrapper::config::Config;
use report_wrapper::endpoints::{EndpointRegistry, Params};
use report_wrapper::pipeline::ReportPipeline;
use report_wrapper::report_client::ReportApiClient;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(author, version, about = "Fetch one report and print the optimized JSON")]
struct Cli {
    /// Endpoint key from the registry (e.g. report_lia) or a literal upstream path
    #[arg(long, value_name = "KEY")]
    endpoint: String,

    /// Upstream `by` parameter
    #[arg(long)]
    by: Option<String>,

    /// Upstream `messageHistory` parameter
    #[arg(long = "message-history", alias = "messageHistory", value_name = "BOOL")]
    message_history: Option<String>,

    #[command(flatten)]
    slot: SlotArgs,

    /// Do not write `optimized_*.json` to the cache
    #[arg(long)]
    no_save_optimized: bool,

    /// Write the optimized JSON to this file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

impl Cli {
    fn params(&self) -> Params {
        let mut params = self.slot.to_params();
        if let Some(by) = &self.by {
            params.insert("by".to_string(), by.clone());
        }
        if let Some(history) = &self.message_history {
            params.insert("messageHistory".to_string(), history.clone());
        }
        params
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let registry = Arc::new(EndpointRegistry::load(&config.endpoints_file)?);
    let client = ReportApiClient::new(
        config.base_url.clone(),
        config.api_key.clone(),
        config.upstream_timeout(),
    )?;
    let pipeline = ReportPipeline::new(registry, client, CacheStore::new(config.cache_dir.clone()));

    let optimized = pipeline
        .fetch_optimized(&cli.endpoint, cli.params(), !cli.no_save_optimized)
        .await?;
    let text = serde_json::to_string_pretty(&optimized)?;

    match &cli.output {
        Some(path) => {
            tokio::fs::write(path, text).await?;
            tracing::info!("✓ Optimized report written to {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}
