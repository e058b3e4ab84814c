//! Prints the dashboard JSON for a saved report document, either a file (raw or
//! optimized) or the cached optimized artifact of an endpoint.

use clap::{ArgGroup, Parser};
use dotenvy::dotenv;
use report_wrapper::cache_store::{Artifact, CacheStore};
use report_wrapper::cli::SlotArgs;
use report_wrapper::config::Config;
use report_wrapper::dashboard::build_dashboard_payload;
use report_wrapper::optimizer::optimize;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about = "Print the dashboard for a report document")]
#[command(group(ArgGroup::new("source").required(true).args(["file", "endpoint"])))]
struct Cli {
    /// JSON report document (raw or optimized)
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Read the cached optimized document of this endpoint
    #[arg(long, value_name = "KEY")]
    endpoint: Option<String>,

    #[command(flatten)]
    slot: SlotArgs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let doc: Value = match (cli.file, cli.endpoint) {
        (Some(path), _) => {
            let content = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str(&content)?
        }
        (None, Some(key)) => {
            let config = Config::from_env()?;
            let cache = CacheStore::new(config.cache_dir.clone());
            let params = cli.slot.to_params();
            cache
                .read_json(&key, &params, Artifact::Optimized)
                .await
                .ok_or_else(|| {
                    format!(
                        "No cached optimized document at {}",
                        cache.artifact_path(&key, &params, Artifact::Optimized).display()
                    )
                })?
        }
        (None, None) => return Err("one of --file or --endpoint is required".into()),
    };

    // Optimizing an already optimized document is a no-op
    let payload = build_dashboard_payload(&optimize(&doc));
    println!("{}", serde_json::to_string_pretty(&payload)?);
    tracing::info!(
        "Dashboard built for {} conversation(s)",
        payload.overview.total_conversations
    );
    Ok(())
}
