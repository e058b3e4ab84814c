//! Rebuilds the raw-vs-optimized comparison report from cached artifacts.
//!
//! Without `--from`, `--to` or `--agent-id` the most recent cached pair is used.

use clap::Parser;
use dotenvy::dotenv;
use report_wrapper::cache_store::CacheStore;
use report_wrapper::cli::SlotArgs;
use report_wrapper::config::Config;
use report_wrapper::pipeline::compare_from_cache;

#[derive(Debug, Parser)]
#[command(author, version, about = "Rebuild the comparison report from the cache")]
struct Cli {
    /// Endpoint key (e.g. report_lia) or literal upstream path
    endpoint: String,

    #[command(flatten)]
    slot: SlotArgs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let cache = CacheStore::new(config.cache_dir.clone());
    let params = cli.slot.to_params();
    let selector = (!cli.slot.is_empty()).then_some(&params);

    let Some(artifacts) = compare_from_cache(&cache, &cli.endpoint, selector).await? else {
        return Err(format!(
            "No cached raw/optimized pair for '{}' under {}",
            cli.endpoint,
            cache.root().display()
        )
        .into());
    };

    tracing::info!(
        "Comparison written: {} ({} bytes saved)",
        artifacts.markdown.display(),
        artifacts.metrics.size_saved_bytes
    );
    println!("{}", artifacts.markdown.display());
    println!("{}", artifacts.html.display());
    println!("{}", artifacts.metrics_json.display());
    for line in &artifacts.metrics.summary {
        println!("- {}", line);
    }
    Ok(())
}
