mod config;
mod errors;
mod exchanges;
mod fetcher;
mod models;
mod output;
mod runner;
mod symbols;
mod timestamp;

use config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    init_tracing(config.log_json);

    tracing::info!(
        "funding-history starting: exchanges {:?}, symbols from {}, output to {}",
        config.exchanges,
        config.symbols_dir.display(),
        config.output_dir.display()
    );

    runner::run(&config).await?;
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
