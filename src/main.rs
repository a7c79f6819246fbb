use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use yjbb_sync::models::{MAX_YEAR, START_YEAR};
use yjbb_sync::{Config, DataCollector, EarningsStore, EastMoneyClient};

/// Incrementally sync quarterly earnings bulletins into SQLite
#[derive(Parser, Debug)]
#[command(name = "yjbb-sync", version, about)]
struct Cli {
    /// Last report year to fetch (inclusive)
    #[arg(value_parser = clap::value_parser!(i32).range((START_YEAR as i64)..=(MAX_YEAR as i64)))]
    end_year: i32,

    /// Last quarter of the end year to fetch (1-4)
    #[arg(value_parser = clap::value_parser!(u32).range(1..=4))]
    end_quarter: u32,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Loads .env, so RUST_LOG from the file reaches the filter below
    let config = Config::from_env().context("failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("yjbb_sync=info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    info!(
        "📋 Syncing into {} (table {}) up to {} Q{}",
        config.database_path, config.table_name, cli.end_year, cli.end_quarter
    );

    let client = EastMoneyClient::new(&config)?;
    let store = EarningsStore::new(&config.database_path, &config.table_name)?;
    let collector = DataCollector::new(Box::new(client), store, &config);

    match collector.incremental_update(cli.end_year, cli.end_quarter) {
        Ok(summary) => {
            if let Some(path) = &summary.snapshot {
                info!("📁 Snapshot written to {}", path.display());
            }
            Ok(())
        }
        Err(e) => {
            error!("❌ Update failed: {}", e);
            Err(e.into())
        }
    }
}
