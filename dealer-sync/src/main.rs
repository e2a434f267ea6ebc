//! dealer-sync: one-shot batch synchronization of the local dealer/city
//! catalog with the upstream showroom feed. Intended to be driven by an
//! external scheduler; re-running after a failure is the recovery path.

mod feed;
mod store;
mod sync;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::feed::HttpDealerFeed;
use crate::sync::registry::DependentRegistry;
use crate::sync::SyncEngine;

#[derive(Parser)]
#[command(name = "dealer-sync", version, about)]
struct Cli {
    /// Path to the catalog database
    #[arg(long, env = "DEALER_SYNC_DATABASE", default_value = "dealer-sync.db")]
    database: PathBuf,

    /// Feed endpoint delivering the city snapshot
    #[arg(long, env = "DEALER_SYNC_CITY_URL")]
    city_url: String,

    /// Feed endpoint delivering the showroom snapshot
    #[arg(long, env = "DEALER_SYNC_SHOWROOM_URL")]
    showroom_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let pool = store::connect(&cli.database).await?;
    store::init_schema(&pool).await?;

    let registry = DependentRegistry::new();
    let feed = HttpDealerFeed::new(cli.city_url, cli.showroom_url);

    let report = SyncEngine::new(pool, registry, feed).run().await?;

    println!(
        "cities: {} | dealers created: {} renumbered: {} updated: {} archived: {} | failures: {}",
        report.cities_synced,
        report.dealers_created,
        report.dealers_renumbered,
        report.dealers_updated,
        report.dealers_archived,
        report.record_failures
    );

    Ok(())
}
