//! Background scheduling for the catalog sweep.

use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::config::EbayConfig;
use crate::ebay::EbayClient;

use super::engine::{SweepConfig, run_sweep};

/// Spawns the periodic catalog sweep.
///
/// The first sweep runs immediately; later ones follow the configured
/// interval. A slow sweep delays the next tick instead of stacking runs.
/// Failures inside a sweep are logged per listing and never stop the task;
/// only process shutdown does.
pub fn spawn_sync_job(client: EbayClient, pool: PgPool, config: &EbayConfig) -> JoinHandle<()> {
    let sweep_config = SweepConfig::from(config);
    let period = config.sync_interval;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            info!("Catalog sweep starting");
            let summary = run_sweep(&client, &pool, &sweep_config).await;
            info!(
                seen = summary.seen,
                fetched = summary.fetched,
                created = summary.created,
                updated = summary.updated,
                skipped = summary.skipped,
                failed = summary.failed,
                "Catalog sweep finished"
            );
        }
    })
}
