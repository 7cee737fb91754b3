//! Foreground catalog sweep.
//!
//! Runs one reconciliation sweep with the same engine the background job
//! uses, then logs the tally. Useful for backfilling a fresh database or
//! checking eBay credentials without starting the server.
//!
//! Reads the full server environment (it needs both the database and the
//! eBay credentials), so point it at the same `.env` the server uses.

use partsmith_server::config::{AppConfig, ConfigError};
use partsmith_server::db;
use partsmith_server::ebay::EbayClient;
use partsmith_server::sync::{SweepConfig, run_sweep};

/// Sweep command failures.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// The environment did not parse.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// eBay credentials are absent from the environment.
    #[error("eBay is not configured; set EBAY_CLIENT_ID and EBAY_CLIENT_SECRET")]
    EbayNotConfigured,

    /// Could not connect to the database.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Run a single sweep and log the summary.
pub async fn run() -> Result<(), SweepError> {
    let config = AppConfig::from_env()?;
    let Some(ebay_config) = config.ebay else {
        return Err(SweepError::EbayNotConfigured);
    };

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;

    let client = EbayClient::new(ebay_config.clone());
    let sweep_config = SweepConfig::from(&ebay_config);

    tracing::info!(store = %ebay_config.store_name, "Sweep starting");
    let summary = run_sweep(&client, &pool, &sweep_config).await;
    tracing::info!(
        seen = summary.seen,
        fetched = summary.fetched,
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped,
        failed = summary.failed,
        "Sweep finished"
    );

    Ok(())
}
