use crate::config::Config;
use crate::error::Result;
use crate::llm::LlmGateway;
use crate::primer;
use crate::store::{context_store, memories, staging, Store};
use chrono::Utc;
use std::time::Duration;
use tracing::{error, info};

const TICK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Runs the hourly maintenance sweep until `shutdown` resolves. Every tick's
/// four steps run inside one transaction — a stronger consistency guarantee
/// than strictly required, but the simplest faithful reading of "in one
/// transaction it performs, in order."
pub async fn run(store: Store, gateway: impl LlmGateway + 'static, config: Config, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(TICK_INTERVAL) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("ttl daemon shutting down");
                    return;
                }
            }
        }

        if *shutdown.borrow() {
            return;
        }

        if let Err(e) = tick(&store, &gateway, &config).await {
            error!(error = %e, "ttl daemon tick failed");
        }
    }
}

/// Runs one maintenance sweep synchronously — the hook integration tests use
/// to trigger the daemon deterministically after advancing a job's
/// `verify_after`/TTL rather than waiting out the hourly tick.
pub async fn run_once(store: &Store, gateway: &impl LlmGateway, config: &Config) -> Result<()> {
    tick(store, gateway, config).await
}

async fn tick(store: &Store, gateway: &impl LlmGateway, config: &Config) -> Result<()> {
    let now = Utc::now();
    let mut tx = store.begin().await?;

    let archived = memories::soft_archive_expired_ttl(&mut tx, now).await?;
    let deleted = memories::hard_delete_archived(&mut tx, now).await?;
    let staging_purged = staging::purge_finished_older_than(&mut tx, now, config.staging_retention_days).await?;
    let context_purged = context_store::purge_expired(&mut tx, now).await?;

    tx.commit().await?;

    info!(archived, deleted, staging_purged, context_purged, "ttl daemon tick complete");

    if archived > 0 || deleted > 0 || staging_purged > 0 {
        primer::refresh_primer(store, gateway, true).await?;
    }

    Ok(())
}
