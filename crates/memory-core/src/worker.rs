use crate::config::Config;
use crate::llm::LlmGateway;
use crate::pipeline;
use crate::store::{staging, Store};
use std::time::Duration;
use tracing::{error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);
const FAILURE_MESSAGE_MAX_LEN: usize = 1000;

/// The single long-lived ingestion worker. Resets orphaned `processing` rows
/// once at startup (a crash mid-job leaves them there), then polls the
/// staging table every 2 seconds, claiming at most one job per tick.
///
/// Runs until `shutdown` resolves; never panics on a per-job failure — a
/// failing job is recorded as `failed` and the loop continues.
pub async fn run(store: Store, gateway: impl LlmGateway + 'static, config: Config, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    match store.acquire().await {
        Ok(mut conn) => match staging::reset_orphaned_processing(&mut conn).await {
            Ok(reset) if reset > 0 => info!(reset, "reset orphaned processing jobs at startup"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "failed to reset orphaned processing jobs"),
        },
        Err(e) => error!(error = %e, "failed to acquire connection for startup reset"),
    }

    loop {
        if *shutdown.borrow() {
            info!("worker shutting down");
            return;
        }

        match tick(&store, &gateway, &config).await {
            Ok(true) => continue,
            Ok(false) => {
                tokio::select! {
                    _ = tokio::time::sleep(POLL_INTERVAL) => {}
                    _ = shutdown.changed() => {}
                }
            }
            Err(e) => {
                error!(error = %e, "worker tick failed, backing off");
                tokio::select! {
                    _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }
    }
}

/// Claims and runs exactly one pending job, synchronously, without the
/// polling loop — the hook integration tests use to drive ingestion
/// deterministically instead of racing a spawned `run` task.
pub async fn run_once(store: &Store, gateway: &impl LlmGateway, config: &Config) -> crate::error::Result<bool> {
    tick(store, gateway, config).await
}

/// Claims and runs at most one job. Returns `true` if a job was claimed
/// (so the caller should immediately check for more work rather than wait
/// out the poll interval), `false` if the queue was empty.
async fn tick(store: &Store, gateway: &impl LlmGateway, config: &Config) -> crate::error::Result<bool> {
    let job = {
        let mut conn = store.acquire().await?;
        staging::claim_next_pending(&mut conn).await?
    };

    let Some(job) = job else {
        return Ok(false);
    };

    info!(job_id = %job.job_id, "claimed ingestion job");

    match pipeline::run_ingestion_pipeline(store, gateway, config, &job.raw_text, job.ttl_days).await {
        Ok(effective_id) => {
            let mut conn = store.acquire().await?;
            staging::mark_complete(&mut conn, job.job_id).await?;
            info!(job_id = %job.job_id, memory_id = %effective_id, "ingestion job complete");
        }
        Err(e) => {
            let message: String = e.to_string().chars().take(FAILURE_MESSAGE_MAX_LEN).collect();
            warn!(job_id = %job.job_id, error = %message, "ingestion job failed");
            let mut conn = store.acquire().await?;
            staging::mark_failed(&mut conn, job.job_id, &message).await?;
        }
    }

    Ok(true)
}
