//! Drives the staging queue end to end against a live Postgres instance:
//! enqueue, claim, run the pipeline, mark complete, and observe the effects
//! a caller would see through `memorize_context`/`check_ingestion_status`.
//!
//! Requires `DATABASE_URL` to point at a reachable Postgres with the
//! `vector` and `ltree` extensions installable by the running user.

use memory_core::store::{memories, staging, taxonomy};
use memory_core::testing::{test_config, FakeGateway};
use memory_core::types::JobStatus;
use memory_core::{worker, Store};

async fn test_store() -> Store {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for e2e tests");
    let config = test_config(database_url);
    Store::connect(&config).await.expect("failed to connect test store")
}

#[tokio::test]
async fn fresh_ingest_produces_two_categories_and_is_findable() {
    let store = test_store().await;
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let config = test_config(database_url);
    let gateway = FakeGateway::from_config(&config);

    let text = "I live in Berlin.\n\nI work on Acme's billing service project.";
    let mut conn = store.acquire().await.unwrap();
    let job_id = staging::enqueue(&mut conn, text, None).await.unwrap();
    drop(conn);

    let claimed = worker::run_once(&store, &gateway, &config).await.unwrap();
    assert!(claimed, "expected the queued job to be claimed");

    let mut conn = store.acquire().await.unwrap();
    let job = staging::fetch_status(&mut conn, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Complete);

    let categories = taxonomy::category_counts(&mut conn).await.unwrap();
    let under_profile = categories.iter().any(|(c, _)| c.starts_with("profile"));
    let under_project_or_org = categories
        .iter()
        .any(|(c, _)| c.starts_with("projects") || c.starts_with("organizations"));
    assert!(under_profile, "expected a profile.* category, got {categories:?}");
    assert!(under_project_or_org, "expected a projects.*/organizations.* category, got {categories:?}");
}

#[tokio::test]
async fn exact_reingest_bumps_access_without_new_rows() {
    let store = test_store().await;
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let config = test_config(database_url);
    let gateway = FakeGateway::from_config(&config);

    let text = "The quarterly roadmap review happens every Tuesday at 10am.";

    let mut conn = store.acquire().await.unwrap();
    staging::enqueue(&mut conn, text, None).await.unwrap();
    drop(conn);
    worker::run_once(&store, &gateway, &config).await.unwrap();

    let mut conn = store.acquire().await.unwrap();
    let before = taxonomy::category_counts(&mut conn).await.unwrap();
    let total_before: i64 = before.iter().map(|(_, c)| c).sum();
    drop(conn);

    let mut conn = store.acquire().await.unwrap();
    staging::enqueue(&mut conn, text, None).await.unwrap();
    drop(conn);
    let claimed = worker::run_once(&store, &gateway, &config).await.unwrap();
    assert!(claimed);

    let mut conn = store.acquire().await.unwrap();
    let after = taxonomy::category_counts(&mut conn).await.unwrap();
    let total_after: i64 = after.iter().map(|(_, c)| c).sum();
    assert_eq!(total_before, total_after, "re-ingesting identical text must not create new memories");
}

#[tokio::test]
async fn failed_job_is_marked_failed_not_lost() {
    let store = test_store().await;
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let mut config = test_config(database_url);
    config.min_section_length = 10_000; // guarantees segmentation yields nothing usable

    let gateway = FakeGateway::from_config(&config);

    let mut conn = store.acquire().await.unwrap();
    let job_id = staging::enqueue(&mut conn, "too short for this config", None).await.unwrap();
    drop(conn);

    worker::run_once(&store, &gateway, &config).await.unwrap();

    let mut conn = store.acquire().await.unwrap();
    let job = staging::fetch_status(&mut conn, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.is_some());
    let _ = memories::active_count(&mut conn).await;
}
