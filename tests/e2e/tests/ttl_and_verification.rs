//! TTL expiry and the verification-schedule recomputation, against a live
//! Postgres instance. The daemon itself reads wall-clock time, so elapsed
//! time is simulated by backdating `updated_at`/`archived_at` directly —
//! the same trick any integration test reaches for when the subject stamps
//! its own `now()`.

use chrono::{Duration, Utc};
use memory_core::testing::{test_config, FakeGateway};
use memory_core::{pipeline, store::memories, ttl_daemon, Store};

async fn test_store() -> Store {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for e2e tests");
    let config = test_config(database_url);
    Store::connect(&config).await.expect("failed to connect test store")
}

#[tokio::test]
async fn ttl_expiry_archives_then_hard_deletes() {
    let store = test_store().await;
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let config = test_config(database_url);
    let gateway = FakeGateway::from_config(&config);

    let memory_id = pipeline::run_ingestion_pipeline(
        &store,
        &gateway,
        &config,
        "This scratch note about tomorrow's standup should expire quickly.",
        Some(1),
    )
    .await
    .unwrap();

    let mut conn = store.acquire().await.unwrap();
    let backdated = Utc::now() - Duration::days(2);
    sqlx::query("UPDATE memories SET updated_at = $1 WHERE id = $2")
        .bind(backdated)
        .bind(memory_id)
        .execute(&mut *conn)
        .await
        .unwrap();
    drop(conn);

    ttl_daemon::run_once(&store, &gateway, &config).await.unwrap();

    let mut conn = store.acquire().await.unwrap();
    let memory = memories::fetch_by_id(&mut conn, memory_id).await.unwrap().expect("memory should still exist, just archived");
    assert!(memory.archived_at.is_some(), "ttl-expired memory should be archived after the first tick");
    drop(conn);

    let mut conn = store.acquire().await.unwrap();
    let long_ago = Utc::now() - Duration::days(31);
    sqlx::query("UPDATE memories SET archived_at = $1 WHERE id = $2")
        .bind(long_ago)
        .bind(memory_id)
        .execute(&mut *conn)
        .await
        .unwrap();
    drop(conn);

    ttl_daemon::run_once(&store, &gateway, &config).await.unwrap();

    let mut conn = store.acquire().await.unwrap();
    let gone = memories::fetch_by_id(&mut conn, memory_id).await.unwrap();
    assert!(gone.is_none(), "memory archived for 30+ days should be hard-deleted");
}

#[tokio::test]
async fn confirming_validity_advances_verify_after_without_changing_content() {
    let store = test_store().await;
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let config = test_config(database_url);
    let gateway = FakeGateway::from_config(&config);

    let memory_id = pipeline::run_ingestion_pipeline(
        &store,
        &gateway,
        &config,
        "The on-call rotation is handled by the platform team.",
        None,
    )
    .await
    .unwrap();

    let mut conn = store.acquire().await.unwrap();
    let before = memories::fetch_by_id(&mut conn, memory_id).await.unwrap().unwrap();

    let now = Utc::now();
    let next = before.volatility_class().verify_after_from(now);
    memories::set_verify_after(&mut conn, memory_id, next, now).await.unwrap();

    let after = memories::fetch_by_id(&mut conn, memory_id).await.unwrap().unwrap();
    assert_eq!(after.content, before.content, "confirming validity must not alter content");
    assert_eq!(after.verify_after, next);
}
