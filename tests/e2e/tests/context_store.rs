//! The context store's own lifecycle — disjoint from the memory engine,
//! short-lived, TTL-bounded key/value data for session-scoped working state.

use chrono::{Duration, Utc};
use memory_core::store::context_store;
use memory_core::testing::test_config;
use memory_core::Store;

async fn test_store() -> Store {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for e2e tests");
    let config = test_config(database_url);
    Store::connect(&config).await.expect("failed to connect test store")
}

#[tokio::test]
async fn set_get_delete_round_trip() {
    let store = test_store().await;
    let mut conn = store.acquire().await.unwrap();
    let now = Utc::now();

    context_store::set_context(&mut conn, "ctx_roundtrip_key", "hello", "session", 24, now).await.unwrap();

    let entry = context_store::get_context(&mut conn, "ctx_roundtrip_key", now).await.unwrap();
    assert_eq!(entry.unwrap().value, "hello");

    let deleted = context_store::delete_context(&mut conn, "ctx_roundtrip_key").await.unwrap();
    assert!(deleted);

    let gone = context_store::get_context(&mut conn, "ctx_roundtrip_key", now).await.unwrap();
    assert!(gone.is_none());
}

#[tokio::test]
async fn expired_entries_are_invisible_even_before_the_daemon_purges_them() {
    let store = test_store().await;
    let mut conn = store.acquire().await.unwrap();
    let now = Utc::now();

    // ttl_hours = 0 means expires_at == now, so "now + 1 second" already reads as expired.
    context_store::set_context(&mut conn, "ctx_expiring_key", "ephemeral", "session", 0, now).await.unwrap();

    let later = now + Duration::seconds(1);
    let entry = context_store::get_context(&mut conn, "ctx_expiring_key", later).await.unwrap();
    assert!(entry.is_none(), "an entry past its expires_at must not be returned");
}

#[tokio::test]
async fn extend_ttl_is_clamped_to_720_hours() {
    let store = test_store().await;
    let mut conn = store.acquire().await.unwrap();
    let now = Utc::now();

    context_store::set_context(&mut conn, "ctx_extend_key", "working data", "session", 1, now).await.unwrap();

    let extended = context_store::extend_context_ttl(&mut conn, "ctx_extend_key", 10_000, now).await.unwrap();
    let expires_at = extended.expect("key exists and is not yet expired");

    let max_allowed = now + Duration::hours(720);
    assert!(expires_at <= max_allowed, "extend_context_ttl must clamp to now + 720h");
}

#[tokio::test]
async fn list_context_keys_filters_by_scope() {
    let store = test_store().await;
    let mut conn = store.acquire().await.unwrap();
    let now = Utc::now();

    context_store::set_context(&mut conn, "ctx_scope_a", "a", "session", 24, now).await.unwrap();
    context_store::set_context(&mut conn, "ctx_scope_b", "b", "agent", 24, now).await.unwrap();

    let session_only = context_store::list_context_keys(&mut conn, Some("session"), now).await.unwrap();
    assert!(session_only.iter().any(|e| e.key == "ctx_scope_a"));
    assert!(!session_only.iter().any(|e| e.key == "ctx_scope_b"));
}
