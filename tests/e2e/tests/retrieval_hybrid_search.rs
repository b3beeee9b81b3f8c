//! Hybrid (vector + lexical) search scenarios against a live Postgres
//! instance, using the deterministic `FakeGateway` so ranking is reproducible.

use memory_core::retrieval;
use memory_core::testing::{test_config, FakeGateway};
use memory_core::Store;

async fn test_store() -> Store {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for e2e tests");
    let config = test_config(database_url);
    Store::connect(&config).await.expect("failed to connect test store")
}

#[tokio::test]
async fn keyword_overlap_surfaces_both_related_notes() {
    let store = test_store().await;
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let config = test_config(database_url);
    let gateway = FakeGateway::from_config(&config);

    memory_core::pipeline::run_ingestion_pipeline(
        &store,
        &gateway,
        &config,
        "Postgres vacuum tuning notes for the analytics cluster.",
        None,
    )
    .await
    .unwrap();

    memory_core::pipeline::run_ingestion_pipeline(
        &store,
        &gateway,
        &config,
        "Autovacuum thresholds for large tables need to be raised quarterly.",
        None,
    )
    .await
    .unwrap();

    let hits = retrieval::search_memory(&store, &gateway, &config, "autovacuum tuning", None, Some(10))
        .await
        .unwrap();

    assert!(hits.len() >= 2, "expected both vacuum-related notes to surface, got {hits:?}");
    let top_two: Vec<&str> = hits.iter().take(2).map(|h| h.content.as_str()).collect();
    assert!(top_two.iter().any(|c| c.contains("Autovacuum")));
}

#[tokio::test]
async fn category_filter_narrows_results() {
    let store = test_store().await;
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let config = test_config(database_url);
    let gateway = FakeGateway::from_config(&config);

    memory_core::pipeline::run_ingestion_pipeline(
        &store,
        &gateway,
        &config,
        "My employer is Acme Corp and I work remotely.",
        None,
    )
    .await
    .unwrap();

    let hits = retrieval::search_memory(&store, &gateway, &config, "employer", Some("organizations"), Some(10))
        .await
        .unwrap();

    for hit in &hits {
        assert!(hit.category_path.starts_with("organizations"), "unexpected category {}", hit.category_path);
    }
}
