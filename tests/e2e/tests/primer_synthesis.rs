//! The System Primer: regeneration after ingestion, collapsed-vs-expanded
//! taxonomy rendering, and the record `initialize_context` surfaces.

use memory_core::primer::{self, PRIMER_PATH};
use memory_core::store::{memories, retrieval as store_retrieval};
use memory_core::testing::{test_config, FakeGateway};
use memory_core::Store;
use uuid::Uuid;

async fn test_store() -> Store {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for e2e tests");
    let config = test_config(database_url);
    Store::connect(&config).await.expect("failed to connect test store")
}

#[tokio::test]
async fn wide_branch_collapses_with_explorable_pointer() {
    let store = test_store().await;
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let config = test_config(database_url);
    let gateway = FakeGateway::from_config(&config);

    let mut tx = store.begin().await.unwrap();
    let now = chrono::Utc::now();
    for i in 0..60 {
        let content = format!("Feature flag item number {i} for the myapp rollout plan.");
        let embedding = vec![0.1 * (i as f32); config.embed_dim];
        memories::upsert(
            &mut tx,
            Uuid::new_v4(),
            &content,
            &embedding,
            &format!("projects.myapp.item{i}"),
            None,
            None,
            &serde_json::json!({"volatility_class": "low"}),
            now,
        )
        .await
        .unwrap();
    }
    tx.commit().await.unwrap();

    let primer_id = primer::refresh_primer(&store, &gateway, true).await.unwrap();
    let mut conn = store.acquire().await.unwrap();
    let primer_memory = memories::fetch_by_id(&mut conn, primer_id).await.unwrap().unwrap();

    assert!(primer_memory.content.contains("myapp/"));
    assert!(primer_memory.content.contains("more"));
    assert!(primer_memory.content.contains("explore_taxonomy('projects.myapp')"));

    let expanded = memory_core::retrieval::explore_taxonomy(&store, "projects.myapp").await.unwrap();
    assert_eq!(expanded.total, 60);
    assert_eq!(expanded.categories.len(), 60);
}

#[tokio::test]
async fn primer_is_the_sole_active_system_record() {
    let store = test_store().await;
    let gateway = FakeGateway::new(16);

    primer::refresh_primer(&store, &gateway, true).await.unwrap();
    primer::refresh_primer(&store, &gateway, false).await.unwrap();

    let mut conn = store.acquire().await.unwrap();
    let records = store_retrieval::system_records(&mut conn).await.unwrap();
    let primer_rows: Vec<_> = records.iter().filter(|(_, _, path, ..)| path == PRIMER_PATH).collect();
    assert_eq!(primer_rows.len(), 1, "only one primer record should be active at a time");
}
