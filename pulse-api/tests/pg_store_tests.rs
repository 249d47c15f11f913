//! PostgreSQL product store tests
//!
//! Require a reachable database configured through `PULSE_DB_*` and run only
//! with `--features db-tests`. Each test works on identifiers derived from a
//! fresh UUID so runs do not interfere.

#![cfg(feature = "db-tests")]

use chrono::{Duration as ChronoDuration, Utc};
use pulse_api::{ApiResult, DbConfig, PgProductStore};
use pulse_core::{Asin, MetricSnapshot};
use pulse_storage::ProductStore;
use pulse_test_utils::sample_product;
use uuid::Uuid;

async fn test_store() -> PgProductStore {
    let pool = DbConfig::from_env()
        .create_pool()
        .expect("Failed to create database pool");
    let store = PgProductStore::new(pool);
    store.ensure_schema().await.expect("Failed to ensure schema");
    store
}

fn unique_asin() -> Asin {
    let simple = Uuid::now_v7().simple().to_string().to_ascii_uppercase();
    Asin::parse(&simple[simple.len() - 10..]).expect("hex suffix is a valid ASIN")
}

#[tokio::test]
async fn upsert_then_get_round_trips_attributes() -> ApiResult<()> {
    let store = test_store().await;
    let asin = unique_asin();
    let product = sample_product(&asin, Utc::now());

    store.product_upsert(&product).await?;
    let stored = store.product_get(&asin, 30).await?.expect("product stored");

    assert_eq!(stored.product.asin, asin);
    assert_eq!(stored.product.title, product.title);
    assert_eq!(stored.product.bsr, product.bsr);
    assert_eq!(stored.product.seasonality_tags, product.seasonality_tags);
    assert!(stored.snapshots.is_empty());
    Ok(())
}

#[tokio::test]
async fn upsert_overwrites_existing_row() -> ApiResult<()> {
    let store = test_store().await;
    let asin = unique_asin();
    let mut product = sample_product(&asin, Utc::now());
    store.product_upsert(&product).await?;

    product.price = 19.5;
    product.bsr = 42;
    store.product_upsert(&product).await?;

    let stored = store.product_get(&asin, 30).await?.expect("product stored");
    assert_eq!(stored.product.price, 19.5);
    assert_eq!(stored.product.bsr, 42);
    Ok(())
}

#[tokio::test]
async fn snapshots_are_returned_newest_first_and_limited() -> ApiResult<()> {
    let store = test_store().await;
    let asin = unique_asin();
    let now = Utc::now();
    let product = sample_product(&asin, now);
    store.product_upsert(&product).await?;

    for days_ago in 0..5 {
        let snapshot = MetricSnapshot::capture(&product, now - ChronoDuration::days(days_ago));
        store.snapshot_append(&snapshot).await?;
    }

    let stored = store.product_get(&asin, 3).await?.expect("product stored");
    assert_eq!(stored.snapshots.len(), 3);
    assert!(stored.snapshots[0].timestamp > stored.snapshots[1].timestamp);
    assert!(stored.snapshots[1].timestamp > stored.snapshots[2].timestamp);
    Ok(())
}

#[tokio::test]
async fn missing_product_is_none() -> ApiResult<()> {
    let store = test_store().await;
    assert!(store.product_get(&unique_asin(), 30).await?.is_none());
    store.ping().await?;
    Ok(())
}
