//! Stock consolidation tests
//!
//! Consolidated views read live per-store stock and pick up product names
//! from the catalog when it has them.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use ordering_backend::repository::InMemoryRepository;
use ordering_backend::services::{ConsolidationService, StockLedger};
use rust_decimal::Decimal;
use shared::{Product, StockRecord};
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

async fn put(repo: &InMemoryRepository, store_id: Uuid, product_id: Uuid, quantity: &str, min_stock: &str) {
    repo.put_stock_record(StockRecord::new(
        store_id,
        product_id,
        dec(quantity),
        dec(min_stock),
        dec("150"),
        Utc::now(),
    ))
    .await;
}

#[tokio::test]
async fn test_two_store_rollup_with_catalog_name() {
    let repo = Arc::new(InMemoryRepository::new());
    let (store_a, store_b, product) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    put(&repo, store_a, product, "100", "20").await;
    put(&repo, store_b, product, "10", "15").await;
    repo.put_product(Product {
        id: product,
        reference: "FAR-T45".to_string(),
        name: "Farine T45".to_string(),
        unit: "kg".to_string(),
        unit_price: dec("1.20"),
        is_active: true,
    })
    .await;

    let service = ConsolidationService::new(repo.clone(), repo.clone());
    let result = service.get_consolidated_stock(&[store_a, store_b]).await.unwrap();

    let entry = &result[&product];
    assert_eq!(entry.product_name.as_deref(), Some("Farine T45"));
    assert_eq!(entry.total_quantity, dec("110"));
    assert_eq!(entry.average_quantity, dec("55"));
    assert_eq!(entry.min_quantity, dec("10"));
    assert_eq!(entry.max_quantity, dec("100"));
    assert_eq!(entry.low_stock_store_count, 1);
    let low: Vec<Uuid> = entry
        .stores
        .iter()
        .filter(|s| s.is_low_stock)
        .map(|s| s.store_id)
        .collect();
    assert_eq!(low, vec![store_b]);
}

#[tokio::test]
async fn test_product_missing_from_catalog_keeps_its_entry() {
    let repo = Arc::new(InMemoryRepository::new());
    let (store, product) = (Uuid::new_v4(), Uuid::new_v4());
    put(&repo, store, product, "0", "0").await;

    let service = ConsolidationService::new(repo.clone(), repo.clone());
    let result = service.get_consolidated_stock(&[store]).await.unwrap();

    let entry = &result[&product];
    assert!(entry.product_name.is_none());
    assert_eq!(entry.total_quantity, Decimal::ZERO);
    assert_eq!(entry.store_count, 1);
}

#[tokio::test]
async fn test_empty_store_set_and_unknown_stores() {
    let repo = Arc::new(InMemoryRepository::new());
    put(&repo, Uuid::new_v4(), Uuid::new_v4(), "5", "1").await;

    let service = ConsolidationService::new(repo.clone(), repo.clone());

    assert!(service.get_consolidated_stock(&[]).await.unwrap().is_empty());
    assert!(service
        .get_consolidated_stock(&[Uuid::new_v4()])
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_consolidation_reflects_ledger_writes() {
    let repo = Arc::new(InMemoryRepository::new());
    let (store_a, store_b, product) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    put(&repo, store_a, product, "30", "10").await;
    put(&repo, store_b, product, "30", "10").await;

    let ledger = StockLedger::new(repo.clone());
    let service = ConsolidationService::new(repo.clone(), repo.clone());

    ledger.decrement_stock(store_a, product, dec("25")).await.unwrap();

    let result = service.get_consolidated_stock(&[store_a, store_b]).await.unwrap();
    let entry = &result[&product];
    assert_eq!(entry.total_quantity, dec("35"));
    assert_eq!(entry.min_quantity, dec("5"));
    assert_eq!(entry.low_stock_store_count, 1);
}
