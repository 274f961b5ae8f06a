//! Stock ledger tests
//!
//! Tests for per-store stock including:
//! - Floor-at-zero decrements and the applied delta
//! - Atomicity of concurrent decrements on one record
//! - Operator adjustments, low-stock reporting and the movement journal

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use ordering_backend::error::AppError;
use ordering_backend::repository::InMemoryRepository;
use ordering_backend::services::StockLedger;
use rust_decimal::Decimal;
use shared::{DomainError, StockAdjustment, StockMovementKind, StockRecord};
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

async fn ledger_with(records: &[(Uuid, Uuid, &str, &str)]) -> StockLedger {
    let repo = Arc::new(InMemoryRepository::new());
    for (store_id, product_id, quantity, min_stock) in records {
        repo.put_stock_record(StockRecord::new(
            *store_id,
            *product_id,
            dec(quantity),
            dec(min_stock),
            dec("100"),
            Utc::now(),
        ))
        .await;
    }
    StockLedger::new(repo)
}

// ============================================================================
// Decrements
// ============================================================================

#[tokio::test]
async fn test_decrement_reports_applied_delta() {
    let (store, product) = (Uuid::new_v4(), Uuid::new_v4());
    let ledger = ledger_with(&[(store, product, "12", "2")]).await;

    let within = ledger.decrement_stock(store, product, dec("4.5")).await.unwrap();
    assert_eq!(within.applied, dec("4.5"));
    assert_eq!(within.quantity_after, dec("7.5"));

    let floored = ledger.decrement_stock(store, product, dec("10")).await.unwrap();
    assert_eq!(floored.applied, dec("7.5"));
    assert_eq!(floored.shortfall(), dec("2.5"));
    assert_eq!(floored.quantity_after, Decimal::ZERO);

    let empty = ledger.decrement_stock(store, product, dec("1")).await.unwrap();
    assert_eq!(empty.applied, Decimal::ZERO);
}

#[tokio::test]
async fn test_decrement_missing_record_fails() {
    let ledger = ledger_with(&[]).await;
    let (store, product) = (Uuid::new_v4(), Uuid::new_v4());

    let result = ledger.decrement_stock(store, product, dec("1")).await;

    assert!(matches!(
        result,
        Err(AppError::Domain(DomainError::StockRecordNotFound { store_id, product_id }))
            if store_id == store && product_id == product
    ));
}

#[tokio::test]
async fn test_negative_decrement_is_rejected() {
    let (store, product) = (Uuid::new_v4(), Uuid::new_v4());
    let ledger = ledger_with(&[(store, product, "3", "1")]).await;

    let result = ledger.decrement_stock(store, product, dec("-2")).await;

    assert!(matches!(result, Err(AppError::Validation { .. })));
    assert_eq!(ledger.get_stock(store, product).await.unwrap().quantity, dec("3"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_decrements_do_not_lose_updates() {
    let (store, product) = (Uuid::new_v4(), Uuid::new_v4());
    let ledger = ledger_with(&[(store, product, "100", "0")]).await;

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.decrement_stock(store, product, dec("3")).await })
        })
        .collect();

    let mut applied = Decimal::ZERO;
    for task in tasks {
        applied += task.await.unwrap().unwrap().applied;
    }

    assert_eq!(applied, dec("60"));
    assert_eq!(ledger.get_stock(store, product).await.unwrap().quantity, dec("40"));
}

// ============================================================================
// Adjustments and reporting
// ============================================================================

#[tokio::test]
async fn test_adjustment_updates_thresholds_and_journals() {
    let (store, product) = (Uuid::new_v4(), Uuid::new_v4());
    let ledger = ledger_with(&[(store, product, "8", "2")]).await;

    let record = ledger
        .adjust_stock(
            store,
            product,
            StockAdjustment {
                quantity: Some(dec("25")),
                min_stock: Some(dec("30")),
                max_stock: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(record.quantity, dec("25"));
    assert!(record.is_low_stock());
    assert_eq!(record.max_stock, dec("100"));

    ledger.decrement_stock(store, product, dec("5")).await.unwrap();

    let movements = ledger.list_movements(store, None).await.unwrap();
    let kinds: Vec<StockMovementKind> = movements.iter().map(|m| m.kind).collect();
    assert_eq!(kinds, vec![StockMovementKind::ManualDecrement, StockMovementKind::Adjustment]);
    assert_eq!(movements[1].applied, dec("17"));
    assert_eq!(movements[0].quantity_after, dec("20"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_adjustments_share_one_record() {
    let (store, product) = (Uuid::new_v4(), Uuid::new_v4());
    let ledger = ledger_with(&[]).await;

    let tasks: Vec<_> = (1..=10)
        .map(|n| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                let adjustment = StockAdjustment {
                    quantity: Some(Decimal::from(n)),
                    ..Default::default()
                };
                ledger.adjust_stock(store, product, adjustment).await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let movements = ledger.list_movements(store, None).await.unwrap();
    assert_eq!(movements.len(), 10);
    let journaled: Decimal = movements.iter().map(|m| m.applied).sum();
    let record = ledger.get_stock(store, product).await.unwrap();
    assert_eq!(journaled, record.quantity);
}

#[tokio::test]
async fn test_negative_adjustment_is_rejected() {
    let (store, product) = (Uuid::new_v4(), Uuid::new_v4());
    let ledger = ledger_with(&[(store, product, "8", "2")]).await;

    let result = ledger
        .adjust_stock(
            store,
            product,
            StockAdjustment {
                quantity: Some(dec("-1")),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(
        result,
        Err(AppError::Domain(DomainError::InvalidQuantity { .. }))
    ));
    assert!(ledger.list_movements(store, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_low_stock_report_is_inclusive_and_sorted() {
    let (store_a, store_b) = (Uuid::new_v4(), Uuid::new_v4());
    let (p1, p2, p3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let ledger = ledger_with(&[
        (store_a, p1, "5", "5"),
        (store_a, p2, "50", "5"),
        (store_b, p3, "0", "1"),
        (Uuid::new_v4(), p1, "0", "10"),
    ])
    .await;

    let low = ledger.list_low_stock(&[store_a, store_b]).await.unwrap();

    assert_eq!(low.len(), 2);
    assert!(low.iter().all(|r| r.store_id == store_a || r.store_id == store_b));
    assert!(low
        .windows(2)
        .all(|w| (w[0].store_id, w[0].product_id) <= (w[1].store_id, w[1].product_id)));
    assert!(ledger.list_low_stock(&[]).await.unwrap().is_empty());
}
