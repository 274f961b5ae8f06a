//! Multi-store stock consolidation
//!
//! Rolls per-store stock records up into one entry per product for
//! dashboards covering several stores.

use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{ConsolidatedStockEntry, StockRecord, StoreStockDetail};

/// Consolidate every record given, grouped by product.
///
/// Products with no record are absent from the result: "not stocked" is
/// different from "stocked at zero". Fails if a product's total cannot be
/// represented.
pub fn consolidate<'a, I>(records: I) -> DomainResult<BTreeMap<Uuid, ConsolidatedStockEntry>>
where
    I: IntoIterator<Item = &'a StockRecord>,
{
    let mut groups: BTreeMap<Uuid, Vec<&StockRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.product_id).or_default().push(record);
    }

    let mut entries = BTreeMap::new();
    for (product_id, group) in groups {
        if let Some(entry) = rollup(product_id, group)? {
            entries.insert(product_id, entry);
        }
    }
    Ok(entries)
}

/// Consolidate only the records belonging to `store_ids`
pub fn consolidate_for_stores(
    records: &[StockRecord],
    store_ids: &[Uuid],
) -> DomainResult<BTreeMap<Uuid, ConsolidatedStockEntry>> {
    if store_ids.is_empty() {
        return Ok(BTreeMap::new());
    }
    let stores: HashSet<&Uuid> = store_ids.iter().collect();
    consolidate(records.iter().filter(|record| stores.contains(&record.store_id)))
}

fn rollup(product_id: Uuid, mut group: Vec<&StockRecord>) -> DomainResult<Option<ConsolidatedStockEntry>> {
    group.sort_by_key(|record| record.store_id);
    let Some(first) = group.first().map(|record| record.quantity) else {
        return Ok(None);
    };

    let mut total = Decimal::ZERO;
    let mut min = first;
    let mut max = first;
    let mut low_stock = 0;

    for record in &group {
        total = total.checked_add(record.quantity).ok_or_else(|| {
            DomainError::invalid_quantity(format!("total_quantity[{}]", product_id), record.quantity)
        })?;
        min = min.min(record.quantity);
        max = max.max(record.quantity);
        if record.is_low_stock() {
            low_stock += 1;
        }
    }

    let count = group.len();

    Ok(Some(ConsolidatedStockEntry {
        product_id,
        product_name: None,
        total_quantity: total,
        average_quantity: total / Decimal::from(count),
        min_quantity: min,
        max_quantity: max,
        store_count: count,
        low_stock_store_count: low_stock,
        stores: group.into_iter().map(StoreStockDetail::from).collect(),
    }))
}

/// Records at or below their store's minimum, sorted by store then product
pub fn low_stock_records<'a, I>(records: I) -> Vec<StockRecord>
where
    I: IntoIterator<Item = &'a StockRecord>,
{
    let mut low: Vec<StockRecord> = records
        .into_iter()
        .filter(|record| record.is_low_stock())
        .cloned()
        .collect();
    low.sort_by_key(|record| (record.store_id, record.product_id));
    low
}
