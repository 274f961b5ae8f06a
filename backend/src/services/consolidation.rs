//! Multi-store stock consolidation for dashboards

use std::collections::BTreeMap;
use std::sync::Arc;

use shared::{consolidate_for_stores, ConsolidatedStockEntry};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppResult;
use crate::repository::{ProductCatalog, StockRepository};

/// Consolidation service reading live stock and enriching it from the catalog
#[derive(Clone)]
pub struct ConsolidationService {
    stock: Arc<dyn StockRepository>,
    catalog: Arc<dyn ProductCatalog>,
}

impl ConsolidationService {
    /// Create a new ConsolidationService instance
    pub fn new(stock: Arc<dyn StockRepository>, catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { stock, catalog }
    }

    /// Per-product rollup of the given stores, keyed by product id.
    ///
    /// Catalog names are display-only: a product missing from the catalog
    /// still gets its entry, with no name.
    pub async fn get_consolidated_stock(
        &self,
        store_ids: &[Uuid],
    ) -> AppResult<BTreeMap<Uuid, ConsolidatedStockEntry>> {
        if store_ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let records = self.stock.list_for_stores(store_ids).await?;
        let mut entries = consolidate_for_stores(&records, store_ids)?;

        let product_ids: Vec<Uuid> = entries.keys().copied().collect();
        let products = self.catalog.find_products(&product_ids).await?;
        for (product_id, entry) in entries.iter_mut() {
            entry.product_name = products.get(product_id).map(|product| product.name.clone());
        }

        debug!(
            stores = store_ids.len(),
            records = records.len(),
            products = entries.len(),
            "Stock consolidated"
        );
        Ok(entries)
    }
}
