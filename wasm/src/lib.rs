//! WebAssembly module for the B2B Ordering Platform
//!
//! Provides client-side computation for:
//! - Order totals while a client edits the basket
//! - Preparation gap previews before the store submits quantities
//! - Lifecycle checks to enable or hide action buttons
//! - Multi-store stock rollups on dashboards

use std::str::FromStr;

use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

use shared::{
    compute_totals, consolidate_for_stores, reconcile, summarize_gaps, transition, GapSummary,
    OrderAction, PreparedQuantity,
};
use uuid::Uuid;

#[derive(serde::Serialize)]
struct GapPreview {
    lines: Vec<OrderLineItem>,
    summary: GapSummary,
}

fn parse_decimal(value: &str, field: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|e| format!("Invalid {}: {}", field, e))
}

fn parse_action(action: &str) -> Result<OrderAction, String> {
    serde_json::from_value(serde_json::Value::String(action.to_string()))
        .map_err(|_| format!("Unknown order action: {}", action))
}

fn order_totals(lines_json: &str, vat_rate: &str) -> Result<String, String> {
    let lines: Vec<OrderLineItem> =
        serde_json::from_str(lines_json).map_err(|e| format!("Invalid lines JSON: {}", e))?;
    let vat_rate = parse_decimal(vat_rate, "VAT rate")?;
    validate_vat_rate(vat_rate).map_err(str::to_string)?;

    let totals = compute_totals(&lines, vat_rate).map_err(|e| e.to_string())?;
    serde_json::to_string(&totals).map_err(|e| e.to_string())
}

fn gap_preview(lines_json: &str, updates_json: &str) -> Result<String, String> {
    let lines: Vec<OrderLineItem> =
        serde_json::from_str(lines_json).map_err(|e| format!("Invalid lines JSON: {}", e))?;
    let updates: Vec<PreparedQuantity> =
        serde_json::from_str(updates_json).map_err(|e| format!("Invalid quantities JSON: {}", e))?;

    let lines = reconcile(&lines, &updates).map_err(|e| e.to_string())?;
    let summary = summarize_gaps(&lines);
    serde_json::to_string(&GapPreview { lines, summary }).map_err(|e| e.to_string())
}

fn status_after(status: &str, action: &str) -> Result<String, String> {
    let status = OrderStatus::from_str(status)?;
    let next = transition(status, parse_action(action)?).map_err(|e| e.to_string())?;
    Ok(next.as_str().to_string())
}

fn consolidated_stock(records_json: &str, store_ids_json: &str) -> Result<String, String> {
    let records: Vec<StockRecord> =
        serde_json::from_str(records_json).map_err(|e| format!("Invalid stock JSON: {}", e))?;
    let store_ids: Vec<Uuid> =
        serde_json::from_str(store_ids_json).map_err(|e| format!("Invalid store ids JSON: {}", e))?;

    let entries = consolidate_for_stores(&records, &store_ids).map_err(|e| e.to_string())?;
    serde_json::to_string(&entries).map_err(|e| e.to_string())
}

/// HT/VAT/TTC totals for a JSON array of order lines
#[wasm_bindgen]
pub fn calculate_order_totals(lines_json: &str, vat_rate: &str) -> Result<String, JsValue> {
    order_totals(lines_json, vat_rate).map_err(|e| JsValue::from_str(&e))
}

/// Reconciled lines and gap summary for the quantities a store is about to submit
#[wasm_bindgen]
pub fn preview_preparation_gaps(lines_json: &str, updates_json: &str) -> Result<String, JsValue> {
    gap_preview(lines_json, updates_json).map_err(|e| JsValue::from_str(&e))
}

/// Status an order moves to, or an error if the action is not allowed
#[wasm_bindgen]
pub fn next_order_status(status: &str, action: &str) -> Result<String, JsValue> {
    status_after(status, action).map_err(|e| JsValue::from_str(&e))
}

#[wasm_bindgen]
pub fn is_action_allowed(status: &str, action: &str) -> bool {
    status_after(status, action).is_ok()
}

/// Per-product rollup of stock records across the selected stores
#[wasm_bindgen]
pub fn consolidate_stock(records_json: &str, store_ids_json: &str) -> Result<String, JsValue> {
    consolidated_stock(records_json, store_ids_json).map_err(|e| JsValue::from_str(&e))
}

/// Validate a quantity typed into a form
#[wasm_bindgen]
pub fn validate_quantity_input(value: &str) -> bool {
    parse_decimal(value, "quantity").is_ok_and(|quantity| validate_non_negative(quantity).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_order_totals() {
        let lines = json!([
            OrderLineItem::new(Uuid::new_v4(), "kg", Decimal::from(4), Decimal::from_str("2.50").unwrap()),
            OrderLineItem::new(Uuid::new_v4(), "carton", Decimal::from(1), Decimal::from_str("0.99").unwrap()),
        ]);

        let totals: OrderTotals =
            serde_json::from_str(&order_totals(&lines.to_string(), "0.20").unwrap()).unwrap();
        assert_eq!(totals.total_ht, Decimal::from_str("10.99").unwrap());
        assert_eq!(totals.total_ttc, Decimal::from_str("13.19").unwrap());

        assert!(order_totals(&lines.to_string(), "abc").is_err());
        assert!(order_totals("not json", "0.20").is_err());

        let huge = Decimal::from_str("1000000000000000").unwrap();
        let overflowing = json!([OrderLineItem::new(Uuid::new_v4(), "kg", huge, huge)]);
        assert!(order_totals(&overflowing.to_string(), "0.20").is_err());
    }

    #[test]
    fn test_gap_preview() {
        let product = Uuid::new_v4();
        let lines = json!([OrderLineItem::new(product, "kg", Decimal::from(10), Decimal::ONE)]);
        let updates = json!([{ "product_id": product, "prepared_quantity": "8", "gap_reason": "short" }]);

        let preview: Value =
            serde_json::from_str(&gap_preview(&lines.to_string(), &updates.to_string()).unwrap()).unwrap();
        assert_eq!(preview["lines"][0]["gap"], "2");
        assert_eq!(preview["summary"]["lines_with_gap"], 1);

        let unknown = json!([{ "product_id": Uuid::new_v4(), "prepared_quantity": "8" }]);
        assert!(gap_preview(&lines.to_string(), &unknown.to_string()).is_err());
    }

    #[test]
    fn test_lifecycle_checks() {
        assert_eq!(status_after("draft", "submit").unwrap(), "sent");
        assert_eq!(status_after("in_preparation", "mark_ready").unwrap(), "ready");
        assert!(!is_action_allowed("in_preparation", "cancel"));
        assert!(!is_action_allowed("draft", "fly"));
        assert!(!is_action_allowed("archived", "submit"));
    }

    #[test]
    fn test_consolidated_stock() {
        let (store_a, store_b, product) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let now = chrono::Utc::now();
        let records = json!([
            StockRecord::new(store_a, product, Decimal::from(100), Decimal::from(20), Decimal::ZERO, now),
            StockRecord::new(store_b, product, Decimal::from(10), Decimal::from(15), Decimal::ZERO, now),
        ]);

        let result: Value = serde_json::from_str(
            &consolidated_stock(&records.to_string(), &json!([store_a]).to_string()).unwrap(),
        )
        .unwrap();
        assert_eq!(result[product.to_string()]["total_quantity"], "100");
        assert_eq!(result[product.to_string()]["store_count"], 1);
    }

    #[test]
    fn test_validate_quantity_input() {
        assert!(validate_quantity_input("12.5"));
        assert!(validate_quantity_input("0"));
        assert!(!validate_quantity_input("-1"));
        assert!(!validate_quantity_input("ten"));
    }
}
