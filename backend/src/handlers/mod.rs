//! HTTP handlers for the B2B Ordering Platform

pub mod health;
pub mod order;
pub mod stock;

pub use health::health_check;
pub use order::{
    adjust_preparation, cancel_delivery, cancel_order, complete_delivery, confirm_order,
    create_order, get_order, get_order_history, list_orders, mark_ready, start_delivery,
    start_preparation, submit_order, update_order_lines,
};
pub use stock::{
    adjust_stock, decrement_stock, get_consolidated_stock, get_stock, list_low_stock,
    list_movements, list_store_stock,
};
