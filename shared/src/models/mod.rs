//! Domain models for the B2B Ordering Platform

mod catalog;
mod order;
mod stock;
mod user;

pub use catalog::*;
pub use order::*;
pub use stock::*;
pub use user::*;
