//! HTTP middleware

pub mod auth;

pub use auth::{
    auth_middleware, require_action, require_order_access, require_store_access, AuthUser,
    Claims, CurrentUser,
};
