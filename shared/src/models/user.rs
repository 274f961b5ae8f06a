//! Actor roles

use serde::{Deserialize, Serialize};

/// Role of the actor performing an action
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// The supplier organization
    Admin,
    Client,
    Store,
    Delivery,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Admin => "admin",
            ActorRole::Client => "client",
            ActorRole::Store => "store",
            ActorRole::Delivery => "delivery",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(ActorRole::Admin),
            "client" => Some(ActorRole::Client),
            "store" => Some(ActorRole::Store),
            "delivery" => Some(ActorRole::Delivery),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

