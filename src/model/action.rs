//! Order actions: immutable audit records of claim attempts.
//!
//! One row per accept or ignore that passed authorization. The log is
//! append-only and doubles as the source of truth for cooldown: a
//! driver's most recent action across all orders gates their next one.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A single, immutable record of a driver acting on an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAction {
    pub action_id: i64,
    pub order_id: i64,
    pub driver_id: i64,
    pub action: ActionType,
    pub action_at: Timestamp,
}

/// What the driver did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Claimed the order (and won, since losing attempts write nothing).
    Accept,

    /// Passed on the order. Leaves the order open for everyone else but
    /// still starts the driver's cooldown window.
    Ignore,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Ignore => "ignore",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accept" => Some(Self::Accept),
            "ignore" => Some(Self::Ignore),
            _ => None,
        }
    }
}
