//! Admission policy: per-group knobs read on every claim attempt.
//!
//! The policy is owned by an external settings editor; this crate only
//! reads it (and persists edits through [`crate::storage::Storage::put_policy`]).
//! A missing row means the defaults below.

use serde::{Deserialize, Serialize};

/// The single global dispatch group. The schema is keyed by group id so
/// more groups can exist later, but everything today scopes to this one.
pub const MAIN_GROUP: i64 = 1;

/// Per-group admission policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Gate claim attempts behind a per-driver minimum wait.
    pub enable_cooldown: bool,

    /// Minimum minutes between a driver's order actions. Zero disables
    /// the cooldown even when the flag is on.
    pub cooldown_minutes: i64,

    /// Maximum orders a driver may hold in assigned/in-delivery at once.
    pub max_orders_per_driver: i64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            enable_cooldown: true,
            cooldown_minutes: 10,
            max_orders_per_driver: 3,
        }
    }
}
