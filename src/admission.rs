//! Admission control: the pure decision gating a driver's claim attempt.
//!
//! Two rules, evaluated in order; the first failing rule wins:
//!
//! 1. **Cooldown** — the driver's most recent order action (accept or
//!    ignore, on any order) must be at least `cooldown_minutes` old.
//! 2. **Capacity** — the driver must hold fewer than
//!    `max_orders_per_driver` orders in assigned/in-delivery.
//!
//! No I/O happens here. The accept protocol evaluates this while holding
//! the claim transaction's write lock; callers supply the policy, the
//! audit lookup, the active count, and `now`.

use jiff::Timestamp;

use crate::model::Policy;

/// The outcome of evaluating a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,

    /// The driver's cooldown window has not elapsed.
    Cooldown {
        /// Whole minutes until the driver may act again (ceiling).
        remaining_minutes: i64,
    },

    /// The driver already holds the maximum number of active orders.
    Capacity { limit: i64 },
}

/// Evaluates both rules for an accept attempt.
pub fn evaluate(
    policy: &Policy,
    last_action_at: Option<Timestamp>,
    active_orders: i64,
    now: Timestamp,
) -> Admission {
    if let Some(remaining_minutes) = cooldown_remaining(policy, last_action_at, now) {
        return Admission::Cooldown { remaining_minutes };
    }
    if active_orders >= policy.max_orders_per_driver {
        return Admission::Capacity {
            limit: policy.max_orders_per_driver,
        };
    }
    Admission::Allow
}

/// Remaining cooldown in whole minutes (ceiling of remaining
/// milliseconds), or `None` when the driver may act.
///
/// Ignore attempts check only this rule: passing on an order never
/// counts against capacity.
pub fn cooldown_remaining(
    policy: &Policy,
    last_action_at: Option<Timestamp>,
    now: Timestamp,
) -> Option<i64> {
    if !policy.enable_cooldown || policy.cooldown_minutes <= 0 {
        return None;
    }
    let last = last_action_at?;
    let ends_ms = last.as_millisecond() + policy.cooldown_minutes * 60_000;
    let remaining_ms = ends_ms - now.as_millisecond();
    if remaining_ms <= 0 {
        None
    } else {
        // Round up to whole minutes; remaining_ms is positive here.
        Some((remaining_ms + 59_999) / 60_000)
    }
}
