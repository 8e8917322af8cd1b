//! Core data model for Courier.
//!
//! Orders are delivery tasks derived from group-chat messages. Drivers
//! race to claim open orders; every claim attempt (accept or ignore)
//! leaves an immutable [`OrderAction`] behind, and a per-group [`Policy`]
//! throttles how often and how much a single driver may take on.

mod action;
mod order;
mod policy;

use serde::{Deserialize, Serialize};

pub use action::{ActionType, OrderAction};
pub use order::{
    NewOrder, Order, OrderDetail, OrderFilter, OrderPage, OrderStatus, PageRequest, UpdateFields,
};
pub use policy::{MAIN_GROUP, Policy};

/// The role an authenticated caller acts under.
///
/// Authentication happens outside this crate; callers arrive already
/// resolved to an id and a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Field driver: may claim, ignore, and progress their own orders.
    Driver,

    /// Group administrator: may cancel any order.
    Admin,

    /// Delegated administrator with the same order powers as an admin.
    ViceAdmin,
}

/// An already-authenticated caller: who is acting, and as what.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub role: Role,
}

impl Caller {
    pub fn driver(user_id: i64) -> Self {
        Self {
            user_id,
            role: Role::Driver,
        }
    }

    pub fn admin(user_id: i64) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn vice_admin(user_id: i64) -> Self {
        Self {
            user_id,
            role: Role::ViceAdmin,
        }
    }
}
