//! Courier: the order-dispatch core of a group-chat delivery app.
//!
//! Orders arrive as special chat messages and field drivers race to
//! claim them. This crate owns the contended part of that system:
//!
//! - admission (per-driver cooldown and capacity limits),
//! - the acceptance protocol that picks exactly one winner per order,
//! - the post-acceptance lifecycle (in-delivery, completed, cancelled),
//! - the append-only audit log those decisions are computed from.
//!
//! Transport, identity, and settings editing live outside and plug in
//! through seams: callers arrive as an already-authenticated
//! [`Caller`], state changes leave as [`Event`]s through a
//! [`Notifier`], and the settings editor writes policy via
//! [`Storage::put_policy`].

pub mod admission;
pub mod config;
pub mod dispatch;
pub mod model;
pub mod notify;
pub mod storage;

pub use config::Config;
pub use dispatch::{DispatchError, Dispatcher};
pub use model::{
    ActionType, Caller, MAIN_GROUP, NewOrder, Order, OrderAction, OrderDetail, OrderFilter,
    OrderPage, OrderStatus, PageRequest, Policy, Role, UpdateFields,
};
pub use notify::{ChannelNotifier, Event, Notifier, NullNotifier};
pub use storage::{Storage, StorageError};
