//! Order dispatch: admission, acceptance, and lifecycle operations.
//!
//! [`Dispatcher`] is the entry point the transport layer calls with an
//! already-authenticated [`Caller`]. The contended operation is
//! [`accept`](Dispatcher::accept): among any number of concurrent claims
//! on one open order, exactly one commits and the rest fail
//! [`DispatchError::Conflict`] — deterministically, with no silent
//! double assignment and no built-in retry.

mod accept;
mod ignore;
mod query;
mod update;

use jiff::Timestamp;

use crate::config::Config;
use crate::model::{NewOrder, Order, OrderStatus};
use crate::notify::{Event, Notifier, NullNotifier};
use crate::storage::{Storage, StorageError};

/// Errors returned by dispatch operations.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("order not found: {0}")]
    NotFound(i64),

    /// The order stopped being `open` before this attempt reached it.
    /// Routine under contention — "someone else already took this" —
    /// not a fault.
    #[error("order is no longer available")]
    Conflict,

    #[error("wait {remaining_minutes} minutes before your next order action")]
    Cooldown { remaining_minutes: i64 },

    #[error("you already hold {limit} orders in progress; complete or cancel one before accepting more")]
    Capacity { limit: i64 },

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    Validation(&'static str),

    #[error("cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DispatchError {
    /// True when the attempt never reached the order row and the caller
    /// may retry as-is. Distinct from [`Conflict`](Self::Conflict),
    /// which means the race was reached and lost.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(StorageError::Busy))
    }
}

pub type Result<T> = core::result::Result<T, DispatchError>;

/// The dispatch core: orders in, one winner per claim, an auditable
/// lifecycle after that.
pub struct Dispatcher {
    storage: Storage,
    notifier: Box<dyn Notifier>,
}

impl Dispatcher {
    /// A dispatcher with no event delivery wired. Events are dropped.
    pub fn new(storage: Storage) -> Self {
        Self::with_notifier(storage, NullNotifier)
    }

    pub fn with_notifier(storage: Storage, notifier: impl Notifier + 'static) -> Self {
        Self {
            storage,
            notifier: Box::new(notifier),
        }
    }

    /// Opens a dispatcher on the configured database (or the default
    /// path under the home directory).
    pub fn open(config: &Config, notifier: impl Notifier + 'static) -> core::result::Result<Self, String> {
        let path = match &config.database {
            Some(p) => p.clone(),
            None => Storage::default_path().ok_or("could not determine home directory")?,
        };
        let storage =
            Storage::open_with_lock_wait(path, config.lock_wait()).map_err(|e| e.to_string())?;
        Ok(Self::with_notifier(storage, notifier))
    }

    /// The underlying storage, for collaborators that share the database
    /// (the settings editor writes policy through this).
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Records a freshly posted order-type message as an open order.
    ///
    /// No event is emitted: fan-out of the originating message is the
    /// transport's job.
    pub fn post_order(&self, new: &NewOrder) -> Result<Order> {
        Ok(self.storage.insert_order(new, Timestamp::now())?)
    }

    /// Broadcasts a post-commit event. Failures are logged and dropped;
    /// the committed state stands regardless.
    fn notify(&self, event: &Event) {
        if let Err(e) = self.notifier.broadcast(event) {
            tracing::warn!(event = event.name(), error = %e, "dropping undeliverable event");
        }
    }
}
