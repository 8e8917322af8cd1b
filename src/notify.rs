//! Outbound events: state changes broadcast after commit.
//!
//! The dispatcher publishes an [`Event`] once its transaction has
//! committed. Delivery (sockets, push) is an external concern: an
//! implementation receives the event and hands it off. A delivery
//! failure is logged and dropped by the dispatcher — the committed
//! state never rolls back because a broadcast failed.

use std::sync::mpsc;

use serde::Serialize;

use crate::model::{Order, OrderStatus};

/// A state-change event, broadcast fire-and-forget after commit.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Event {
    /// A driver claimed an open order.
    OrderAccepted {
        order_id: i64,
        driver_id: i64,
        order: Order,
    },

    /// An order moved to a new lifecycle status.
    OrderUpdated {
        order_id: i64,
        status: OrderStatus,
        order: Order,
    },
}

impl Event {
    /// The wire name clients subscribe to.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OrderAccepted { .. } => "orderAccepted",
            Self::OrderUpdated { .. } => "orderUpdated",
        }
    }

    /// The JSON payload handed to delivery components.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Broadcast seam for state-change events.
///
/// Implementations must be cheap and non-blocking; the dispatcher calls
/// this on the request path, after commit.
pub trait Notifier: Send + Sync {
    /// Delivers one event. Errors are logged and dropped by the caller.
    fn broadcast(&self, event: &Event) -> Result<(), String>;
}

/// Discards every event. The default when no delivery component is wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn broadcast(&self, _event: &Event) -> Result<(), String> {
        Ok(())
    }
}

/// Hands events to an external delivery component over a channel.
///
/// The consuming side (socket fan-out, push delivery) runs on its own
/// thread and drains the receiver at its own pace.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<Event>,
}

impl ChannelNotifier {
    /// Creates the notifier and the receiver the delivery component
    /// drains.
    pub fn new() -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn broadcast(&self, event: &Event) -> Result<(), String> {
        self.tx
            .send(event.clone())
            .map_err(|e| format!("event channel closed: {e}"))
    }
}
