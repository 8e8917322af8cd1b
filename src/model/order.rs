//! Order types: the unit of contention.

use jiff::Timestamp;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use super::OrderAction;

/// A delivery task derived from a chat message, tracked through a
/// status lifecycle.
///
/// Costs are in minor currency units; the core stores them verbatim and
/// never does arithmetic on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: i64,

    /// The chat message this order originated from. Opaque here: the
    /// messaging transport owns it.
    pub message_id: i64,

    pub customer_name: Option<String>,
    pub delivery_location: Option<String>,
    pub note: Option<String>,

    /// Quoted cost, as posted in the originating message.
    pub cost: Option<i64>,

    pub status: OrderStatus,

    /// Set when a driver wins the claim; cleared never — a cancelled
    /// order keeps the driver it had when it was cancelled.
    pub assigned_driver_id: Option<i64>,

    /// Actual cost, recorded on completion.
    pub completed_cost: Option<i64>,
    pub completed_delivery_location: Option<String>,
    pub driver_note: Option<String>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Where an order stands in its lifecycle.
///
/// `open → assigned → in_delivery → completed`, with `cancelled`
/// reachable from every non-terminal state. Only the `open → assigned`
/// step is contended; it happens exclusively through the accept
/// protocol, never through a plain status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Posted and unclaimed; any eligible driver may accept it.
    Open,

    /// A driver won the claim.
    Assigned,

    /// The assigned driver is on the road.
    InDelivery,

    /// Delivered, with final cost and location recorded. Terminal.
    Completed,

    /// Called off, with the reason in `driver_note`. Terminal.
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Assigned => "assigned",
            Self::InDelivery => "in_delivery",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "assigned" => Some(Self::Assigned),
            "in_delivery" => Some(Self::InDelivery),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Parses a single status or a comma-separated set ("open,assigned").
    pub fn parse_set(s: &str) -> Option<Vec<Self>> {
        s.split(',').map(|part| Self::parse(part.trim())).collect()
    }

    /// Counts toward a driver's capacity limit.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Assigned | Self::InDelivery)
    }

    /// No transition leaves a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the messaging side supplies when an order-type message is posted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub message_id: i64,
    pub customer_name: Option<String>,
    pub delivery_location: Option<String>,
    pub note: Option<String>,
    pub cost: Option<i64>,
}

/// An order joined with its audit trail, newest action first.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub actions: Vec<OrderAction>,
}

/// Fields accompanying a status transition. Which ones are required
/// depends on the target status; see the dispatch rules.
#[derive(Debug, Clone, Default)]
pub struct UpdateFields {
    pub completed_cost: Option<i64>,
    pub completed_delivery_location: Option<String>,
    pub driver_note: Option<String>,
}

/// Read-path filter. All parts are optional and combine with AND;
/// the status set and the search fields combine internally with OR.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Match any of these statuses. Empty means any status.
    pub statuses: Vec<OrderStatus>,

    pub order_id: Option<i64>,
    pub assigned_driver_id: Option<i64>,

    /// Creation-time range, inclusive of whole days (caller's day
    /// resolution; interpreted in UTC).
    pub from_day: Option<Date>,
    pub to_day: Option<Date>,

    /// Case-insensitive substring match across the order's text fields.
    pub search: Option<String>,

    /// Absent means no pagination: return every match.
    pub page: Option<PageRequest>,
}

/// 1-based page request.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

/// One page of orders plus the total match count across all pages.
#[derive(Debug, Clone)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: u64,
}
