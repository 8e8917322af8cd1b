//! Audit log storage: append order actions, query them for cooldown.
//!
//! Rows are never updated or deleted. Concurrent inserts are safe; the
//! claim path appends inside its transaction so the audit row and the
//! status change commit (or roll back) together.

use jiff::Timestamp;
use rusqlite::{Connection, OptionalExtension, params};

use crate::model::{ActionType, OrderAction};

use super::{Result, Storage, StorageError, ms_to_ts, ts_to_ms};

impl Storage {
    /// Appends one action row. The timestamp is explicit so the
    /// dispatcher's `now` is the one that gates the next cooldown.
    pub fn record_action(
        &self,
        order_id: i64,
        driver_id: i64,
        action: ActionType,
        at: Timestamp,
    ) -> Result<i64> {
        let conn = self.connect()?;
        append(&conn, order_id, driver_id, action, at)
    }

    /// When the driver last acted on any order, if ever.
    pub fn last_action_at(&self, driver_id: i64) -> Result<Option<Timestamp>> {
        let conn = self.connect()?;
        last_action_at(&conn, driver_id)
    }

    /// All actions taken on one order, newest first.
    pub fn actions_for_order(&self, order_id: i64) -> Result<Vec<OrderAction>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT action_id, order_id, driver_id, action, action_at
             FROM order_actions
             WHERE order_id = ?1
             ORDER BY action_at DESC, action_id DESC",
        )?;
        let rows = stmt.query_map(params![order_id], |row| {
            let action_str: String = row.get(3)?;
            let at_ms: i64 = row.get(4)?;
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                action_str,
                at_ms,
            ))
        })?;

        let mut actions = Vec::new();
        for row in rows {
            let (action_id, order_id, driver_id, action_str, at_ms) = row?;
            let action = ActionType::parse(&action_str).ok_or_else(|| {
                StorageError::Corrupt(format!("unknown action type: {action_str}"))
            })?;
            actions.push(OrderAction {
                action_id,
                order_id,
                driver_id,
                action,
                action_at: ms_to_ts(at_ms)?,
            });
        }
        Ok(actions)
    }
}

/// Appends an action row within an open connection or transaction.
pub(crate) fn append(
    conn: &Connection,
    order_id: i64,
    driver_id: i64,
    action: ActionType,
    at: Timestamp,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO order_actions (order_id, driver_id, action, action_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![order_id, driver_id, action.as_str(), ts_to_ms(at)],
    )?;
    Ok(conn.last_insert_rowid())
}

/// The driver's most recent action timestamp across all orders.
pub(crate) fn last_action_at(conn: &Connection, driver_id: i64) -> Result<Option<Timestamp>> {
    let ms: Option<i64> = conn
        .query_row(
            "SELECT action_at FROM order_actions
             WHERE driver_id = ?1
             ORDER BY action_at DESC, action_id DESC
             LIMIT 1",
            params![driver_id],
            |row| row.get(0),
        )
        .optional()?;
    ms.map(ms_to_ts).transpose()
}
