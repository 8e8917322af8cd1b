//! Order storage: insert, fetch, claim, transition, and filtered lists.

use jiff::Timestamp;
use jiff::civil::Date;
use jiff::tz::TimeZone;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::model::{NewOrder, Order, OrderFilter, OrderPage, OrderStatus, UpdateFields};

use super::{Result, Storage, StorageError, ms_to_ts, ts_to_ms};

const ORDER_COLUMNS: &str = "order_id, message_id, customer_name, delivery_location, note, \
     cost, status, assigned_driver_id, completed_cost, completed_delivery_location, \
     driver_note, created_at, updated_at";

impl Storage {
    /// Inserts a new order in status `open` and returns it.
    pub fn insert_order(&self, new: &NewOrder, at: Timestamp) -> Result<Order> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO orders (message_id, customer_name, delivery_location, note, cost,
                                 status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'open', ?6, ?6)",
            params![
                new.message_id,
                new.customer_name,
                new.delivery_location,
                new.note,
                new.cost,
                ts_to_ms(at),
            ],
        )?;
        let order_id = conn.last_insert_rowid();
        fetch(&conn, order_id)?.ok_or_else(|| {
            StorageError::Corrupt(format!("order {order_id} vanished after insert"))
        })
    }

    /// Loads one order, or `None` if the id is unknown.
    pub fn get_order(&self, order_id: i64) -> Result<Option<Order>> {
        let conn = self.connect()?;
        fetch(&conn, order_id)
    }

    /// Counts the driver's orders in active (assigned/in-delivery) status.
    pub fn count_active_orders(&self, driver_id: i64) -> Result<i64> {
        let conn = self.connect()?;
        count_active(&conn, driver_id)
    }

    /// Lists orders matching the filter, newest first, with the total
    /// match count across all pages.
    pub fn list_orders(&self, filter: &OrderFilter) -> Result<OrderPage> {
        let conn = self.connect()?;
        let (where_clause, values) = filter_clauses(filter)?;

        let total: u64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM orders{where_clause}"),
            params_from_iter(values.iter().cloned()),
            |row| row.get(0),
        )?;

        let mut sql =
            format!("SELECT {ORDER_COLUMNS} FROM orders{where_clause} ORDER BY created_at DESC, order_id DESC");
        let mut values = values;
        if let Some(page) = filter.page {
            let limit = i64::from(page.limit);
            let offset = i64::from(page.page.max(1) - 1) * limit;
            sql.push_str(" LIMIT ? OFFSET ?");
            values.push(Value::Integer(limit));
            values.push(Value::Integer(offset));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), order_from_row)?;
        let mut orders = Vec::new();
        for row in rows {
            orders.push(row??);
        }
        Ok(OrderPage { orders, total })
    }
}

/// Loads one order row within an open connection or transaction.
pub(crate) fn fetch(conn: &Connection, order_id: i64) -> Result<Option<Order>> {
    let row = conn
        .query_row(
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?1"),
            params![order_id],
            order_from_row,
        )
        .optional()?;
    row.transpose()
}

/// The claim write: assign the order to the driver, but only if it is
/// still open. Returns the number of rows changed — zero means the
/// order was taken (or never open) and the caller lost.
pub(crate) fn claim(
    conn: &Connection,
    order_id: i64,
    driver_id: i64,
    at: Timestamp,
) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE orders
         SET status = 'assigned', assigned_driver_id = ?2, updated_at = ?3
         WHERE order_id = ?1 AND status = 'open'",
        params![order_id, driver_id, ts_to_ms(at)],
    )?;
    Ok(changed)
}

/// Applies a validated status transition as one guarded row write: the
/// update lands only while the row is still in `from`, so a transition
/// raced by another writer changes zero rows instead of overwriting.
/// Absent fields keep their current values.
pub(crate) fn set_status(
    conn: &Connection,
    order_id: i64,
    from: OrderStatus,
    to: OrderStatus,
    fields: &UpdateFields,
    at: Timestamp,
) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE orders
         SET status = ?2,
             completed_cost = COALESCE(?3, completed_cost),
             completed_delivery_location = COALESCE(?4, completed_delivery_location),
             driver_note = COALESCE(?5, driver_note),
             updated_at = ?6
         WHERE order_id = ?1 AND status = ?7",
        params![
            order_id,
            to.as_str(),
            fields.completed_cost,
            fields.completed_delivery_location,
            fields.driver_note,
            ts_to_ms(at),
            from.as_str(),
        ],
    )?;
    Ok(changed)
}

/// Counts active orders within an open connection or transaction.
pub(crate) fn count_active(conn: &Connection, driver_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM orders
         WHERE assigned_driver_id = ?1 AND status IN ('assigned', 'in_delivery')",
        params![driver_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Builds the WHERE clause and bound values for an [`OrderFilter`].
fn filter_clauses(filter: &OrderFilter) -> Result<(String, Vec<Value>)> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if !filter.statuses.is_empty() {
        let marks = vec!["?"; filter.statuses.len()].join(", ");
        clauses.push(format!("status IN ({marks})"));
        for status in &filter.statuses {
            values.push(Value::Text(status.as_str().to_string()));
        }
    }

    if let Some(order_id) = filter.order_id {
        clauses.push("order_id = ?".into());
        values.push(Value::Integer(order_id));
    }

    if let Some(driver_id) = filter.assigned_driver_id {
        clauses.push("assigned_driver_id = ?".into());
        values.push(Value::Integer(driver_id));
    }

    if let Some(day) = filter.from_day {
        clauses.push("created_at >= ?".into());
        values.push(Value::Integer(day_start_ms(day)?));
    }

    if let Some(day) = filter.to_day {
        clauses.push("created_at <= ?".into());
        values.push(Value::Integer(day_end_ms(day)?));
    }

    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        clauses.push(
            "(customer_name LIKE ? OR delivery_location LIKE ? OR note LIKE ? \
              OR driver_note LIKE ? OR completed_delivery_location LIKE ?)"
                .into(),
        );
        let pattern = format!("%{search}%");
        for _ in 0..5 {
            values.push(Value::Text(pattern.clone()));
        }
    }

    if clauses.is_empty() {
        Ok((String::new(), values))
    } else {
        Ok((format!(" WHERE {}", clauses.join(" AND ")), values))
    }
}

fn day_start_ms(day: Date) -> Result<i64> {
    let zoned = day
        .at(0, 0, 0, 0)
        .to_zoned(TimeZone::UTC)
        .map_err(|e| StorageError::Corrupt(format!("invalid day bound {day}: {e}")))?;
    Ok(zoned.timestamp().as_millisecond())
}

fn day_end_ms(day: Date) -> Result<i64> {
    let zoned = day
        .at(23, 59, 59, 999_999_999)
        .to_zoned(TimeZone::UTC)
        .map_err(|e| StorageError::Corrupt(format!("invalid day bound {day}: {e}")))?;
    Ok(zoned.timestamp().as_millisecond())
}

/// Maps an order row. Returns the storage error inside the rusqlite
/// result so `query_row` can surface both layers.
fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Result<Order>> {
    let status_str: String = row.get(6)?;
    let created_ms: i64 = row.get(11)?;
    let updated_ms: i64 = row.get(12)?;

    let order = || -> Result<Order> {
        let status = OrderStatus::parse(&status_str)
            .ok_or_else(|| StorageError::Corrupt(format!("unknown order status: {status_str}")))?;
        Ok(Order {
            order_id: row.get(0)?,
            message_id: row.get(1)?,
            customer_name: row.get(2)?,
            delivery_location: row.get(3)?,
            note: row.get(4)?,
            cost: row.get(5)?,
            status,
            assigned_driver_id: row.get(7)?,
            completed_cost: row.get(8)?,
            completed_delivery_location: row.get(9)?,
            driver_note: row.get(10)?,
            created_at: ms_to_ts(created_ms)?,
            updated_at: ms_to_ts(updated_ms)?,
        })
    };
    Ok(order())
}
