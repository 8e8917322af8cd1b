//! Policy storage: per-group admission settings.
//!
//! Read-mostly; the claim path reads the row inside its transaction.
//! A missing row means [`Policy::default`] — the table starts empty and
//! only gains a row once the external settings editor writes one.

use rusqlite::{Connection, OptionalExtension, params};

use crate::model::Policy;

use super::{Result, Storage};

impl Storage {
    /// Reads the group's policy, falling back to defaults when no row
    /// exists.
    pub fn read_policy(&self, group_id: i64) -> Result<Policy> {
        let conn = self.connect()?;
        read(&conn, group_id)
    }

    /// Writes the group's policy. The seam the external settings editor
    /// (and tests) use; the dispatch core itself never calls this.
    pub fn put_policy(&self, group_id: i64, policy: &Policy) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO group_settings (group_id, enable_cooldown, cooldown_minutes, max_orders_per_driver)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (group_id) DO UPDATE SET
                 enable_cooldown = excluded.enable_cooldown,
                 cooldown_minutes = excluded.cooldown_minutes,
                 max_orders_per_driver = excluded.max_orders_per_driver",
            params![
                group_id,
                policy.enable_cooldown,
                policy.cooldown_minutes,
                policy.max_orders_per_driver,
            ],
        )?;
        Ok(())
    }
}

/// Reads the policy within an open connection or transaction.
pub(crate) fn read(conn: &Connection, group_id: i64) -> Result<Policy> {
    let row = conn
        .query_row(
            "SELECT enable_cooldown, cooldown_minutes, max_orders_per_driver
             FROM group_settings WHERE group_id = ?1",
            params![group_id],
            |row| {
                Ok(Policy {
                    enable_cooldown: row.get(0)?,
                    cooldown_minutes: row.get(1)?,
                    max_orders_per_driver: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    use crate::model::MAIN_GROUP;

    fn test_storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path().join("courier.sqlite")).unwrap();
        (dir, storage)
    }

    #[test]
    fn put_then_read_round_trips() {
        let (_dir, storage) = test_storage();
        let policy = Policy {
            enable_cooldown: false,
            cooldown_minutes: 0,
            max_orders_per_driver: 7,
        };
        storage.put_policy(MAIN_GROUP, &policy).unwrap();
        assert_eq!(storage.read_policy(MAIN_GROUP).unwrap(), policy);
    }

    #[test]
    fn put_overwrites_existing_row() {
        let (_dir, storage) = test_storage();
        storage.put_policy(MAIN_GROUP, &Policy::default()).unwrap();
        let updated = Policy {
            cooldown_minutes: 20,
            ..Policy::default()
        };
        storage.put_policy(MAIN_GROUP, &updated).unwrap();
        assert_eq!(storage.read_policy(MAIN_GROUP).unwrap(), updated);
    }

    #[test]
    fn groups_are_independent() {
        let (_dir, storage) = test_storage();
        storage
            .put_policy(
                MAIN_GROUP,
                &Policy {
                    enable_cooldown: false,
                    cooldown_minutes: 0,
                    max_orders_per_driver: 1,
                },
            )
            .unwrap();

        // A group without a row still sees the defaults.
        assert_eq!(storage.read_policy(2).unwrap(), Policy::default());
    }
}
