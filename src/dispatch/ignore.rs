//! Ignoring an order: pass on it, start the cooldown, change nothing.

use jiff::Timestamp;

use crate::admission;
use crate::model::{ActionType, Caller, MAIN_GROUP, OrderStatus, Role};
use crate::storage;

use super::{DispatchError, Dispatcher, Result};

impl Dispatcher {
    /// Records that a driver passed on an open order.
    ///
    /// Non-exclusive: any number of drivers may ignore the same order
    /// independently, so no claim lock is taken. The cooldown rule still
    /// applies (ignoring is an order action), capacity does not, and the
    /// order itself is never mutated.
    pub fn ignore(&self, caller: &Caller, order_id: i64) -> Result<()> {
        if caller.role != Role::Driver {
            return Err(DispatchError::Forbidden("only drivers can ignore orders"));
        }
        let driver_id = caller.user_id;
        let now = Timestamp::now();

        let conn = self.storage.connect()?;
        let Some(order) = storage::order::fetch(&conn, order_id)? else {
            return Err(DispatchError::NotFound(order_id));
        };
        if order.status != OrderStatus::Open {
            return Err(DispatchError::Conflict);
        }

        let policy = storage::policy::read(&conn, MAIN_GROUP)?;
        let last_action_at = storage::action::last_action_at(&conn, driver_id)?;
        if let Some(remaining_minutes) =
            admission::cooldown_remaining(&policy, last_action_at, now)
        {
            return Err(DispatchError::Cooldown { remaining_minutes });
        }

        storage::action::append(&conn, order_id, driver_id, ActionType::Ignore, now)?;
        Ok(())
    }
}
