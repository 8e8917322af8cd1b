//! Lifecycle transitions: in-delivery, completed, cancelled.
//!
//! Only the `open → assigned` step is contended enough to need the
//! claim transaction (and it belongs to the accept protocol). A
//! transition here is a single guarded row write: the UPDATE lands only
//! while the order is still in the status the rules were checked
//! against, so racing writers (the driver completing, an admin
//! cancelling) resolve to one winner and the loser gets
//! `InvalidTransition` against the status that actually stuck.

use jiff::Timestamp;

use crate::model::{Caller, Order, OrderStatus, Role, UpdateFields};
use crate::notify::Event;
use crate::storage;

use super::{DispatchError, Dispatcher, Result};

impl Dispatcher {
    /// Moves an order to a new lifecycle status.
    ///
    /// The machine: `assigned → in_delivery → completed`, and every
    /// non-terminal state `→ cancelled`. Completion requires the final
    /// cost and delivery location; cancellation requires a reason in
    /// `driver_note`. Delivery progress may only be reported by the
    /// assigned driver; cancellation also by an admin or vice-admin.
    pub fn update_status(
        &self,
        caller: &Caller,
        order_id: i64,
        target: OrderStatus,
        fields: UpdateFields,
    ) -> Result<Order> {
        let conn = self.storage.connect()?;
        let Some(order) = storage::order::fetch(&conn, order_id)? else {
            return Err(DispatchError::NotFound(order_id));
        };

        authorize(caller, &order, target)?;
        check_transition(order.status, target)?;
        check_fields(target, &fields)?;

        let changed = storage::order::set_status(
            &conn,
            order_id,
            order.status,
            target,
            &fields,
            Timestamp::now(),
        )?;
        if changed == 0 {
            // The status moved between our snapshot and the write; the
            // transition we validated no longer applies.
            let current = storage::order::fetch(&conn, order_id)?
                .ok_or(DispatchError::NotFound(order_id))?;
            return Err(DispatchError::InvalidTransition {
                from: current.status,
                to: target,
            });
        }
        drop(conn);

        let updated = self
            .storage
            .get_order(order_id)?
            .ok_or(DispatchError::NotFound(order_id))?;
        self.notify(&Event::OrderUpdated {
            order_id,
            status: target,
            order: updated.clone(),
        });
        Ok(updated)
    }
}

fn authorize(caller: &Caller, order: &Order, target: OrderStatus) -> Result<()> {
    let owns_order = order.assigned_driver_id == Some(caller.user_id);
    match target {
        OrderStatus::Cancelled => match caller.role {
            Role::Admin | Role::ViceAdmin => Ok(()),
            Role::Driver if owns_order => Ok(()),
            Role::Driver => Err(DispatchError::Forbidden(
                "you can only cancel your own orders",
            )),
        },
        _ => {
            if caller.role != Role::Driver {
                Err(DispatchError::Forbidden(
                    "only the assigned driver can update delivery progress",
                ))
            } else if owns_order {
                Ok(())
            } else {
                Err(DispatchError::Forbidden(
                    "you can only update your own orders",
                ))
            }
        }
    }
}

fn check_transition(from: OrderStatus, to: OrderStatus) -> Result<()> {
    use OrderStatus::{Assigned, Cancelled, Completed, InDelivery, Open};
    let allowed = match to {
        Cancelled => !from.is_terminal(),
        InDelivery => from == Assigned,
        Completed => from == InDelivery,
        // `open` is the birth status; `assigned` only comes from accept.
        Open | Assigned => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(DispatchError::InvalidTransition { from, to })
    }
}

fn check_fields(target: OrderStatus, fields: &UpdateFields) -> Result<()> {
    match target {
        OrderStatus::Completed => {
            if fields.completed_cost.is_none() {
                return Err(DispatchError::Validation(
                    "completed_cost is required when completing an order",
                ));
            }
            if fields
                .completed_delivery_location
                .as_deref()
                .is_none_or(str::is_empty)
            {
                return Err(DispatchError::Validation(
                    "completed_delivery_location is required when completing an order",
                ));
            }
            Ok(())
        }
        OrderStatus::Cancelled => {
            if fields.driver_note.as_deref().is_none_or(str::is_empty) {
                return Err(DispatchError::Validation(
                    "driver_note is required when cancelling an order",
                ));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
