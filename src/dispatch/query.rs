//! Read paths: order detail, filtered lists, a driver's own orders.
//!
//! Pure reads with no locking discipline; filter semantics live in the
//! storage layer, role checks here.

use crate::model::{Caller, OrderDetail, OrderFilter, OrderPage, OrderStatus, PageRequest, Role};

use super::{DispatchError, Dispatcher, Result};

impl Dispatcher {
    /// One order with its full audit trail, newest action first.
    pub fn get_order(&self, order_id: i64) -> Result<OrderDetail> {
        let order = self
            .storage
            .get_order(order_id)?
            .ok_or(DispatchError::NotFound(order_id))?;
        let actions = self.storage.actions_for_order(order_id)?;
        Ok(OrderDetail { order, actions })
    }

    /// Orders matching the filter, newest first.
    pub fn list_orders(&self, filter: &OrderFilter) -> Result<OrderPage> {
        Ok(self.storage.list_orders(filter)?)
    }

    /// The calling driver's own orders, optionally narrowed by status.
    pub fn my_orders(
        &self,
        caller: &Caller,
        statuses: &[OrderStatus],
        page: PageRequest,
    ) -> Result<OrderPage> {
        if caller.role != Role::Driver {
            return Err(DispatchError::Forbidden(
                "only drivers can view their orders",
            ));
        }
        let filter = OrderFilter {
            statuses: statuses.to_vec(),
            assigned_driver_id: Some(caller.user_id),
            page: Some(page),
            ..OrderFilter::default()
        };
        Ok(self.storage.list_orders(&filter)?)
    }
}
