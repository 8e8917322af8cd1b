//! The acceptance protocol: serialize concurrent claims, pick one winner.

use jiff::Timestamp;

use crate::admission::{self, Admission};
use crate::model::{ActionType, Caller, MAIN_GROUP, Order, OrderStatus, Role};
use crate::notify::Event;
use crate::storage::{self, StorageError};

use super::{DispatchError, Dispatcher, Result};

impl Dispatcher {
    /// Claims an open order for a driver.
    ///
    /// The whole read-check-write sequence — status check, admission
    /// (cooldown then capacity), audit append, assignment — runs inside
    /// one immediate transaction. Concurrent claims block on the write
    /// lock until the holder commits, then observe the non-open status
    /// and fail [`DispatchError::Conflict`]. A claim that cannot get the
    /// lock within the configured wait fails retryably instead; see
    /// [`DispatchError::is_retryable`].
    ///
    /// Capacity is counted inside the same transaction, but claims on
    /// *different* orders by one driver can still interleave — a small,
    /// bounded overcommit the protocol tolerates rather than locking a
    /// driver's whole order set.
    pub fn accept(&self, caller: &Caller, order_id: i64) -> Result<Order> {
        if caller.role != Role::Driver {
            return Err(DispatchError::Forbidden("only drivers can accept orders"));
        }
        let driver_id = caller.user_id;
        let now = Timestamp::now();

        let mut conn = self.storage.connect()?;
        let tx = storage::claim_transaction(&mut conn)?;

        let Some(order) = storage::order::fetch(&tx, order_id)? else {
            return Err(DispatchError::NotFound(order_id));
        };
        // The race-resolution point: only the first claim to get here
        // while holding the lock still sees `open`.
        if order.status != OrderStatus::Open {
            return Err(DispatchError::Conflict);
        }

        let policy = storage::policy::read(&tx, MAIN_GROUP)?;
        let last_action_at = storage::action::last_action_at(&tx, driver_id)?;
        let active = storage::order::count_active(&tx, driver_id)?;
        match admission::evaluate(&policy, last_action_at, active, now) {
            Admission::Allow => {}
            Admission::Cooldown { remaining_minutes } => {
                return Err(DispatchError::Cooldown { remaining_minutes });
            }
            Admission::Capacity { limit } => {
                return Err(DispatchError::Capacity { limit });
            }
        }

        storage::action::append(&tx, order_id, driver_id, ActionType::Accept, now)?;
        let claimed = storage::order::claim(&tx, order_id, driver_id, now)?;
        if claimed == 0 {
            // Unreachable while the write lock is held; the guarded
            // update keeps the invariant if the transaction mode ever
            // changes. Dropping the transaction rolls back the audit row.
            return Err(DispatchError::Conflict);
        }
        tx.commit().map_err(StorageError::from)?;

        // Post-commit: the acceptance is final from here on.
        let order = self
            .storage
            .get_order(order_id)?
            .ok_or(DispatchError::NotFound(order_id))?;
        self.notify(&Event::OrderAccepted {
            order_id,
            driver_id,
            order: order.clone(),
        });
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use tempfile::TempDir;

    use crate::model::{NewOrder, Policy};
    use crate::notify::Notifier;
    use crate::storage::Storage;

    use super::*;

    fn test_dispatcher() -> (TempDir, Dispatcher) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path().join("courier.sqlite")).unwrap();
        // Cooldown off unless a test turns it on.
        storage
            .put_policy(
                MAIN_GROUP,
                &Policy {
                    enable_cooldown: false,
                    ..Policy::default()
                },
            )
            .unwrap();
        (dir, Dispatcher::new(storage))
    }

    fn sample_order() -> NewOrder {
        NewOrder {
            message_id: 7,
            customer_name: Some("Nguyen Van A".into()),
            delivery_location: Some("12 Hang Bac".into()),
            note: None,
            cost: Some(150_000),
        }
    }

    fn minutes_ago(minutes: i64) -> Timestamp {
        Timestamp::from_millisecond(Timestamp::now().as_millisecond() - minutes * 60_000).unwrap()
    }

    #[test]
    fn accept_assigns_the_order_and_logs_one_action() {
        let (_dir, dispatcher) = test_dispatcher();
        let order = dispatcher.post_order(&sample_order()).unwrap();

        let accepted = dispatcher.accept(&Caller::driver(42), order.order_id).unwrap();
        assert_eq!(accepted.status, OrderStatus::Assigned);
        assert_eq!(accepted.assigned_driver_id, Some(42));

        let actions = dispatcher.storage().actions_for_order(order.order_id).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, ActionType::Accept);
        assert_eq!(actions[0].driver_id, 42);
    }

    #[test]
    fn accept_unknown_order_is_not_found() {
        let (_dir, dispatcher) = test_dispatcher();
        let err = dispatcher.accept(&Caller::driver(42), 999).unwrap_err();
        assert!(matches!(err, DispatchError::NotFound(999)));
    }

    #[test]
    fn accept_requires_the_driver_role() {
        let (_dir, dispatcher) = test_dispatcher();
        let order = dispatcher.post_order(&sample_order()).unwrap();
        let err = dispatcher.accept(&Caller::admin(1), order.order_id).unwrap_err();
        assert!(matches!(err, DispatchError::Forbidden(_)));
    }

    #[test]
    fn re_accepting_an_assigned_order_is_conflict_without_mutation() {
        let (_dir, dispatcher) = test_dispatcher();
        let order = dispatcher.post_order(&sample_order()).unwrap();
        dispatcher.accept(&Caller::driver(42), order.order_id).unwrap();

        let err = dispatcher.accept(&Caller::driver(43), order.order_id).unwrap_err();
        assert!(matches!(err, DispatchError::Conflict));

        let reloaded = dispatcher.storage().get_order(order.order_id).unwrap().unwrap();
        assert_eq!(reloaded.assigned_driver_id, Some(42));
        // The losing attempt left no audit row behind.
        assert_eq!(dispatcher.storage().actions_for_order(order.order_id).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_accepts_have_exactly_one_winner() {
        let (_dir, dispatcher) = test_dispatcher();
        let order = dispatcher.post_order(&sample_order()).unwrap();
        let order_id = order.order_id;

        let dispatcher = Arc::new(dispatcher);
        let contenders: i64 = 8;
        let barrier = Arc::new(Barrier::new(usize::try_from(contenders).unwrap()));

        let handles: Vec<_> = (0..contenders)
            .map(|i| {
                let dispatcher = Arc::clone(&dispatcher);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    (100 + i, dispatcher.accept(&Caller::driver(100 + i), order_id))
                })
            })
            .collect();

        let mut winners = Vec::new();
        let mut conflicts = 0;
        for handle in handles {
            let (driver_id, result) = handle.join().unwrap();
            match result {
                Ok(order) => {
                    assert_eq!(order.assigned_driver_id, Some(driver_id));
                    winners.push(driver_id);
                }
                Err(DispatchError::Conflict) => conflicts += 1,
                Err(other) => panic!("unexpected error under contention: {other}"),
            }
        }

        assert_eq!(winners.len(), 1);
        assert_eq!(conflicts, contenders - 1);

        let reloaded = dispatcher.storage().get_order(order_id).unwrap().unwrap();
        assert_eq!(reloaded.status, OrderStatus::Assigned);
        assert_eq!(reloaded.assigned_driver_id, Some(winners[0]));

        // Exactly one accept row: losers wrote nothing.
        let actions = dispatcher.storage().actions_for_order(order_id).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, ActionType::Accept);
        assert_eq!(actions[0].driver_id, winners[0]);
    }

    #[test]
    fn cooldown_denies_then_releases() {
        let (_dir, dispatcher) = test_dispatcher();
        dispatcher
            .storage()
            .put_policy(MAIN_GROUP, &Policy::default())
            .unwrap();
        let first = dispatcher.post_order(&sample_order()).unwrap();
        let second = dispatcher.post_order(&sample_order()).unwrap();

        // Last action 5 minutes ago, cooldown 10: about 5 minutes remain.
        dispatcher
            .storage()
            .record_action(first.order_id, 42, ActionType::Ignore, minutes_ago(5))
            .unwrap();
        let err = dispatcher.accept(&Caller::driver(42), second.order_id).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Cooldown {
                remaining_minutes: 5
            }
        ));

        // A different driver is unaffected.
        let other = dispatcher.post_order(&sample_order()).unwrap();
        dispatcher.accept(&Caller::driver(43), other.order_id).unwrap();

        // Once the window has elapsed the same driver gets through.
        let (_dir2, fresh) = test_dispatcher();
        fresh
            .storage()
            .put_policy(MAIN_GROUP, &Policy::default())
            .unwrap();
        let order = fresh.post_order(&sample_order()).unwrap();
        fresh
            .storage()
            .record_action(order.order_id, 42, ActionType::Ignore, minutes_ago(10))
            .unwrap();
        fresh.accept(&Caller::driver(42), order.order_id).unwrap();
    }

    #[test]
    fn capacity_denies_at_limit_and_recovers_after_cancel() {
        let (_dir, dispatcher) = test_dispatcher();
        let driver = Caller::driver(42);

        let mut held = Vec::new();
        for _ in 0..3 {
            let order = dispatcher.post_order(&sample_order()).unwrap();
            dispatcher.accept(&driver, order.order_id).unwrap();
            held.push(order.order_id);
        }

        let fourth = dispatcher.post_order(&sample_order()).unwrap();
        let err = dispatcher.accept(&driver, fourth.order_id).unwrap_err();
        assert!(matches!(err, DispatchError::Capacity { limit: 3 }));

        // Cancelling one frees a slot.
        dispatcher
            .update_status(
                &driver,
                held[0],
                OrderStatus::Cancelled,
                crate::model::UpdateFields {
                    driver_note: Some("customer unreachable".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        dispatcher.accept(&driver, fourth.order_id).unwrap();
    }

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn broadcast(&self, _event: &Event) -> core::result::Result<(), String> {
            Err("socket hub unreachable".into())
        }
    }

    #[test]
    fn notifier_failure_does_not_undo_the_commit() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path().join("courier.sqlite")).unwrap();
        storage
            .put_policy(
                MAIN_GROUP,
                &Policy {
                    enable_cooldown: false,
                    ..Policy::default()
                },
            )
            .unwrap();
        let dispatcher = Dispatcher::with_notifier(storage, FailingNotifier);

        let order = dispatcher.post_order(&sample_order()).unwrap();
        let accepted = dispatcher.accept(&Caller::driver(42), order.order_id).unwrap();
        assert_eq!(accepted.status, OrderStatus::Assigned);

        let reloaded = dispatcher.storage().get_order(order.order_id).unwrap().unwrap();
        assert_eq!(reloaded.status, OrderStatus::Assigned);
    }

    #[test]
    fn accepted_event_is_broadcast_after_commit() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path().join("courier.sqlite")).unwrap();
        storage
            .put_policy(
                MAIN_GROUP,
                &Policy {
                    enable_cooldown: false,
                    ..Policy::default()
                },
            )
            .unwrap();
        let (notifier, rx) = crate::notify::ChannelNotifier::new();
        let dispatcher = Dispatcher::with_notifier(storage, notifier);

        let posted = dispatcher.post_order(&sample_order()).unwrap();
        dispatcher.accept(&Caller::driver(42), posted.order_id).unwrap();

        match rx.try_recv().unwrap() {
            Event::OrderAccepted {
                order_id,
                driver_id,
                order,
            } => {
                assert_eq!(order_id, posted.order_id);
                assert_eq!(driver_id, 42);
                assert_eq!(order.status, OrderStatus::Assigned);
            }
            other => panic!("expected orderAccepted, got {}", other.name()),
        }
    }
}
