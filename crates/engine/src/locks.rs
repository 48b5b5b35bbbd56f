// In crates/engine/src/locks.rs

use core_types::OrderId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;

/// One async mutex per order, so the same order is never evaluated, settled
/// or cancelled by two tasks at once. Different orders never contend.
#[derive(Debug, Default)]
pub struct OrderLocks {
    inner: Mutex<HashMap<OrderId, Arc<AsyncMutex<()>>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the guard mutex for `order_id`, creating it on first use.
    /// Lock the returned mutex for the duration of the critical section.
    pub fn acquire(&self, order_id: OrderId) -> Arc<AsyncMutex<()>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(order_id)
            .or_default()
            .clone()
    }

    /// Drops the mutexes of orders that are no longer open.
    ///
    /// An entry someone still holds or waits on is kept, so a late caller
    /// can never end up with a second mutex for the same order.
    pub fn prune(&self, open: impl Fn(OrderId) -> bool) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|id, lock| open(*id) || Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_order_shares_one_mutex() {
        let locks = OrderLocks::new();
        let a = locks.acquire(OrderId(1));
        let b = locks.acquire(OrderId(1));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &locks.acquire(OrderId(2))));
    }

    #[test]
    fn prune_keeps_held_entries() {
        let locks = OrderLocks::new();
        let held = locks.acquire(OrderId(1));
        drop(locks.acquire(OrderId(2)));

        locks.prune(|_| false);
        assert_eq!(locks.len(), 1);
        assert!(Arc::ptr_eq(&held, &locks.acquire(OrderId(1))));

        drop(held);
        locks.prune(|_| false);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn second_holder_waits() {
        let locks = OrderLocks::new();
        let lock = locks.acquire(OrderId(7));
        let guard = lock.lock().await;
        assert!(locks.acquire(OrderId(7)).try_lock().is_err());
        drop(guard);
        assert!(locks.acquire(OrderId(7)).try_lock().is_ok());
    }
}
