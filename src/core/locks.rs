//! Per-customer serialization.
//!
//! Every read-modify-write of a customer's balance runs while holding that
//! customer's async mutex. Different customers use different mutexes, so they
//! never block each other. The lock is always taken before the database
//! transaction is opened.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

const PRUNE_THRESHOLD: usize = 1024;

/// Guard proving exclusive access to one customer's ledger rows
pub type CustomerGuard = OwnedMutexGuard<()>;

/// Table of per-customer mutexes, created on demand
#[derive(Debug, Default)]
pub struct CustomerLocks {
    entries: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl CustomerLocks {
    /// Creates an empty lock table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `customer_id`.
    pub async fn acquire(&self, customer_id: i64) -> CustomerGuard {
        let lock = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            if entries.len() >= PRUNE_THRESHOLD {
                // nobody but the table holds these
                entries.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(entries.entry(customer_id).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of customers with a live lock entry
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no lock entries exist
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_customer_serializes() {
        let locks = Arc::new(CustomerLocks::new());
        let guard = locks.acquire(1).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire(1).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should finish once the guard is dropped")
            .expect("task should not panic");
    }

    #[tokio::test]
    async fn test_different_customers_do_not_block() {
        let locks = CustomerLocks::new();
        let _first = locks.acquire(1).await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.acquire(2)).await;
        assert!(second.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
