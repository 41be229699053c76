//! Per-account mutation serialization.
//!
//! Trades on the same account run one at a time; trades on different
//! accounts proceed in parallel.

use std::sync::Arc;

use bourse_core::AccountId;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Table of per-account async locks.
#[derive(Debug, Default, Clone)]
pub struct AccountLocks {
    locks: Arc<DashMap<AccountId, Arc<Mutex<()>>>>,
}

impl AccountLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `account`. Released on drop.
    pub async fn lock(&self, account: &AccountId) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the DashMap shard is not held across the await.
        let lock = self
            .locks
            .entry(account.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Take the lock only if nobody holds it.
    pub fn try_lock(&self, account: &AccountId) -> Option<OwnedMutexGuard<()>> {
        let lock = self
            .locks
            .entry(account.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.try_lock_owned().ok()
    }

    /// Number of accounts that have ever been locked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
