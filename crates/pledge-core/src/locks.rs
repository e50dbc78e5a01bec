// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-key async locks.
//!
//! Each promise key gets its own `tokio` mutex, created on first use and
//! dropped again once nobody holds or waits for it. Distinct keys never share a
//! lock.
//!
//! A waiter cancelled after the holder released leaves its entry behind with no
//! other owner. Such entries are swept whenever a new key is inserted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Table of per-key locks.
#[derive(Default)]
pub struct KeyedLocks {
    table: LockTable,
}

impl KeyedLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting for the current holder if any.
    pub async fn lock(&self, key: &str) -> KeyGuard<'_> {
        let mutex = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            match table.get(key) {
                Some(mutex) => mutex.clone(),
                None => {
                    table.retain(|_, mutex| Arc::strong_count(mutex) > 1);
                    let mutex = Arc::new(AsyncMutex::new(()));
                    table.insert(key.to_string(), mutex.clone());
                    mutex
                }
            }
        };

        let guard = mutex.lock_owned().await;
        KeyGuard {
            table: &self.table,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of keys with a live lock entry.
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no key currently has a live lock entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive hold on one key. Released on drop.
pub struct KeyGuard<'a> {
    table: &'a LockTable,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // The table's own Arc is the last reference: nobody holds or waits.
        if table
            .get(&self.key)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            table.remove(&self.key);
        }
    }
}
