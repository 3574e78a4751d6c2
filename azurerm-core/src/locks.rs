//! Locks - Keyed mutexes serializing mutations of the same remote object
//!
//! Locks are taken by name (scoped to a resource type) or by remote ID and
//! are released when the returned guard is dropped.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of named locks shared by every operation of a provider
#[derive(Debug, Default)]
pub struct NamedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Held locks; dropping the guard releases them
#[derive(Debug)]
pub struct LockGuard {
    keys: Vec<String>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl LockGuard {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        for key in &self.keys {
            log::debug!("Unlocking {:?}", key);
        }
    }
}

impl NamedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock a single object by name, e.g. `("vnet1", "azurerm_virtual_network")`
    pub async fn by_name(&self, name: &str, resource_type: &str) -> LockGuard {
        self.acquire(vec![name_key(name, resource_type)]).await
    }

    /// Lock a single object by its remote ID
    pub async fn by_id(&self, id: &str) -> LockGuard {
        self.acquire(vec![id.to_string()]).await
    }

    /// Lock several objects of one type at once
    ///
    /// Keys are de-duplicated and taken in sorted order, so callers locking
    /// overlapping sets cannot deadlock each other.
    pub async fn multiple_by_name(&self, names: &[String], resource_type: &str) -> LockGuard {
        let keys = names.iter().map(|n| name_key(n, resource_type)).collect();
        self.acquire(keys).await
    }

    /// Number of keys ever locked
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    async fn acquire(&self, mut keys: Vec<String>) -> LockGuard {
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            // Clone the Arc out so the map shard is not held across the await
            let mutex = self.locks.entry(key.clone()).or_default().value().clone();
            log::debug!("Locking {:?}", key);
            guards.push(mutex.lock_owned().await);
        }

        LockGuard {
            keys,
            _guards: guards,
        }
    }
}

fn name_key(name: &str, resource_type: &str) -> String {
    format!("{}.{}", resource_type, name)
}
