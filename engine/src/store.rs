//! Cache store contract, in-memory store and the availability-latching handle.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::StoreError;

/// Trait for external key-value stores.
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Check connectivity. Stores that cannot tell report success.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Thread-safe in-process store.
pub struct MemoryStore {
    entries: DashMap<String, Vec<u8>>,
    gets: AtomicU64,
    puts: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            gets: AtomicU64::new(0),
            puts: AtomicU64::new(0),
        }
    }

    /// Get the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw stored value, bypassing call counters.
    pub fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).map(|v| v.clone())
    }

    /// Get store statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.entries.len(),
            gets: self.gets.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub entries: usize,
    pub gets: u64,
    pub puts: u64,
}

/// Store that refuses every call, for tests.
#[cfg(any(test, feature = "test-utils"))]
pub struct FailingStore {
    calls: AtomicU64,
    fail_ping: bool,
}

#[cfg(any(test, feature = "test-utils"))]
impl FailingStore {
    /// Store whose ping succeeds but whose reads and writes fail.
    pub fn new() -> Self {
        Self {
            calls: AtomicU64::new(0),
            fail_ping: false,
        }
    }

    /// Store that is already unreachable at probe time.
    pub fn unreachable() -> Self {
        Self {
            calls: AtomicU64::new(0),
            fail_ping: true,
        }
    }

    /// Calls received, ping included.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for FailingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl CacheStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn put(&self, _key: &str, _value: &[u8]) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_ping {
            Err(StoreError::Unavailable("authentication failed".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Shared handle that turns store failures into misses.
///
/// The store is probed once on first use. The first failure (probe, read or
/// write) switches the handle off for good and every later call skips the
/// store.
pub struct StoreHandle {
    store: Arc<dyn CacheStore>,
    probed: OnceCell<()>,
    available: AtomicBool,
}

impl StoreHandle {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            probed: OnceCell::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Check whether the store is still in use.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn ensure_probed(&self) {
        self.probed
            .get_or_init(|| async {
                if let Err(e) = self.store.ping().await {
                    self.disable(&e);
                }
            })
            .await;
    }

    fn disable(&self, error: &StoreError) {
        if self.available.swap(false, Ordering::SeqCst) {
            warn!(error = %error, "Cache store unavailable, falling back to live fetches");
        }
    }

    /// Read `key`; unavailability reads as a miss.
    pub async fn read(&self, key: &str) -> Option<Vec<u8>> {
        self.ensure_probed().await;
        if !self.is_available() {
            return None;
        }

        match self.store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                self.disable(&e);
                None
            }
        }
    }

    /// Write `key`; returns whether the value was stored.
    pub async fn write(&self, key: &str, value: &[u8]) -> bool {
        self.ensure_probed().await;
        if !self.is_available() {
            debug!(key, "Cache store disabled, skipping write");
            return false;
        }

        match self.store.put(key, value).await {
            Ok(()) => true,
            Err(e) => {
                self.disable(&e);
                false
            }
        }
    }
}
