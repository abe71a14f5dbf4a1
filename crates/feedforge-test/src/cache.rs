//! In-memory cache store with TTL bookkeeping.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use feedforge_core::{CacheStore, Result, StreamError};

/// A `CacheStore` backed by a `HashMap`.
///
/// TTLs are recorded but never expire entries; tests inspect them instead.
/// `lossy` mode accepts writes and drops them, `broken` mode fails every call.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<(String, String), (String, Duration)>>,
    gets: AtomicUsize,
    sets: AtomicUsize,
    lossy: AtomicBool,
    broken: AtomicBool,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that acknowledges writes without keeping them.
    pub fn lossy() -> Self {
        let store = Self::default();
        store.lossy.store(true, Ordering::SeqCst);
        store
    }

    /// A store whose every operation fails.
    pub fn broken() -> Self {
        let store = Self::default();
        store.broken.store(true, Ordering::SeqCst);
        store
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// TTL recorded for a key, if present.
    pub fn ttl_of(&self, kind: &str, key: &str) -> Option<Duration> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(&(kind.to_string(), key.to_string()))
            .map(|(_, ttl)| *ttl)
    }

    /// Every key stored under `kind`.
    pub fn keys(&self, kind: &str) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .keys()
                    .filter(|(k, _)| k == kind)
                    .map(|(_, key)| key.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Overwrites a raw value, bypassing the write counters.
    pub fn insert_raw(&self, kind: &str, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                (kind.to_string(), key.to_string()),
                (value.to_string(), Duration::ZERO),
            );
        }
    }

    fn check(&self) -> Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            Err(StreamError::Cache("store unavailable".into()))
        } else {
            Ok(())
        }
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), (String, Duration)>>> {
        self.entries
            .lock()
            .map_err(|_| StreamError::Cache("store lock poisoned".into()))
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, kind: &str, key: &str) -> Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let entries = self.lock()?;
        Ok(entries
            .get(&(kind.to_string(), key.to_string()))
            .map(|(value, _)| value.clone()))
    }

    fn set(&self, kind: &str, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        if self.lossy.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.lock()?
            .insert((kind.to_string(), key.to_string()), (value, ttl));
        Ok(())
    }

    fn delete(&self, kind: &str, key: &str) -> Result<()> {
        self.check()?;
        self.lock()?.remove(&(kind.to_string(), key.to_string()));
        Ok(())
    }
}
