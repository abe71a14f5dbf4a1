//! The cache store contract.
//!
//! The store is best-effort and non-authoritative: values may vanish at any
//! time, and a write followed by a read may still miss.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::Duration;

use crate::error::Result;

/// Narrow get/set interface over an external key-value cache.
///
/// `kind` namespaces keys so unrelated users of one store never collide.
pub trait CacheStore: Send + Sync + Debug {
    fn get(&self, kind: &str, key: &str) -> Result<Option<String>>;

    fn set(&self, kind: &str, key: &str, value: String, ttl: Duration) -> Result<()>;

    fn delete(&self, kind: &str, key: &str) -> Result<()>;

    /// Fetches several keys; missing keys are absent from the returned map.
    fn get_multi(&self, kind: &str, keys: &[String]) -> Result<BTreeMap<String, String>> {
        let mut found = BTreeMap::new();
        for key in keys {
            if let Some(value) = self.get(kind, key)? {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    fn set_multi(
        &self,
        kind: &str,
        entries: BTreeMap<String, String>,
        ttl: Duration,
    ) -> Result<()> {
        for (key, value) in entries {
            self.set(kind, &key, value, ttl)?;
        }
        Ok(())
    }
}
