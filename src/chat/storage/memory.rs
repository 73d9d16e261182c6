//! In-memory key-value store with an optional quota.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::chat::core::errors::{StorageError, StorageResult};
use crate::chat::storage::kv::{KeyValueStore, utf16_bytes};

/// Quota browsers typically grant `localStorage` per origin.
pub const BROWSER_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Thread-safe in-memory store.
///
/// Counts successful writes so callers can observe debouncing, and can be
/// told to fail writes to exercise best-effort persistence paths.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: DashMap<String, String>,
    quota_bytes: Option<usize>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    /// Create an unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes beyond `quota_bytes`.
    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::default()
        }
    }

    /// Number of successful `set` calls so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent `set` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn total_bytes(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| utf16_bytes(entry.key()) + utf16_bytes(entry.value()))
            .sum()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let needed = utf16_bytes(key) + utf16_bytes(value);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::QuotaExceeded {
                needed,
                available: 0,
            });
        }

        if let Some(quota) = self.quota_bytes {
            let replaced = self
                .entries
                .get(key)
                .map_or(0, |entry| utf16_bytes(key) + utf16_bytes(entry.value()));
            let available = quota.saturating_sub(self.total_bytes() - replaced);
            if needed > available {
                return Err(StorageError::QuotaExceeded { needed, available });
            }
        }

        self.entries.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.iter().map(|entry| entry.key().clone()).collect())
    }

    fn used_bytes(&self) -> StorageResult<usize> {
        Ok(self.total_bytes())
    }
}
