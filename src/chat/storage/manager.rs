//! Namespaced, typed access to a [`KeyValueStore`].
//!
//! Values are wrapped in an envelope carrying the write time and an optional
//! expiry:
//!
//! ```json
//! {"value": <payload>, "timestamp": 1714532645678, "expiry": null}
//! ```
//!
//! Reads also accept a bare payload without the envelope, which is what
//! immediate unload-time flushes of older builds wrote.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::chat::core::errors::StorageResult;
use crate::chat::storage::kv::{KeyValueStore, utf16_bytes};

/// Stored wrapper around a value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageEnvelope<T> {
    /// The payload.
    pub value: T,
    /// Write time, unix milliseconds.
    pub timestamp: i64,
    /// Expiry time, unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,
}

impl<T> StorageEnvelope<T> {
    fn is_expired(&self, now_ms: i64) -> bool {
        self.expiry.is_some_and(|expiry| now_ms > expiry)
    }
}

/// Usage summary for one namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceInfo {
    /// Number of keys in the namespace.
    pub item_count: usize,
    /// UTF-8 bytes of all values in the namespace.
    pub total_size: usize,
    /// Keys, without the namespace prefix.
    pub keys: Vec<String>,
}

/// Namespaced view over a byte store.
#[derive(Clone)]
pub struct StorageManager {
    backend: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl StorageManager {
    /// Create a manager writing under `<namespace>:`.
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    /// Namespace of this manager.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Underlying byte store.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    /// Full backend key for `key`.
    #[must_use]
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}:{key}", self.namespace)
    }

    /// Read and decode a value. Expired entries are removed and read as `None`.
    ///
    /// # Errors
    /// Returns an error if the backend fails or the stored JSON does not
    /// match `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let Some(raw) = self.backend.get(&self.storage_key(key))? else {
            return Ok(None);
        };

        let json: Value = serde_json::from_str(&raw)?;
        if is_envelope(&json) {
            let envelope: StorageEnvelope<T> = serde_json::from_value(json)?;
            if envelope.is_expired(Utc::now().timestamp_millis()) {
                debug!(key, "stored value expired");
                self.remove(key)?;
                return Ok(None);
            }
            return Ok(Some(envelope.value));
        }

        Ok(Some(serde_json::from_value(json)?))
    }

    /// Encode and write a value without expiry.
    ///
    /// # Errors
    /// Returns an error if encoding fails or the backend rejects the write.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        self.write(key, value, None)
    }

    /// Encode and write a value that expires after `ttl`.
    ///
    /// # Errors
    /// Returns an error if encoding fails or the backend rejects the write.
    pub fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> StorageResult<()> {
        self.write(key, value, Some(ttl))
    }

    fn write<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> StorageResult<()> {
        let now = Utc::now().timestamp_millis();
        let envelope = StorageEnvelope {
            value,
            timestamp: now,
            expiry: ttl.map(|ttl| {
                now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
            }),
        };
        let raw = serde_json::to_string(&envelope)?;
        self.backend.set(&self.storage_key(key), &raw)
    }

    /// Delete a value.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    pub fn remove(&self, key: &str) -> StorageResult<()> {
        self.backend.remove(&self.storage_key(key))
    }

    /// Whether a live (non-expired) value exists for `key`.
    ///
    /// # Errors
    /// Returns an error if the backend fails or the value is not JSON.
    pub fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get::<Value>(key)?.is_some())
    }

    /// Keys in this namespace, without the prefix.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    pub fn keys(&self) -> StorageResult<Vec<String>> {
        let prefix = format!("{}:", self.namespace);
        Ok(self
            .backend
            .keys()?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    /// Delete every key in this namespace.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    pub fn clear(&self) -> StorageResult<()> {
        for key in self.keys()? {
            self.remove(&key)?;
        }
        Ok(())
    }

    /// Remove expired and unreadable entries. Returns how many were removed.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    pub fn cleanup(&self) -> StorageResult<usize> {
        let now = Utc::now().timestamp_millis();
        let mut removed = 0;
        for key in self.keys()? {
            let Some(raw) = self.backend.get(&self.storage_key(&key))? else {
                continue;
            };
            let stale = match serde_json::from_str::<Value>(&raw) {
                Ok(json) if is_envelope(&json) => {
                    serde_json::from_value::<StorageEnvelope<Value>>(json)
                        .map_or(true, |envelope| envelope.is_expired(now))
                }
                Ok(_) => false,
                Err(_) => true,
            };
            if stale {
                self.remove(&key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Usage summary of this namespace.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    pub fn info(&self) -> StorageResult<NamespaceInfo> {
        let keys = self.keys()?;
        let mut total_size = 0;
        for key in &keys {
            if let Some(raw) = self.backend.get(&self.storage_key(key))? {
                total_size += raw.len();
            }
        }
        Ok(NamespaceInfo {
            item_count: keys.len(),
            total_size,
            keys,
        })
    }

    /// Bytes used by the whole backend (all namespaces), UTF-16 accounting.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    pub fn backend_used_bytes(&self) -> StorageResult<usize> {
        self.backend.used_bytes()
    }

    /// UTF-16 size of the raw stored value for `key`, 0 if absent.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    pub fn stored_bytes(&self, key: &str) -> StorageResult<usize> {
        Ok(self
            .backend
            .get(&self.storage_key(key))?
            .map_or(0, |raw| utf16_bytes(&raw)))
    }
}

fn is_envelope(json: &Value) -> bool {
    json.as_object()
        .is_some_and(|map| map.contains_key("value") && map.contains_key("timestamp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::storage::memory::MemoryStorage;

    fn manager() -> (Arc<MemoryStorage>, StorageManager) {
        let backend = Arc::new(MemoryStorage::new());
        let manager = StorageManager::new(backend.clone(), "chat-sessions");
        (backend, manager)
    }

    #[test]
    fn test_envelope_roundtrip() {
        let (backend, manager) = manager();
        manager.set("numbers", &vec![1, 2, 3]).unwrap();

        let raw = backend.get("chat-sessions:numbers").unwrap().unwrap();
        let json: Value = serde_json::from_str(&raw).unwrap();
        assert!(json["timestamp"].is_i64());
        assert!(json.get("expiry").is_none());

        let back: Option<Vec<i32>> = manager.get("numbers").unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_bare_value_is_accepted() {
        let (backend, manager) = manager();
        backend.set("chat-sessions:numbers", "[4,5]").unwrap();
        let back: Option<Vec<i32>> = manager.get("numbers").unwrap();
        assert_eq!(back, Some(vec![4, 5]));
    }

    #[test]
    fn test_expired_value_is_removed() {
        let (backend, manager) = manager();
        let envelope = StorageEnvelope {
            value: "old",
            timestamp: 0,
            expiry: Some(1),
        };
        backend
            .set("chat-sessions:x", &serde_json::to_string(&envelope).unwrap())
            .unwrap();

        assert!(manager.get::<String>("x").unwrap().is_none());
        assert!(backend.get("chat-sessions:x").unwrap().is_none());
    }

    #[test]
    fn test_ttl_in_future_is_live() {
        let (_, manager) = manager();
        manager
            .set_with_ttl("x", &"fresh", Duration::from_secs(60))
            .unwrap();
        assert!(manager.has("x").unwrap());
    }

    #[test]
    fn test_keys_clear_and_cleanup() {
        let (backend, manager) = manager();
        manager.set("a", &1).unwrap();
        manager.set("b", &2).unwrap();
        backend.set("chat-sessions:broken", "{not json").unwrap();
        backend.set("other:c", "3").unwrap();

        let mut keys = manager.keys().unwrap();
        keys.sort();
        assert_eq!(keys, ["a", "b", "broken"]);

        assert_eq!(manager.cleanup().unwrap(), 1);
        let info = manager.info().unwrap();
        assert_eq!(info.item_count, 2);

        manager.clear().unwrap();
        assert!(manager.keys().unwrap().is_empty());
        assert_eq!(backend.get("other:c").unwrap().as_deref(), Some("3"));
    }
}
