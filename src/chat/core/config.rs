//! Configuration for the chat session store.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chat::core::errors::{ChatError, ChatResult};

/// Default eviction budget: 3.8 MiB of UTF-16 encoded session JSON.
pub const DEFAULT_EVICTION_BUDGET_BYTES: usize = 3_984_588;

/// Settings for [`crate::chat::store::SessionStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatStoreConfig {
    /// Namespace prefixed to every storage key (`<namespace>:<key>`).
    pub namespace: String,
    /// Key of the session list inside the namespace.
    pub sessions_key: String,
    /// Delay before a scheduled write hits the byte store.
    #[serde(with = "duration_millis")]
    pub debounce_delay: Duration,
    /// Minimum time the session-loading flag stays raised after a selection.
    #[serde(with = "duration_millis")]
    pub session_loading_delay: Duration,
    /// Size ceiling for the serialized session list, in bytes.
    pub eviction_budget_bytes: usize,
    /// Number of characters kept when deriving a title from a message.
    pub title_max_chars: usize,
    /// Marker appended to truncated titles.
    pub title_ellipsis: String,
    /// Title of sessions that have no user message yet.
    pub default_title: String,
}

impl Default for ChatStoreConfig {
    fn default() -> Self {
        Self {
            namespace: "chat-sessions".to_string(),
            sessions_key: "sessions".to_string(),
            debounce_delay: Duration::from_millis(500),
            session_loading_delay: Duration::from_millis(500),
            eviction_budget_bytes: DEFAULT_EVICTION_BUDGET_BYTES,
            title_max_chars: 30,
            title_ellipsis: "...".to_string(),
            default_title: "새로운 대화".to_string(),
        }
    }
}

impl ChatStoreConfig {
    /// Create a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the debounce delay.
    #[must_use]
    pub const fn with_debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    /// Set the minimum loading-flag duration.
    #[must_use]
    pub const fn with_session_loading_delay(mut self, delay: Duration) -> Self {
        self.session_loading_delay = delay;
        self
    }

    /// Set the eviction budget in bytes.
    #[must_use]
    pub const fn with_eviction_budget(mut self, bytes: usize) -> Self {
        self.eviction_budget_bytes = bytes;
        self
    }

    /// Set the title truncation length.
    #[must_use]
    pub const fn with_title_max_chars(mut self, chars: usize) -> Self {
        self.title_max_chars = chars;
        self
    }

    /// Full storage key of the session list.
    #[must_use]
    pub fn sessions_storage_key(&self) -> String {
        format!("{}:{}", self.namespace, self.sessions_key)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or empty.
    pub fn validate(&self) -> ChatResult<()> {
        if self.namespace.trim().is_empty() {
            return Err(ChatError::InvalidConfig(
                "namespace must not be empty".to_string(),
            ));
        }

        if self.sessions_key.trim().is_empty() {
            return Err(ChatError::InvalidConfig(
                "sessions_key must not be empty".to_string(),
            ));
        }

        if self.title_max_chars == 0 {
            return Err(ChatError::InvalidConfig(
                "title_max_chars must be > 0".to_string(),
            ));
        }

        if self.eviction_budget_bytes == 0 {
            return Err(ChatError::InvalidConfig(
                "eviction_budget_bytes must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Serde module for millisecond `Duration` fields.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
