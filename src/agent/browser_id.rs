//! Stable per-installation identifier sent with agent queries when no chat
//! session is active.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chat::storage::kv::KeyValueStore;

/// Storage key of the browser session id.
pub const BROWSER_SESSION_KEY: &str = "mediatech_browser_session_id";

/// Generate `session_<base36 millis>_<uuid v4>`.
#[must_use]
pub fn generate_browser_session_id() -> String {
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    format!("session_{}_{}", to_base36(millis), Uuid::new_v4())
}

/// Stored id, or a new one written to `store`. When the store fails an
/// ephemeral id is returned.
pub fn browser_session_id(store: &dyn KeyValueStore) -> String {
    match store.get(BROWSER_SESSION_KEY) {
        Ok(Some(existing)) if !existing.is_empty() => return existing,
        Ok(_) => {}
        Err(err) => {
            warn!(error = %err, "browser session id unreadable, using a temporary one");
            return generate_browser_session_id();
        }
    }

    let id = generate_browser_session_id();
    match store.set(BROWSER_SESSION_KEY, &id) {
        Ok(()) => info!(browser_session_id = %id, "browser session id created"),
        Err(err) => warn!(error = %err, "browser session id not saved, using it temporarily"),
    }
    id
}

/// Stored id without creating one.
#[must_use]
pub fn current_browser_session_id(store: &dyn KeyValueStore) -> Option<String> {
    store
        .get(BROWSER_SESSION_KEY)
        .inspect_err(|err| warn!(error = %err, "browser session id unreadable"))
        .ok()
        .flatten()
}

/// Drop the stored id and create a fresh one.
pub fn reset_browser_session_id(store: &dyn KeyValueStore) -> String {
    if let Err(err) = store.remove(BROWSER_SESSION_KEY) {
        warn!(error = %err, "failed to reset browser session id");
        return generate_browser_session_id();
    }
    browser_session_id(store)
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        // value % 36 < 36
        #[allow(clippy::cast_possible_truncation)]
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::storage::memory::MemoryStorage;

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_712_345_678_901), "lun2elv9");
    }

    #[test]
    fn test_id_format() {
        let id = generate_browser_session_id();
        let parts: Vec<&str> = id.splitn(3, '_').collect();
        assert_eq!(parts[0], "session");
        assert!(parts[1].chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(Uuid::parse_str(parts[2]).is_ok());
    }

    #[test]
    fn test_get_or_create_is_stable() {
        let store = MemoryStorage::new();
        assert!(current_browser_session_id(&store).is_none());

        let first = browser_session_id(&store);
        assert_eq!(browser_session_id(&store), first);
        assert_eq!(current_browser_session_id(&store), Some(first.clone()));

        let reset = reset_browser_session_id(&store);
        assert_ne!(reset, first);
        assert_eq!(browser_session_id(&store), reset);
    }

    #[test]
    fn test_failed_store_yields_ephemeral_id() {
        let store = MemoryStorage::new();
        store.set_fail_writes(true);
        let a = browser_session_id(&store);
        let b = browser_session_id(&store);
        assert_ne!(a, b);
    }
}
