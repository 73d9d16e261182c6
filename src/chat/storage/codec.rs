//! Session list encoding, size accounting and restore.

use tracing::{debug, warn};

use crate::chat::core::errors::StorageResult;
use crate::chat::core::session::ChatSession;
use crate::chat::policy::ordering::sort_pinned_first;
use crate::chat::storage::kv::utf16_bytes;
use crate::chat::storage::manager::StorageManager;

/// UTF-16 bytes of one session serialized as compact JSON.
///
/// Serialization failures count as zero and are logged.
#[must_use]
pub fn session_size_bytes(session: &ChatSession) -> usize {
    match serde_json::to_string(session) {
        Ok(json) => utf16_bytes(&json),
        Err(err) => {
            warn!(session_id = %session.id, error = %err, "failed to measure session");
            0
        }
    }
}

/// UTF-16 bytes of the list serialized as a compact JSON array.
#[must_use]
pub fn sessions_size_bytes(sessions: &[ChatSession]) -> usize {
    list_size_bytes(sessions.iter().map(session_size_bytes))
}

/// Size of a JSON array whose elements have the given sizes: brackets plus
/// one comma between neighbours.
#[must_use]
pub fn list_size_bytes(element_bytes: impl IntoIterator<Item = usize>) -> usize {
    let mut count: usize = 0;
    let mut total = 0;
    for bytes in element_bytes {
        count += 1;
        total += bytes;
    }
    let separators = count.saturating_sub(1);
    total + (2 + separators) * 2
}

/// Load the session list stored under `key`.
///
/// Never fails: missing, corrupt or wrongly shaped data yields an empty list.
#[must_use]
pub fn restore_sessions(manager: &StorageManager, key: &str) -> Vec<ChatSession> {
    match manager.get::<Vec<ChatSession>>(key) {
        Ok(Some(sessions)) => {
            debug!(count = sessions.len(), "restored sessions");
            sort_pinned_first(sessions)
        }
        Ok(None) => Vec::new(),
        Err(err) => {
            warn!(
                key = %manager.storage_key(key),
                error = %err,
                "failed to restore sessions, starting empty"
            );
            Vec::new()
        }
    }
}

/// Write the session list under `key`.
///
/// # Errors
/// Returns an error if encoding fails or the backend rejects the write.
pub fn save_sessions(
    manager: &StorageManager,
    key: &str,
    sessions: &[ChatSession],
) -> StorageResult<()> {
    manager.set(key, &sessions)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::chat::core::ids::SessionId;
    use crate::chat::core::message::NewMessage;
    use crate::chat::storage::kv::KeyValueStore;
    use crate::chat::storage::memory::MemoryStorage;

    fn sessions() -> Vec<ChatSession> {
        let mut a = ChatSession::new(SessionId::new(), "새로운 대화", None);
        a.push_message(NewMessage::user("안녕하세요 😀"), 30, "...");
        let b = ChatSession::new(SessionId::new(), "b", None);
        vec![a, b]
    }

    #[test]
    fn test_size_matches_serialized_array() {
        let list = sessions();
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(sessions_size_bytes(&list), utf16_bytes(&json));
        assert_eq!(sessions_size_bytes(&[]), 4);
    }

    #[test]
    fn test_list_size_counts_brackets_and_commas() {
        assert_eq!(list_size_bytes([]), 4);
        assert_eq!(list_size_bytes([10]), 14);
        assert_eq!(list_size_bytes([10, 20, 30]), 60 + 8);
    }

    #[test]
    fn test_save_and_restore() {
        let backend = Arc::new(MemoryStorage::new());
        let manager = StorageManager::new(backend, "chat-sessions");
        let list = sessions();

        save_sessions(&manager, "sessions", &list).unwrap();
        assert_eq!(restore_sessions(&manager, "sessions"), list);
    }

    #[test]
    fn test_restore_tolerates_garbage() {
        let backend = Arc::new(MemoryStorage::new());
        let manager = StorageManager::new(backend.clone(), "chat-sessions");
        assert!(restore_sessions(&manager, "sessions").is_empty());

        backend.set("chat-sessions:sessions", "{oops").unwrap();
        assert!(restore_sessions(&manager, "sessions").is_empty());

        backend.set("chat-sessions:sessions", r#"{"not":"a list"}"#).unwrap();
        assert!(restore_sessions(&manager, "sessions").is_empty());

        backend
            .set("chat-sessions:sessions", r#"{"value":42,"timestamp":1}"#)
            .unwrap();
        assert!(restore_sessions(&manager, "sessions").is_empty());
    }

    #[test]
    fn test_restore_bare_array() {
        let backend = Arc::new(MemoryStorage::new());
        let manager = StorageManager::new(backend.clone(), "chat-sessions");
        let list = sessions();
        backend
            .set("chat-sessions:sessions", &serde_json::to_string(&list).unwrap())
            .unwrap();
        assert_eq!(restore_sessions(&manager, "sessions"), list);
    }
}
