//! Chat session model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::core::agent_mode::AgentMode;
use crate::chat::core::ids::{MessageId, SessionId};
use crate::chat::core::message::{ChatMessage, MessageSender, NewMessage};
use crate::chat::core::timestamps::{self, iso_millis};

/// One conversation thread.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Session identifier.
    pub id: SessionId,
    /// Display title.
    pub title: String,
    /// Messages in insertion order.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Remote agent the session targets; `None` for a general chat.
    #[serde(default)]
    pub agent_mode: Option<AgentMode>,
    /// Ticket key the conversation is about (e.g. `BPM-12345`).
    #[serde(
        default,
        alias = "jiraNumber",
        skip_serializing_if = "Option::is_none"
    )]
    pub ticket_reference: Option<String>,
    /// Creation time.
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    #[serde(with = "iso_millis")]
    pub updated_at: DateTime<Utc>,
    /// Pinned sessions sort first and are never evicted.
    #[serde(default)]
    pub is_pinned: bool,
}

impl ChatSession {
    /// Create an empty session with the given id.
    #[must_use]
    pub fn new(id: SessionId, title: impl Into<String>, agent_mode: Option<AgentMode>) -> Self {
        let now = timestamps::now();
        Self {
            id,
            title: title.into(),
            messages: Vec::new(),
            agent_mode,
            ticket_reference: None,
            created_at: now,
            updated_at: now,
            is_pinned: false,
        }
    }

    /// Refresh `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = timestamps::now();
    }

    /// Append a message, deriving the title when it is the first user message.
    ///
    /// Returns the id of the appended message.
    pub fn push_message(
        &mut self,
        message: NewMessage,
        title_max_chars: usize,
        ellipsis: &str,
    ) -> MessageId {
        let message = message.into_message();
        let id = message.id.clone();
        self.append(message, title_max_chars, ellipsis);
        id
    }

    /// Append an already materialized message.
    pub fn append(&mut self, message: ChatMessage, title_max_chars: usize, ellipsis: &str) {
        if self.messages.is_empty() && message.sender == MessageSender::User {
            self.title = derive_title(&message.content, title_max_chars, ellipsis);
        }
        self.messages.push(message);
        self.touch();
    }

    /// Overwrite the body of the newest message. Returns `false` if empty.
    pub fn replace_last_content(&mut self, content: impl Into<String>) -> bool {
        let Some(last) = self.messages.last_mut() else {
            return false;
        };
        last.content = content.into();
        self.touch();
        true
    }

    /// Remove a message by id. Returns `false` if it was not found.
    pub fn remove_message(&mut self, id: &MessageId) -> bool {
        let before = self.messages.len();
        self.messages.retain(|message| &message.id != id);
        if self.messages.len() == before {
            return false;
        }
        self.touch();
        true
    }

    /// Set or clear the ticket reference.
    pub fn set_ticket_reference(&mut self, value: Option<String>) {
        self.ticket_reference = value;
        self.touch();
    }

    /// Newest message, if any.
    #[must_use]
    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

/// Title from the first `max_chars` characters of `content`, with `ellipsis`
/// appended when something was cut off.
#[must_use]
pub fn derive_title(content: &str, max_chars: usize, ellipsis: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}{ellipsis}")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ChatSession {
        ChatSession::new(SessionId::new(), "새로운 대화", None)
    }

    #[test]
    fn test_derive_title_truncates_by_chars() {
        assert_eq!(derive_title("short", 30, "..."), "short");
        let korean = "가".repeat(31);
        assert_eq!(derive_title(&korean, 30, "..."), format!("{}...", "가".repeat(30)));
        assert_eq!(derive_title(&"a".repeat(30), 30, "..."), "a".repeat(30));
    }

    #[test]
    fn test_first_user_message_sets_title() {
        let mut s = session();
        s.push_message(NewMessage::user("hello there"), 30, "...");
        s.push_message(NewMessage::user("second"), 30, "...");
        assert_eq!(s.title, "hello there");
    }

    #[test]
    fn test_first_ai_message_keeps_title() {
        let mut s = session();
        s.push_message(NewMessage::ai("welcome"), 30, "...");
        s.push_message(NewMessage::user("question"), 30, "...");
        assert_eq!(s.title, "새로운 대화");
    }

    #[test]
    fn test_replace_and_remove() {
        let mut s = session();
        assert!(!s.replace_last_content("nothing"));

        let first = s.push_message(NewMessage::ai("a"), 30, "...");
        s.push_message(NewMessage::ai("b"), 30, "...");
        let stamp = s.messages[1].timestamp;
        assert!(s.replace_last_content("b2"));
        assert_eq!(s.messages[1].content, "b2");
        assert_eq!(s.messages[1].timestamp, stamp);

        assert!(s.remove_message(&first));
        assert!(!s.remove_message(&first));
        assert_eq!(s.messages.len(), 1);
    }

    #[test]
    fn test_legacy_fields_default() {
        let raw = r#"{
            "id": "session_1712345678901",
            "title": "old",
            "messages": [],
            "jiraNumber": "BPM-1",
            "createdAt": "2024-05-01T03:04:05.678Z",
            "updatedAt": "2024-05-01T03:04:05.678Z"
        }"#;
        let s: ChatSession = serde_json::from_str(raw).unwrap();
        assert!(s.agent_mode.is_none());
        assert!(!s.is_pinned);
        assert_eq!(s.ticket_reference.as_deref(), Some("BPM-1"));

        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["ticketReference"], "BPM-1");
        assert_eq!(json["isPinned"], false);
    }
}
