//! Observable store state.

use serde::{Deserialize, Serialize};

use crate::chat::core::agent_mode::AgentMode;
use crate::chat::core::ids::SessionId;
use crate::chat::core::message::ChatMessage;
use crate::chat::core::session::ChatSession;

/// Pointer to the session the user is looking at.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActiveSession {
    /// Session living only in memory until its first user message.
    Transient(ChatSession),
    /// Session stored in the persisted list.
    Persisted {
        /// Id of the list entry.
        id: SessionId,
    },
}

impl ActiveSession {
    /// Whether the active session is still transient.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Snapshot published to subscribers after every mutation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatState {
    /// Persisted sessions, pinned first.
    pub sessions: Vec<ChatSession>,
    /// Active session, if any.
    pub active: Option<ActiveSession>,
    /// An agent reply is in flight.
    pub is_ai_responding: bool,
    /// A session switch is settling.
    pub is_session_loading: bool,
}

impl ChatState {
    /// Position of `id` in the persisted list.
    #[must_use]
    pub fn position(&self, id: &SessionId) -> Option<usize> {
        self.sessions.iter().position(|session| &session.id == id)
    }

    /// Persisted session by id.
    #[must_use]
    pub fn session(&self, id: &SessionId) -> Option<&ChatSession> {
        self.sessions.iter().find(|session| &session.id == id)
    }

    /// The active session, resolved against the list.
    #[must_use]
    pub fn active_session(&self) -> Option<&ChatSession> {
        match self.active.as_ref()? {
            ActiveSession::Transient(session) => Some(session),
            ActiveSession::Persisted { id } => self.session(id),
        }
    }

    /// Id of the active session.
    #[must_use]
    pub fn active_id(&self) -> Option<&SessionId> {
        match self.active.as_ref()? {
            ActiveSession::Transient(session) => Some(&session.id),
            ActiveSession::Persisted { id } => Some(id),
        }
    }

    /// Messages of the active session, empty when there is none.
    #[must_use]
    pub fn active_messages(&self) -> &[ChatMessage] {
        self.active_session()
            .map(|session| session.messages.as_slice())
            .unwrap_or_default()
    }

    /// Agent mode of the active session.
    #[must_use]
    pub fn active_agent_mode(&self) -> Option<AgentMode> {
        self.active_session().and_then(|session| session.agent_mode)
    }

    /// Whether the active session is persisted and `id` names it.
    #[must_use]
    pub fn is_active_persisted(&self, id: &SessionId) -> bool {
        matches!(&self.active, Some(ActiveSession::Persisted { id: active }) if active == id)
    }
}

/// Host lifecycle signals that may require an immediate flush.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The page or process is about to unload.
    BeforeUnload,
    /// The page is being hidden and may be discarded.
    PageHide,
    /// The page became hidden.
    VisibilityHidden,
    /// The page became visible again.
    Visible,
}

impl LifecycleEvent {
    /// Whether pending writes should be flushed immediately.
    #[must_use]
    pub const fn requires_flush(self) -> bool {
        !matches!(self, Self::Visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::core::message::NewMessage;

    #[test]
    fn test_active_resolution() {
        let mut stored = ChatSession::new(SessionId::new(), "stored", Some(AgentMode::Cr));
        stored.push_message(NewMessage::user("hi"), 30, "...");
        let mut state = ChatState {
            sessions: vec![stored.clone()],
            ..ChatState::default()
        };
        assert!(state.active_session().is_none());
        assert!(state.active_messages().is_empty());

        state.active = Some(ActiveSession::Persisted {
            id: stored.id.clone(),
        });
        assert_eq!(state.active_session(), Some(&stored));
        assert_eq!(state.active_agent_mode(), Some(AgentMode::Cr));
        assert!(state.is_active_persisted(&stored.id));

        let transient = ChatSession::new(SessionId::transient(), "t", None);
        state.active = Some(ActiveSession::Transient(transient.clone()));
        assert_eq!(state.active_id(), Some(&transient.id));
        assert!(!state.is_active_persisted(&stored.id));
    }

    #[test]
    fn test_lifecycle_flush_events() {
        assert!(LifecycleEvent::BeforeUnload.requires_flush());
        assert!(LifecycleEvent::PageHide.requires_flush());
        assert!(LifecycleEvent::VisibilityHidden.requires_flush());
        assert!(!LifecycleEvent::Visible.requires_flush());
    }
}
