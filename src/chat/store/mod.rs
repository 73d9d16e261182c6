//! The chat session store.
//!
//! [`SessionStore`] owns the persisted session list and the active session.
//! Every mutation runs synchronously against a `tokio::sync::watch` channel,
//! so subscribers see each change, and then requests a debounced write of the
//! list. Writes are best effort: failures are logged and the in-memory state
//! is kept.

mod state;


pub use state::{ActiveSession, ChatState, LifecycleEvent};

use std::fmt;
use std::mem;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::chat::core::agent_mode::AgentMode;
use crate::chat::core::config::ChatStoreConfig;
use crate::chat::core::errors::ChatResult;
use crate::chat::core::ids::{MessageId, SessionId};
use crate::chat::core::message::{
    ChatMessage, MessageMetadata, MessageSender, MessageType, NewMessage, SourceMeta,
};
use crate::chat::core::session::ChatSession;
use crate::chat::persist::debounce::{DebouncedWriter, FlushFn};
use crate::chat::persist::scheduler::{Scheduler, TaskHandle};
use crate::chat::policy::eviction::{EvictionReport, evict_to_budget};
use crate::chat::policy::ordering::{self, insert_after_pinned};
use crate::chat::storage::codec::{restore_sessions, save_sessions, sessions_size_bytes};
use crate::chat::storage::kv::KeyValueStore;
use crate::chat::storage::manager::StorageManager;

/// Storage usage snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StorageReport {
    /// Bytes used by every key of the byte store.
    pub total_bytes: usize,
    /// Bytes of the serialized session list.
    pub sessions_bytes: usize,
    /// Number of persisted sessions.
    pub session_count: usize,
}

impl fmt::Display for StorageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "store {} KiB, sessions {} KiB, {} sessions",
            self.total_bytes / 1024,
            self.sessions_bytes / 1024,
            self.session_count
        )
    }
}

/// Client-side chat session store.
pub struct SessionStore {
    config: ChatStoreConfig,
    state: Arc<watch::Sender<ChatState>>,
    storage: StorageManager,
    scheduler: Arc<dyn Scheduler>,
    writer: DebouncedWriter,
    loading_reset: Option<TaskHandle>,
}

impl SessionStore {
    /// Open the store and restore the persisted session list.
    ///
    /// Unreadable persisted data is discarded (and logged); the store then
    /// starts empty.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn open(
        config: ChatStoreConfig,
        backend: Arc<dyn KeyValueStore>,
        scheduler: Arc<dyn Scheduler>,
    ) -> ChatResult<Self> {
        config.validate()?;

        let storage = StorageManager::new(backend, config.namespace.clone());
        let sessions = restore_sessions(&storage, &config.sessions_key);
        info!(
            namespace = %config.namespace,
            sessions = sessions.len(),
            "session store opened"
        );

        let state = Arc::new(watch::Sender::new(ChatState {
            sessions,
            ..ChatState::default()
        }));
        let flush = session_flush(
            Arc::clone(&state),
            storage.clone(),
            config.sessions_key.clone(),
        );
        let writer = DebouncedWriter::new(Arc::clone(&scheduler), config.debounce_delay, flush);

        Ok(Self {
            config,
            state,
            storage,
            scheduler,
            writer,
            loading_reset: None,
        })
    }

    // ---- sessions -------------------------------------------------------

    /// Create a persisted session, insert it as the first unpinned entry and
    /// make it active.
    pub fn create_session(&mut self, agent_mode: Option<AgentMode>) -> SessionId {
        let session = ChatSession::new(
            SessionId::new(),
            self.config.default_title.clone(),
            agent_mode,
        );
        let id = session.id.clone();
        self.modify(|state| {
            insert_after_pinned(&mut state.sessions, session);
            state.active = Some(ActiveSession::Persisted { id: id.clone() });
        });
        debug!(session_id = %id, "session created");
        self.writer.schedule();
        id
    }

    /// Create a transient session and make it active. It is not persisted
    /// until its first user message.
    pub fn create_transient_session(&mut self, agent_mode: Option<AgentMode>) -> SessionId {
        let session = ChatSession::new(
            SessionId::transient(),
            self.config.default_title.clone(),
            agent_mode,
        );
        let id = session.id.clone();
        self.modify(|state| state.active = Some(ActiveSession::Transient(session)));
        id
    }

    /// Make a persisted session active and raise the loading flag for
    /// `session_loading_delay`. Unknown ids are ignored.
    pub fn select_session(&mut self, id: &SessionId) -> bool {
        let selected = self.modify_if(|state| {
            state.position(id)?;
            state.active = Some(ActiveSession::Persisted { id: id.clone() });
            state.is_session_loading = true;
            Some(())
        });
        if selected.is_none() {
            debug!(session_id = %id, "select ignored: unknown session");
            return false;
        }

        if let Some(previous) = self.loading_reset.take() {
            previous.cancel();
        }
        let sender = Arc::clone(&self.state);
        self.loading_reset = Some(self.scheduler.schedule(
            self.config.session_loading_delay,
            Box::new(move || {
                sender.send_if_modified(|current| {
                    mem::replace(&mut current.is_session_loading, false)
                });
            }),
        ));
        true
    }

    /// Remove a session from the list, clearing the active pointer if it
    /// named that session. The list is re-persisted either way.
    pub fn delete_session(&mut self, id: &SessionId) -> bool {
        let mut removed = false;
        self.modify(|state| {
            let before = state.sessions.len();
            state.sessions.retain(|session| &session.id != id);
            if state.active_id() == Some(id) {
                state.active = None;
            }
            removed = state.sessions.len() != before;
        });
        if !removed {
            debug!(session_id = %id, "delete: unknown session");
        }
        self.writer.schedule();
        removed
    }

    /// Rename a session, in the list and on the active transient session.
    pub fn update_session_title(&mut self, id: &SessionId, title: impl Into<String>) -> bool {
        let title = title.into();
        let outcome = self.modify_if(|state| {
            let mut in_list = false;
            if let Some(session) = state.sessions.iter_mut().find(|session| &session.id == id) {
                session.title.clone_from(&title);
                session.touch();
                in_list = true;
            }
            let mut transient = false;
            if let Some(ActiveSession::Transient(session)) = state.active.as_mut()
                && &session.id == id
            {
                session.title.clone_from(&title);
                session.touch();
                transient = true;
            }
            (in_list || transient).then_some(in_list)
        });

        match outcome {
            Some(in_list) => {
                if in_list {
                    self.writer.schedule();
                }
                true
            }
            None => {
                debug!(session_id = %id, "rename: unknown session");
                false
            }
        }
    }

    /// Flip the pin flag and move the session to the front of its new
    /// partition. Returns the new state, or `None` for an unknown id.
    pub fn toggle_pin(&mut self, id: &SessionId) -> Option<bool> {
        let pinned = self.modify_if(|state| ordering::toggle_pin(&mut state.sessions, id));
        match pinned {
            Some(pinned) => {
                debug!(session_id = %id, pinned, "pin toggled");
                self.writer.schedule();
            }
            None => debug!(session_id = %id, "pin: unknown session"),
        }
        pinned
    }

    /// Evict the oldest unpinned sessions until the list fits the configured
    /// budget, then persist.
    pub fn evict_oldest_unpinned_until_under_budget(&mut self) -> EvictionReport {
        let budget = self.config.eviction_budget_bytes;
        let report = self.modify_if(|state| {
            let (kept, report) = evict_to_budget(mem::take(&mut state.sessions), budget, None);
            state.sessions = kept;
            if let Some(ActiveSession::Persisted { id }) = &state.active
                && report.removed.contains(id)
            {
                state.active = None;
            }
            Some(report)
        });
        self.writer.schedule();
        report.unwrap_or_default()
    }

    // ---- messages -------------------------------------------------------

    /// Append a message to the active session, creating a persisted session
    /// first when none is active.
    pub fn append_message(&mut self, message: NewMessage) -> MessageId {
        let message = message.into_message();
        let id = message.id.clone();
        let default_title = self.config.default_title.clone();
        let max_chars = self.config.title_max_chars;
        let ellipsis = self.config.title_ellipsis.clone();

        let mut persisted = false;
        self.modify(|state| {
            if state.active_session().is_none() {
                let session = ChatSession::new(SessionId::new(), default_title, None);
                state.active = Some(ActiveSession::Persisted {
                    id: session.id.clone(),
                });
                insert_after_pinned(&mut state.sessions, session);
            }
            if let Some((session, in_list)) = active_session_mut(state) {
                session.append(message, max_chars, &ellipsis);
                persisted = in_list;
            }
        });

        if persisted {
            self.writer.schedule();
        }
        id
    }

    /// Append a user message. A transient active session is promoted to a
    /// persisted one first.
    pub fn append_user_message(&mut self, content: impl Into<String>) -> MessageId {
        self.append_user_message_with(NewMessage::user(content))
    }

    /// Like [`append_user_message`](Self::append_user_message) with a full
    /// message builder. The sender is forced to the user.
    pub fn append_user_message_with(&mut self, mut message: NewMessage) -> MessageId {
        message.sender = MessageSender::User;
        self.promote_transient();
        self.append_message(message)
    }

    /// Append an AI answer with an optional presentation hint and citations.
    pub fn append_ai_message(
        &mut self,
        content: impl Into<String>,
        kind: MessageType,
        sources: Vec<SourceMeta>,
    ) -> MessageId {
        self.append_message(NewMessage::ai(content).with_kind(kind).with_sources(sources))
    }

    /// Start a transient session for `agent_mode` whose only message is the
    /// given guidance, flagged as an agent announcement.
    pub fn select_agent_and_announce(
        &mut self,
        content: impl Into<String>,
        agent_mode: AgentMode,
    ) -> SessionId {
        let id = self.create_transient_session(Some(agent_mode));
        self.append_message(NewMessage::ai(content).with_metadata(MessageMetadata::agent_guide()));
        id
    }

    /// [`select_agent_and_announce`](Self::select_agent_and_announce) with
    /// the built-in guidance text of the mode.
    pub fn select_agent(&mut self, agent_mode: AgentMode) -> SessionId {
        self.select_agent_and_announce(agent_mode.announcement(), agent_mode)
    }

    /// Attach a ticket reference to the active session.
    pub fn set_ticket_reference(&mut self, value: impl Into<String>) -> bool {
        self.write_ticket_reference(Some(value.into()))
    }

    /// Remove the ticket reference of the active session.
    pub fn clear_ticket_reference(&mut self) -> bool {
        self.write_ticket_reference(None)
    }

    /// Overwrite the body of the newest message of the active session.
    /// Its timestamp is kept.
    pub fn replace_last_message_content(&mut self, content: impl Into<String>) -> bool {
        let content = content.into();
        let replaced = self
            .modify_active(|session| session.replace_last_content(content).then_some(()))
            .is_some();
        if !replaced {
            debug!("replace: no message to replace");
        }
        replaced
    }

    /// Remove a message of the active session.
    pub fn remove_message(&mut self, id: &MessageId) -> bool {
        let removed = self
            .modify_active(|session| session.remove_message(id).then_some(()))
            .is_some();
        if !removed {
            debug!(message_id = %id, "remove: unknown message");
        }
        removed
    }

    /// Forget the active session. A transient one is discarded.
    pub fn clear_active_session(&mut self) {
        self.modify_if(|state| state.active.take().map(|_| ()));
    }

    // ---- flags ----------------------------------------------------------

    /// Mark an agent reply as in flight (or done).
    pub fn set_ai_responding(&mut self, responding: bool) {
        self.modify_if(|state| {
            if state.is_ai_responding == responding {
                return None;
            }
            state.is_ai_responding = responding;
            Some(())
        });
    }

    /// Set the session-loading flag directly.
    pub fn set_session_loading(&mut self, loading: bool) {
        self.modify_if(|state| {
            if state.is_session_loading == loading {
                return None;
            }
            state.is_session_loading = loading;
            Some(())
        });
    }

    // ---- persistence ----------------------------------------------------

    /// Byte usage of the store and of the session list.
    ///
    /// # Errors
    /// Returns an error if the byte store cannot be read.
    pub fn storage_report(&self) -> ChatResult<StorageReport> {
        let total_bytes = self.storage.backend_used_bytes()?;
        let state = self.state.borrow();
        let report = StorageReport {
            total_bytes,
            sessions_bytes: sessions_size_bytes(&state.sessions),
            session_count: state.sessions.len(),
        };
        drop(state);
        info!(
            total_bytes = report.total_bytes,
            sessions_bytes = report.sessions_bytes,
            sessions = report.session_count,
            "storage report"
        );
        Ok(report)
    }

    /// Write the session list now, cancelling the pending debounced write.
    ///
    /// # Errors
    /// Returns an error if the byte store rejects the write.
    pub fn flush_now(&mut self) -> ChatResult<()> {
        self.writer.flush_now()?;
        Ok(())
    }

    /// React to a host lifecycle signal. Unsaved changes are flushed when
    /// the page is going away; failures are logged.
    pub fn handle_lifecycle(&mut self, event: LifecycleEvent) {
        if !event.requires_flush() || !self.writer.is_dirty() {
            return;
        }
        debug!(?event, "flushing on lifecycle event");
        if let Err(err) = self.flush_now() {
            warn!(?event, error = %err, "lifecycle flush failed");
        }
    }

    /// Flush unsaved changes and cancel pending timers.
    ///
    /// # Errors
    /// Returns an error if the final write fails.
    pub fn close(mut self) -> ChatResult<()> {
        if let Some(reset) = self.loading_reset.take() {
            reset.cancel();
        }
        if self.writer.is_dirty() {
            self.flush_now()?;
        } else {
            self.writer.cancel();
        }
        Ok(())
    }

    // ---- reads ----------------------------------------------------------

    /// Receiver notified after every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    /// Borrow the current state. Do not hold the guard across store calls.
    #[must_use]
    pub fn state(&self) -> watch::Ref<'_, ChatState> {
        self.state.borrow()
    }

    /// Persisted sessions, pinned first.
    #[must_use]
    pub fn sessions(&self) -> Vec<ChatSession> {
        self.state.borrow().sessions.clone()
    }

    /// The active session.
    #[must_use]
    pub fn active_session(&self) -> Option<ChatSession> {
        self.state.borrow().active_session().cloned()
    }

    /// Messages of the active session.
    #[must_use]
    pub fn active_messages(&self) -> Vec<ChatMessage> {
        self.state.borrow().active_messages().to_vec()
    }

    /// Agent mode of the active session.
    #[must_use]
    pub fn active_agent_mode(&self) -> Option<AgentMode> {
        self.state.borrow().active_agent_mode()
    }

    /// Whether an agent reply is in flight.
    #[must_use]
    pub fn is_ai_responding(&self) -> bool {
        self.state.borrow().is_ai_responding
    }

    /// Whether a session switch is settling.
    #[must_use]
    pub fn is_session_loading(&self) -> bool {
        self.state.borrow().is_session_loading
    }

    /// Whether a write is pending or last failed.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.writer.is_dirty()
    }

    /// Store settings.
    #[must_use]
    pub const fn config(&self) -> &ChatStoreConfig {
        &self.config
    }

    // ---- internals ------------------------------------------------------

    fn modify(&self, f: impl FnOnce(&mut ChatState)) {
        self.state.send_modify(f);
    }

    /// Apply `f`; subscribers are notified only when it returns `Some`.
    /// `f` must leave the state untouched when it returns `None`.
    fn modify_if<R>(&self, f: impl FnOnce(&mut ChatState) -> Option<R>) -> Option<R> {
        let mut out = None;
        self.state.send_if_modified(|state| {
            out = f(state);
            out.is_some()
        });
        out
    }

    /// Apply `f` to the active session and persist when it lives in the list.
    fn modify_active<R>(&mut self, f: impl FnOnce(&mut ChatSession) -> Option<R>) -> Option<R> {
        let (result, persisted) = self.modify_if(|state| {
            let (session, persisted) = active_session_mut(state)?;
            f(session).map(|result| (result, persisted))
        })?;
        if persisted {
            self.writer.schedule();
        }
        Some(result)
    }

    fn write_ticket_reference(&mut self, value: Option<String>) -> bool {
        let updated = self
            .modify_active(|session| {
                session.set_ticket_reference(value);
                Some(())
            })
            .is_some();
        if !updated {
            debug!("ticket reference ignored: no active session");
        }
        updated
    }

    /// Move a transient active session into the list under a fresh
    /// persisted id, then run an eviction pass that spares it.
    fn promote_transient(&mut self) -> Option<SessionId> {
        let budget = self.config.eviction_budget_bytes;
        let (id, report) = self.modify_if(|state| match state.active.take() {
            Some(ActiveSession::Transient(mut session)) => {
                session.id = SessionId::new();
                let id = session.id.clone();
                insert_after_pinned(&mut state.sessions, session);
                let (kept, report) =
                    evict_to_budget(mem::take(&mut state.sessions), budget, Some(&id));
                state.sessions = kept;
                state.active = Some(ActiveSession::Persisted { id: id.clone() });
                Some((id, report))
            }
            other => {
                state.active = other;
                None
            }
        })?;

        info!(
            session_id = %id,
            evicted = report.removed.len(),
            "transient session promoted"
        );
        self.writer.schedule();
        Some(id)
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SessionStore")
            .field("namespace", &self.config.namespace)
            .field("sessions", &state.sessions.len())
            .field("active", &state.active_id())
            .field("writer", &self.writer)
            .finish_non_exhaustive()
    }
}

/// Mutable access to the active session and whether it is persisted.
fn active_session_mut(state: &mut ChatState) -> Option<(&mut ChatSession, bool)> {
    let ChatState {
        sessions, active, ..
    } = state;
    match active.as_mut()? {
        ActiveSession::Transient(session) => Some((session, false)),
        ActiveSession::Persisted { id } => {
            let id = &*id;
            sessions
                .iter_mut()
                .find(|session| &session.id == id)
                .map(|session| (session, true))
        }
    }
}

/// Flush function writing the latest session list.
fn session_flush(
    state: Arc<watch::Sender<ChatState>>,
    storage: StorageManager,
    key: String,
) -> FlushFn {
    Arc::new(move || {
        let sessions = state.borrow().sessions.clone();
        save_sessions(&storage, &key, &sessions)?;
        debug!(sessions = sessions.len(), "sessions persisted");
        Ok(())
    })
}
