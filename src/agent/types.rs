//! Request and response bodies of the agent query endpoint.

use serde::{Deserialize, Serialize};

use crate::chat::core::agent_mode::AgentMode;
use crate::chat::core::message::SourceMeta;
use crate::chat::store::ChatState;

/// Body of `POST /api/query`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRequest {
    /// The user's question.
    pub question: String,
    /// API agent name (`summary`, `br_cr`, `policy`, `owner`, `default`).
    pub agent_type: String,
    /// Ticket the question is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_key: Option<String>,
    /// Conversation identifier.
    pub session_id: String,
}

impl AgentRequest {
    /// Build a request for `question` in the context of the active session.
    ///
    /// The agent type and issue key come from the active session; the
    /// session id falls back to `fallback_session_id` when nothing is active.
    #[must_use]
    pub fn from_state(
        question: impl Into<String>,
        state: &ChatState,
        fallback_session_id: &str,
    ) -> Self {
        let active = state.active_session();
        Self {
            question: question.into(),
            agent_type: AgentMode::api_name_for(active.and_then(|session| session.agent_mode))
                .to_string(),
            issue_key: active.and_then(|session| session.ticket_reference.clone()),
            session_id: active.map_or_else(
                || fallback_session_id.to_string(),
                |session| session.id.to_string(),
            ),
        }
    }
}

/// Body returned by `POST /api/query`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Agent that answered.
    #[serde(default)]
    pub agent: String,
    /// Ticket the answer is about.
    #[serde(default)]
    pub issue_key: Option<String>,
    /// Citations backing the answer.
    #[serde(default)]
    pub meta_data: Vec<SourceMeta>,
    /// Answer body (markdown or HTML).
    pub result: String,
    /// Server-side status string.
    #[serde(default)]
    pub status: String,
}
