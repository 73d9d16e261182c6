//! Remote agent API: request/response contract, HTTP client and the glue
//! that records answers into a [`SessionStore`].

pub mod browser_id;
pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use browser_id::{
    BROWSER_SESSION_KEY, browser_session_id, current_browser_session_id,
    generate_browser_session_id, reset_browser_session_id,
};
pub use client::AgentClient;
pub use config::AgentClientConfig;
pub use error::{AgentError, AgentResult};
pub use types::{AgentRequest, AgentResponse};

use tracing::warn;

use crate::chat::core::agent_mode::AgentMode;
use crate::chat::core::ids::MessageId;
use crate::chat::core::message::MessageType;
use crate::chat::store::SessionStore;

const FAILURE_MARKDOWN: &str = "## 죄송합니다. 일시적인 오류가 발생했습니다.

현재 AI 서버에 연결할 수 없습니다. 잠시 후 다시 시도해주세요.

**오류 유형**: 네트워크 연결 오류
**해결 방법**:
- 인터넷 연결을 확인해주세요
- 잠시 후 다시 시도해주세요
- 문제가 지속되면 관리자에게 문의해주세요

> 불편을 드려 죄송합니다. 🙏";

const FAILURE_HTML: &str = r#"<div class="inline-block leading-relaxed text-white markdown-content"><h2>죄송합니다. 일시적인 오류가 발생했습니다.</h2>
<p style="white-space: pre-wrap;">현재 AI 서버에 연결할 수 없습니다. 잠시 후 다시 시도해주세요.</p>
<p style="white-space: pre-wrap;"><strong>오류 유형</strong>: 네트워크 연결 오류
<strong>해결 방법</strong>:</p>
<ul>
<li>인터넷 연결을 확인해주세요</li>
<li>잠시 후 다시 시도해주세요</li>
<li>문제가 지속되면 관리자에게 문의해주세요</li>
</ul>
<blockquote>
<p style="white-space: pre-wrap;">불편을 드려 죄송합니다. 🙏</p>
</blockquote></div>"#;

/// Text shown in place of an answer when the agent cannot be reached.
/// The CR agent renders HTML, the others markdown.
#[must_use]
pub const fn failure_notice(mode: Option<AgentMode>) -> &'static str {
    match mode {
        Some(AgentMode::Cr) => FAILURE_HTML,
        _ => FAILURE_MARKDOWN,
    }
}

/// Append an agent answer, with its citations, to the active session.
pub fn record_reply(store: &mut SessionStore, response: &AgentResponse) -> MessageId {
    store.append_ai_message(
        response.result.clone(),
        MessageType::Text,
        response.meta_data.clone(),
    )
}

/// Full question round trip: record the question, query the agent and
/// record the answer, or a failure notice when the query fails.
///
/// `issue_key` is attached to the active session before the query.
/// `fallback_session_id` identifies the conversation when no session is
/// active (normally the browser session id).
///
/// # Errors
/// Returns the query error after the failure notice has been recorded.
pub async fn ask(
    store: &mut SessionStore,
    client: &AgentClient,
    question: &str,
    issue_key: Option<&str>,
    fallback_session_id: &str,
) -> AgentResult<AgentResponse> {
    store.append_user_message(question);
    if let Some(key) = issue_key.map(str::trim).filter(|key| !key.is_empty()) {
        store.set_ticket_reference(key);
    }
    store.set_ai_responding(true);

    let request = AgentRequest::from_state(question, &store.state(), fallback_session_id);
    let outcome = client.query(&request).await;

    match &outcome {
        Ok(response) => {
            record_reply(store, response);
        }
        Err(err) => {
            warn!(error = %err, "agent query failed");
            let notice = failure_notice(store.active_agent_mode());
            store.append_ai_message(notice, MessageType::Text, Vec::new());
        }
    }
    store.set_ai_responding(false);
    outcome
}
