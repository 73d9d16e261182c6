//! Chat message model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chat::core::ids::MessageId;
use crate::chat::core::timestamps::{self, iso_millis};

/// Author of a message.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    /// Typed by the user.
    User,
    /// Produced by the remote agent (or canned guidance).
    Ai,
}

impl MessageSender {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
        }
    }
}

impl fmt::Display for MessageSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentation hint for a message body. Informational only.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Plain text.
    #[default]
    Text,
    /// Image attachment.
    Image,
    /// File attachment.
    File,
    /// Source code.
    Code,
    /// Markdown (or HTML fragment) produced by the agent.
    Markdown,
}

/// A citation attached to an AI answer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SourceMeta {
    /// Origin system (e.g. `confluence`, `jira`, `figma`).
    pub source: String,
    /// Document title.
    pub title: String,
    /// Link to the document.
    pub url: String,
}

/// Optional per-message metadata.
///
/// Known fields are typed; anything else the UI attaches is kept verbatim in
/// `extra` so newer clients do not lose data through an older store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    /// Ticket the message refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira_number: Option<String>,
    /// Attached file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Attached file size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Attached file location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// Inline image location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Canned agent guidance: the UI hides copy/source actions for it.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub agent_guide: bool,
    /// Unknown fields, preserved as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageMetadata {
    /// Metadata marking a canned agent announcement.
    #[must_use]
    pub fn agent_guide() -> Self {
        Self {
            agent_guide: true,
            ..Self::default()
        }
    }

    /// Attach a ticket number.
    #[must_use]
    pub fn with_jira_number(mut self, number: impl Into<String>) -> Self {
        self.jira_number = Some(number.into());
        self
    }

    /// Attach file information.
    #[must_use]
    pub fn with_file(mut self, name: impl Into<String>, size: u64, url: Option<String>) -> Self {
        self.file_name = Some(name.into());
        self.file_size = Some(size);
        self.file_url = url;
        self
    }
}

/// A single message inside a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Unique message identifier.
    pub id: MessageId,
    /// Message body, opaque to the store.
    pub content: String,
    /// Author.
    pub sender: MessageSender,
    /// Presentation hint.
    #[serde(rename = "type", default)]
    pub kind: MessageType,
    /// Creation time.
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    /// Optional metadata bag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    /// Citations attached to an AI answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_meta_data: Option<Vec<SourceMeta>>,
}

impl ChatMessage {
    /// Whether the UI should hide per-message actions for this message.
    #[must_use]
    pub fn is_agent_guide(&self) -> bool {
        self.metadata.as_ref().is_some_and(|meta| meta.agent_guide)
    }

    /// Citations, empty when none are attached.
    #[must_use]
    pub fn sources(&self) -> &[SourceMeta] {
        self.source_meta_data.as_deref().unwrap_or_default()
    }
}

/// Input for appending a message; the store assigns id and timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct NewMessage {
    /// Message body.
    pub content: String,
    /// Author.
    pub sender: MessageSender,
    /// Presentation hint.
    pub kind: MessageType,
    /// Optional metadata bag.
    pub metadata: Option<MessageMetadata>,
    /// Optional citations.
    pub source_meta_data: Option<Vec<SourceMeta>>,
}

impl NewMessage {
    /// A plain-text message from `sender`.
    #[must_use]
    pub fn new(sender: MessageSender, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sender,
            kind: MessageType::Text,
            metadata: None,
            source_meta_data: None,
        }
    }

    /// A plain-text user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageSender::User, content)
    }

    /// A plain-text AI message.
    #[must_use]
    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(MessageSender::Ai, content)
    }

    /// Set the presentation hint.
    #[must_use]
    pub const fn with_kind(mut self, kind: MessageType) -> Self {
        self.kind = kind;
        self
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Attach citations. An empty list is stored as "no citations".
    #[must_use]
    pub fn with_sources(mut self, sources: Vec<SourceMeta>) -> Self {
        self.source_meta_data = if sources.is_empty() {
            None
        } else {
            Some(sources)
        };
        self
    }

    /// Materialize the message with a fresh id and the current time.
    #[must_use]
    pub fn into_message(self) -> ChatMessage {
        ChatMessage {
            id: MessageId::new(),
            content: self.content,
            sender: self.sender,
            kind: self.kind,
            timestamp: timestamps::now(),
            metadata: self.metadata,
            source_meta_data: self.source_meta_data,
        }
    }
}
