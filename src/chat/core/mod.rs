//! Core chat types and identifiers.

pub mod agent_mode;
pub mod config;
pub mod errors;
pub mod ids;
pub mod message;
pub mod session;
pub mod timestamps;

pub use agent_mode::{AgentMode, AgentModeParseError};
pub use config::ChatStoreConfig;
pub use errors::{ChatError, ChatResult, StorageError, StorageResult};
pub use ids::{IdError, MessageId, SessionId};
pub use message::{
    ChatMessage, MessageMetadata, MessageSender, MessageType, NewMessage, SourceMeta,
};
pub use session::{ChatSession, derive_title};
