//! Chat session store: model, policies, storage and persistence.

pub mod core;
pub mod persist;
pub mod policy;
pub mod storage;
pub mod store;

pub use self::core::{
    AgentMode, ChatError, ChatMessage, ChatResult, ChatSession, ChatStoreConfig, MessageId,
    MessageMetadata, MessageSender, MessageType, NewMessage, SessionId, SourceMeta,
};
pub use persist::{ManualScheduler, Scheduler, TokioScheduler};
pub use policy::EvictionReport;
pub use storage::{FileStorage, KeyValueStore, MemoryStorage, StorageManager};
pub use store::{ActiveSession, ChatState, LifecycleEvent, SessionStore, StorageReport};
