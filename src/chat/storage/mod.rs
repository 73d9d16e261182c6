//! Byte stores and session list persistence.

pub mod codec;
pub mod file;
pub mod kv;
pub mod manager;
pub mod memory;

pub use codec::{restore_sessions, save_sessions, session_size_bytes, sessions_size_bytes};
pub use file::FileStorage;
pub use kv::{KeyValueStore, utf16_bytes};
pub use manager::{NamespaceInfo, StorageEnvelope, StorageManager};
pub use memory::{BROWSER_QUOTA_BYTES, MemoryStorage};
