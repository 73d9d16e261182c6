// File: src/chat/core/ids.rs

//! Identifier types for chat sessions and messages.
//!
//! This module is intentionally **type-heavy** and **logic-light**.
//! Identifiers are string newtypes rather than raw UUIDs because sessions
//! restored from older saves carry ids such as `session_1712345678901` that
//! must round-trip unchanged.
//!
//! Generated ids follow `<prefix><unix millis>_<9 random hex chars>`, which
//! keeps them unique within one process and roughly sortable by creation.

use core::fmt;
use core::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of random hex characters appended to generated ids.
const RANDOM_SUFFIX_LEN: usize = 9;

/// Build `<prefix><millis>_<random>`.
#[must_use]
fn generate(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let random = Uuid::new_v4().simple().to_string();
    let suffix = random.get(..RANDOM_SUFFIX_LEN).unwrap_or(&random);
    format!("{prefix}{millis}_{suffix}")
}

/// Errors returned when parsing an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// Empty (or whitespace-only) identifier.
    Empty,
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "identifier must not be empty"),
        }
    }
}

impl std::error::Error for IdError {}

/// Declare a string id newtype with a consistent API.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident,
        prefix = $prefix:expr
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(String);

        impl Default for $name {
            #[inline]
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            /// Prefix used for generated identifiers.
            pub const PREFIX: &'static str = $prefix;

            /// Create a new identifier.
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(generate(Self::PREFIX))
            }

            /// Borrow as `&str`.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume into `String`.
            #[inline]
            #[must_use]
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            #[inline]
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(IdError::Empty);
                }
                Ok(Self(trimmed.to_owned()))
            }
        }
    };
}

define_string_id!(
    /// Identifier of a chat session.
    ///
    /// Sessions that live in the persisted list use the `session_` prefix.
    SessionId,
    prefix = "session_"
);

impl SessionId {
    /// Prefix used for sessions that have not been promoted yet.
    pub const TRANSIENT_PREFIX: &'static str = "temp_session_";

    /// Create an identifier for a transient session.
    ///
    /// The prefix is cosmetic: whether a session is transient is decided by
    /// [`crate::chat::store::ActiveSession`], never by inspecting the id.
    #[must_use]
    pub fn transient() -> Self {
        Self(generate(Self::TRANSIENT_PREFIX))
    }
}

define_string_id!(
    /// Identifier of a single chat message.
    MessageId,
    prefix = "msg_"
);
