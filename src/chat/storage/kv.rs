//! Key-value byte store abstraction.
//!
//! Mirrors the contract of browser `localStorage`: string keys, string
//! values, a capacity limit, and size accounting at two bytes per UTF-16
//! code unit.

use crate::chat::core::errors::StorageResult;

/// Bytes occupied by `text` when stored as UTF-16.
#[must_use]
pub fn utf16_bytes(text: &str) -> usize {
    text.encode_utf16().count() * 2
}

/// Synchronous string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error if the backend rejects the write (e.g. quota).
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete a value. Deleting a missing key is not an error.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// List every key.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read.
    fn keys(&self) -> StorageResult<Vec<String>>;

    /// Total bytes used by all keys and values.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read.
    fn used_bytes(&self) -> StorageResult<usize> {
        let mut total = 0;
        for key in self.keys()? {
            if let Some(value) = self.get(&key)? {
                total += utf16_bytes(&key) + utf16_bytes(&value);
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf16_bytes() {
        assert_eq!(utf16_bytes(""), 0);
        assert_eq!(utf16_bytes("abc"), 6);
        // BMP Hangul: one code unit per char.
        assert_eq!(utf16_bytes("대화"), 4);
        // Astral plane: surrogate pair.
        assert_eq!(utf16_bytes("😀"), 4);
    }
}
