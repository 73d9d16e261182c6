//! Timestamp helpers shared by messages and sessions.
//!
//! Timestamps are kept at millisecond precision so that a value written to
//! storage and read back compares equal to the in-memory one.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Current time truncated to milliseconds.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Serde adapter: RFC 3339 with milliseconds and a `Z` suffix
/// (`2024-01-01T09:30:00.000Z`). Unix millisecond integers are accepted on
/// input as well.
pub mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{SecondsFormat, format_iso};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Text(String),
        Millis(i64),
    }

    /// Write `value` as an RFC 3339 string with milliseconds.
    ///
    /// # Errors
    /// Returns the serializer's error if the string cannot be written.
    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_iso(value, SecondsFormat::Millis))
    }

    /// Read an RFC 3339 string or a unix millisecond integer.
    ///
    /// # Errors
    /// Returns an error for unparseable text or out-of-range millis.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(D::Error::custom),
            RawTimestamp::Millis(millis) => DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {millis}"))),
        }
    }
}

fn format_iso(value: &DateTime<Utc>, format: SecondsFormat) -> String {
    value.to_rfc3339_opts(format, true)
}
