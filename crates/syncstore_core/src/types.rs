//! Basic Storage Objects, timestamps and collection metadata.

use crate::error::{StoreError, StoreResult};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// TTL (seconds) given to objects that never specified one; effectively unbounded.
pub const DEFAULT_TTL: u64 = 2_100_000_000;

/// Longest accepted object id.
pub const MAX_ID_LEN: usize = 64;

/// Longest accepted collection name.
pub const MAX_COLLECTION_NAME_LEN: usize = 32;

/// Largest magnitude accepted for a sort index.
const MAX_SORT_INDEX: i64 = 999_999_999;

/// A point in time with hundredths-of-a-second resolution.
///
/// Stored as integer centiseconds since the Unix epoch. Externally it is
/// rendered as fractional seconds with two decimals (`1700000000.25`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The zero timestamp, used when no collection remains.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Creates a timestamp from centiseconds since the epoch.
    #[must_use]
    pub const fn from_centis(centis: u64) -> Self {
        Self(centis)
    }

    /// Returns centiseconds since the epoch.
    #[must_use]
    pub const fn as_centis(self) -> u64 {
        self.0
    }

    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self((millis / 10) as u64)
    }

    /// Converts fractional seconds, rounding to the nearest hundredth.
    ///
    /// Returns `None` for negative or non-finite input.
    #[must_use]
    pub fn from_seconds(seconds: f64) -> Option<Self> {
        if !seconds.is_finite() || seconds < 0.0 {
            return None;
        }
        Some(Self((seconds * 100.0).round() as u64))
    }

    /// Returns the timestamp as fractional seconds.
    #[must_use]
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_seconds())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SecondsVisitor;

        impl Visitor<'_> for SecondsVisitor {
            type Value = Timestamp;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative number of seconds")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Timestamp, E> {
                Timestamp::from_seconds(v)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Float(v), &self))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Timestamp, E> {
                Ok(Timestamp(v.saturating_mul(100)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Timestamp, E> {
                u64::try_from(v)
                    .map(|secs| Timestamp(secs.saturating_mul(100)))
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }
        }

        deserializer.deserialize_any(SecondsVisitor)
    }
}

/// A stored Basic Storage Object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bso {
    /// Identifier, unique within its collection.
    pub id: String,
    /// Last modification time.
    pub modified: Timestamp,
    /// Opaque payload.
    pub payload: String,
    /// Optional ordering hint.
    #[serde(rename = "sortindex", default, skip_serializing_if = "Option::is_none")]
    pub sort_index: Option<i64>,
    /// Time to live, in seconds.
    pub ttl: u64,
}

/// An incoming object write.
///
/// Every field except `id` is optional: an absent field means "keep what is
/// stored" when the object already exists, and a default when it does not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BsoInput {
    /// Identifier. For single-object writes the caller's path wins.
    #[serde(default)]
    pub id: String,
    /// Explicit modification time.
    #[serde(default)]
    pub modified: Option<Timestamp>,
    /// New payload.
    #[serde(default)]
    pub payload: Option<String>,
    /// New sort index.
    #[serde(rename = "sortindex", default)]
    pub sort_index: Option<i64>,
    /// New TTL in seconds.
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl BsoInput {
    /// Creates an input carrying only an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Sets the sort index.
    #[must_use]
    pub fn with_sort_index(mut self, sort_index: i64) -> Self {
        self.sort_index = Some(sort_index);
        self
    }

    /// Sets the TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets an explicit modification time.
    #[must_use]
    pub fn with_modified(mut self, modified: Timestamp) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Checks the id, payload size and sort index range.
    ///
    /// Returns the rejection reason on failure.
    pub fn validate(&self, max_payload_bytes: usize) -> Result<(), String> {
        validate_id(&self.id)?;
        if let Some(payload) = &self.payload {
            if payload.len() > max_payload_bytes {
                return Err(format!(
                    "payload of {} bytes exceeds {} bytes",
                    payload.len(),
                    max_payload_bytes
                ));
            }
        }
        if let Some(sort_index) = self.sort_index {
            if !(-MAX_SORT_INDEX..=MAX_SORT_INDEX).contains(&sort_index) {
                return Err(format!("sortindex {sort_index} out of range"));
            }
        }
        Ok(())
    }

    /// Produces the object to store, merging with the previous version.
    ///
    /// `assigned` overrides the modification time unconditionally (batch
    /// writes); otherwise a supplied time wins, then the previous one, then
    /// `now`.
    pub(crate) fn merge(
        self,
        previous: Option<Bso>,
        assigned: Option<Timestamp>,
        now: Timestamp,
        default_ttl: u64,
    ) -> Bso {
        match previous {
            None => Bso {
                modified: assigned.or(self.modified).unwrap_or(now),
                ttl: self.ttl.unwrap_or(default_ttl),
                payload: self.payload.unwrap_or_default(),
                sort_index: self.sort_index,
                id: self.id,
            },
            Some(prev) => Bso {
                modified: assigned.or(self.modified).unwrap_or(prev.modified),
                ttl: self.ttl.unwrap_or(prev.ttl),
                payload: self.payload.unwrap_or(prev.payload),
                sort_index: self.sort_index.or(prev.sort_index),
                id: self.id,
            },
        }
    }
}

/// Metadata kept for every collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// The collection's watermark.
    pub last_modified: Timestamp,
}

fn validate_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("id is empty".into());
    }
    if id.len() > MAX_ID_LEN {
        return Err(format!("id longer than {MAX_ID_LEN} bytes"));
    }
    if !id
        .bytes()
        .all(|b| (0x20..0x7f).contains(&b) && b != b'/' && b != b',')
    {
        return Err("id contains characters outside printable ASCII or '/' or ','".into());
    }
    Ok(())
}

/// Validates a collection name: 1-32 characters from `[A-Za-z0-9._-]`.
pub fn validate_collection_name(name: &str) -> StoreResult<()> {
    let ok = !name.is_empty()
        && name.len() <= MAX_COLLECTION_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidCollectionName(name.to_string()))
    }
}
