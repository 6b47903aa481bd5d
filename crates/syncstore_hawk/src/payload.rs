//! Request body buffering and the canonical payload hash.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Read};

const PAYLOAD_TAG: &str = "hawk.1.payload";

/// Normalizes a content type for hashing: the part before any `;`,
/// trimmed and lowercased.
#[must_use]
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// SHA-256 over `hawk.1.payload\n<content type>\n<body>\n`.
#[must_use]
pub fn payload_hash(content_type: &str, body: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(PAYLOAD_TAG.as_bytes());
    hasher.update(b"\n");
    hasher.update(normalize_content_type(content_type).as_bytes());
    hasher.update(b"\n");
    hasher.update(body);
    hasher.update(b"\n");
    hasher.finalize().into()
}

/// [`payload_hash`], base64-encoded for the signing string.
#[must_use]
pub fn encoded_payload_hash(content_type: &str, body: &[u8]) -> String {
    STANDARD.encode(payload_hash(content_type, body))
}

/// A single-read request body that can be buffered for hashing and then
/// handed downstream exactly once.
pub struct RequestBody {
    state: BodyState,
}

enum BodyState {
    Unread(Box<dyn Read + Send>),
    Buffered(Vec<u8>),
    Consumed,
}

impl RequestBody {
    /// Wraps a stream that has not been read yet.
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            state: BodyState::Unread(Box::new(reader)),
        }
    }

    /// Wraps bytes already in memory.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            state: BodyState::Buffered(bytes.into()),
        }
    }

    /// An empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_bytes(Vec::new())
    }

    /// Reads the whole stream into memory if needed and returns the bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails or the body was already taken.
    pub fn buffer(&mut self) -> io::Result<&[u8]> {
        if let BodyState::Unread(reader) = &mut self.state {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes)?;
            self.state = BodyState::Buffered(bytes);
        }
        match &self.state {
            BodyState::Buffered(bytes) => Ok(bytes),
            _ => Err(consumed()),
        }
    }

    /// Hands the body to its consumer. Works once.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails or the body was already taken.
    pub fn take(&mut self) -> io::Result<Vec<u8>> {
        match std::mem::replace(&mut self.state, BodyState::Consumed) {
            BodyState::Unread(mut reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
            BodyState::Buffered(bytes) => Ok(bytes),
            BodyState::Consumed => Err(consumed()),
        }
    }

    /// Returns `true` once [`take`](Self::take) has been called.
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        matches!(self.state, BodyState::Consumed)
    }
}

impl Default for RequestBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            BodyState::Unread(_) => "unread".to_string(),
            BodyState::Buffered(bytes) => format!("{} bytes", bytes.len()),
            BodyState::Consumed => "consumed".to_string(),
        };
        f.debug_struct("RequestBody").field("state", &state).finish()
    }
}

fn consumed() -> io::Error {
    io::Error::other("request body already consumed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_payload_hash() {
        assert_eq!(
            encoded_payload_hash("text/plain", b"Thank you for flying Hawk"),
            "Yi9LfIIFRtBEPt74PVmbTF/xVAwPn7ub15ePICfgnuY="
        );
    }

    #[test]
    fn content_type_is_normalized() {
        assert_eq!(
            normalize_content_type(" Application/JSON ; charset=utf-8"),
            "application/json"
        );
        assert_eq!(
            payload_hash("text/plain; charset=utf-8", b"x"),
            payload_hash("TEXT/PLAIN", b"x")
        );
    }

    #[test]
    fn body_replays_exactly_once() {
        let mut body = RequestBody::from_reader(io::Cursor::new(b"hello".to_vec()));
        assert_eq!(body.buffer().unwrap(), b"hello");
        assert_eq!(body.buffer().unwrap(), b"hello");
        assert_eq!(body.take().unwrap(), b"hello");
        assert!(body.is_consumed());
        assert!(body.take().is_err());
        assert!(body.buffer().is_err());
    }

    #[test]
    fn unbuffered_body_can_be_taken() {
        let mut body = RequestBody::from_reader(io::Cursor::new(b"raw".to_vec()));
        assert_eq!(body.take().unwrap(), b"raw");
    }
}
