//! Framework-agnostic request and response values.
//!
//! An embedding HTTP server converts its native request into a [`Request`],
//! calls [`StorageServer::handle`](crate::StorageServer::handle) and writes
//! the returned [`Response`] back out.

use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Read;
use syncstore_hawk::RequestBody;

/// `X-Weave-Timestamp`: watermark produced by a write.
pub const HEADER_TIMESTAMP: &str = "X-Weave-Timestamp";
/// `X-Weave-Records`: number of records in a listing.
pub const HEADER_RECORDS: &str = "X-Weave-Records";
/// `X-Weave-Next-Offset`: offset to continue a truncated listing.
pub const HEADER_NEXT_OFFSET: &str = "X-Weave-Next-Offset";

/// An inbound request.
#[derive(Debug)]
pub struct Request {
    method: String,
    target: String,
    headers: BTreeMap<String, String>,
    body: RequestBody,
}

impl Request {
    /// Creates a request for `target` (path, query string and fragment).
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            headers: BTreeMap::new(),
            body: RequestBody::empty(),
        }
    }

    /// Adds a header. Names are case-insensitive.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Sets an in-memory body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = RequestBody::from_bytes(body);
        self
    }

    /// Sets a streamed body, read at most once.
    #[must_use]
    pub fn with_body_reader(mut self, reader: impl Read + Send + 'static) -> Self {
        self.body = RequestBody::from_reader(reader);
        self
    }

    /// The method as received.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Path, query string and fragment, as signed by the client.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The path without query string or fragment.
    #[must_use]
    pub fn path(&self) -> &str {
        let end = self.target.find(|c: char| c == '?' || c == '#').unwrap_or(self.target.len());
        &self.target[..end]
    }

    /// Decoded query parameters. Later duplicates win.
    #[must_use]
    pub fn query(&self) -> BTreeMap<String, String> {
        let without_fragment = self.target.split('#').next().unwrap_or_default();
        let Some((_, query)) = without_fragment.split_once('?') else {
            return BTreeMap::new();
        };
        query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
                (percent_decode(name), percent_decode(value))
            })
            .collect()
    }

    /// A header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub(crate) fn body_mut(&mut self) -> &mut RequestBody {
        &mut self.body
    }
}

/// Decodes `%XX` escapes and `+` as space. Invalid escapes are kept verbatim.
fn percent_decode(input: &str) -> String {
    decode(input, true)
}

/// Percent-decodes one path segment. Unlike the query, `+` stays literal.
pub(crate) fn decode_path_segment(segment: &str) -> String {
    decode(segment, false)
}

fn decode(input: &str, plus_as_space: bool) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' if plus_as_space => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                        continue;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// An outbound response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Headers in insertion order.
    pub headers: Vec<(String, String)>,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl Response {
    /// A JSON response.
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                headers: vec![("Content-Type".into(), "application/json".into())],
                body,
            },
            Err(err) => Self::error(500, &err.to_string()),
        }
    }

    /// A JSON response whose body is already encoded.
    #[must_use]
    pub fn raw_json(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: body.into(),
        }
    }

    /// A plain-text error response.
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "text/plain; charset=utf-8".into())],
            body: message.as_bytes().to_vec(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Looks up a header, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the body is not valid JSON for `T`.
    pub fn json_body<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}
