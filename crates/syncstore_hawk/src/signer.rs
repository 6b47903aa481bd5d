//! Canonical signing string and request MAC.

use crate::credentials::Credentials;
use crate::header::AuthParameters;
use crate::payload::payload_hash;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const HEADER_TAG: &str = "hawk.1.header";

/// Everything the request MAC covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningInput<'a> {
    /// Client timestamp in seconds.
    pub timestamp: i64,
    /// Nonce.
    pub nonce: &'a str,
    /// HTTP method, case preserved.
    pub method: &'a str,
    /// Path with query string and fragment.
    pub path: &'a str,
    /// Base64 payload hash, or empty when the body is not authenticated.
    pub payload_hash: &'a str,
    /// Extension data, or empty.
    pub ext: &'a str,
}

impl SigningInput<'_> {
    /// Builds the newline-terminated canonical string.
    #[must_use]
    pub fn normalized(&self) -> String {
        format!(
            "{HEADER_TAG}\n{}\n{}\n{}\n{}\n{}\n{}\n",
            self.timestamp, self.nonce, self.method, self.path, self.payload_hash, self.ext
        )
    }

    /// HMAC-SHA256 of the canonical string under `key`.
    #[must_use]
    pub fn mac(&self, key: &[u8]) -> Vec<u8> {
        // HMAC accepts keys of any length.
        let mut mac = match HmacSha256::new_from_slice(key) {
            Ok(mac) => mac,
            Err(_) => return Vec::new(),
        };
        mac.update(self.normalized().as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

/// Constant-time equality for MACs and hashes.
#[must_use]
pub fn macs_equal(expected: &[u8], presented: &[u8]) -> bool {
    expected.ct_eq(presented).into()
}

/// Generates a random alphanumeric nonce.
#[must_use]
pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}

/// Request details a client signs.
#[derive(Debug, Clone, Default)]
pub struct ClientRequest<'a> {
    /// HTTP method.
    pub method: &'a str,
    /// Path with query string.
    pub path: &'a str,
    /// Content type and body, when the body should be authenticated.
    pub payload: Option<(&'a str, &'a [u8])>,
    /// Extension data.
    pub ext: &'a str,
}

/// Produces the parameters of a signed header for `request`.
///
/// Mirrors what the authenticator verifies, so tests and tooling can build
/// valid requests.
#[must_use]
pub fn sign_request(
    credentials: &Credentials,
    request: &ClientRequest<'_>,
    timestamp: i64,
    nonce: &str,
) -> AuthParameters {
    let hash = request
        .payload
        .map(|(content_type, body)| payload_hash(content_type, body).to_vec());
    let encoded_hash = hash.as_deref().map(|h| STANDARD.encode(h)).unwrap_or_default();

    let mac = SigningInput {
        timestamp,
        nonce,
        method: request.method,
        path: request.path,
        payload_hash: &encoded_hash,
        ext: request.ext,
    }
    .mac(&credentials.key);

    AuthParameters {
        id: credentials.key_id.clone(),
        timestamp,
        nonce: nonce.to_owned(),
        ext: request.ext.to_owned(),
        hash,
        mac,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> SigningInput<'static> {
        SigningInput {
            timestamp: 1_353_832_234,
            nonce: "j4h3g2",
            method: "POST",
            path: "/resource/1?b=1&a=2",
            payload_hash: "Yi9LfIIFRtBEPt74PVmbTF/xVAwPn7ub15ePICfgnuY=",
            ext: "some-app-ext-data",
        }
    }

    #[test]
    fn normalized_string_layout() {
        assert_eq!(
            input().normalized(),
            "hawk.1.header\n1353832234\nj4h3g2\nPOST\n/resource/1?b=1&a=2\n\
             Yi9LfIIFRtBEPt74PVmbTF/xVAwPn7ub15ePICfgnuY=\nsome-app-ext-data\n"
        );
    }

    #[test]
    fn empty_fields_keep_their_lines() {
        let input = SigningInput {
            payload_hash: "",
            ext: "",
            ..input()
        };
        assert!(input.normalized().ends_with("/resource/1?b=1&a=2\n\n\n"));
    }

    #[test]
    fn mac_is_deterministic() {
        let key = b"werxhqb98rpaxn39848xrunpaw3489ruxnpa98w4rxn";
        assert_eq!(input().mac(key), input().mac(key));
        assert_eq!(input().mac(key).len(), 32);
        assert_ne!(input().mac(key), input().mac(b"other"));
    }

    #[test]
    fn constant_time_compare() {
        assert!(macs_equal(b"abc", b"abc"));
        assert!(!macs_equal(b"abc", b"abd"));
        assert!(!macs_equal(b"abc", b"ab"));
    }

    #[test]
    fn nonces_differ() {
        assert_ne!(generate_nonce(), generate_nonce());
        assert_eq!(generate_nonce().len(), 8);
    }

    #[test]
    fn signed_request_carries_hash_only_with_payload() {
        let creds = Credentials::new("id", b"key".to_vec(), 1);
        let bare = sign_request(
            &creds,
            &ClientRequest {
                method: "GET",
                path: "/x",
                ..ClientRequest::default()
            },
            10,
            "n",
        );
        assert!(bare.hash.is_none());

        let with_body = sign_request(
            &creds,
            &ClientRequest {
                method: "POST",
                path: "/x",
                payload: Some(("application/json", b"{}")),
                ext: "",
            },
            10,
            "n",
        );
        assert_eq!(with_body.hash.as_ref().map(Vec::len), Some(32));
        assert_ne!(bare.mac, with_body.mac);
    }
}
