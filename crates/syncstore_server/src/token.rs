//! Bearer tokens and the credential resolver built on them.
//!
//! ## Token Format
//!
//! Tokens are composed of:
//! - 8 bytes: user id (big-endian)
//! - 8 bytes: expiry (Unix millis, big-endian)
//! - 16 bytes: random salt
//! - 32 bytes: HMAC-SHA256 over the previous fields under the shared secret
//!
//! Total: 64 bytes, URL-safe base64 (no padding) for transport. The token is
//! the Hawk key identifier; the matching signing key is derived from it with
//! HKDF-SHA256 (salt = token salt, info = `syncstore/derive/<token>`), so the
//! server needs nothing but the shared secret to authenticate any user.

use crate::error::{ServerError, ServerResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use syncstore_hawk::{CredentialResolver, Credentials, HawkRequest, ResolverError};
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_LEN: usize = 64;
const SIGNED_LEN: usize = 32;
const DERIVE_INFO: &str = "syncstore/derive/";

/// Fields carried by a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPayload {
    /// User the token was issued to.
    pub uid: u64,
    /// Expiry, Unix millis.
    pub expires_ms: u64,
    /// Per-token salt.
    pub salt: [u8; 16],
}

/// A freshly issued token and the signing key that goes with it.
#[derive(Clone)]
pub struct IssuedToken {
    /// The token (Hawk key identifier).
    pub token: String,
    /// The derived signing key.
    pub key: Zeroizing<Vec<u8>>,
    /// Verified contents.
    pub payload: TokenPayload,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &self.token)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// Issues and verifies tokens under a shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Zeroizing<Vec<u8>>,
    ttl: Duration,
}

impl TokenSigner {
    /// Creates a signer.
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
            ttl,
        }
    }

    /// Issues a token for `uid`, valid for the configured lifetime.
    #[must_use]
    pub fn issue(&self, uid: u64) -> IssuedToken {
        self.issue_at(uid, now_ms())
    }

    /// Issues a token as if the current time were `now_ms`.
    #[must_use]
    pub fn issue_at(&self, uid: u64, now_ms: u64) -> IssuedToken {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let expires_ms = now_ms.saturating_add(self.ttl.as_millis() as u64);

        let mut data = Vec::with_capacity(TOKEN_LEN);
        data.extend_from_slice(&uid.to_be_bytes());
        data.extend_from_slice(&expires_ms.to_be_bytes());
        data.extend_from_slice(&salt);
        let signature = self.sign(&data);
        data.extend_from_slice(&signature);

        let token = URL_SAFE_NO_PAD.encode(&data);
        let key = self.derive_key(&token, &salt);
        IssuedToken {
            token,
            key,
            payload: TokenPayload {
                uid,
                expires_ms,
                salt,
            },
        }
    }

    /// Verifies signature and expiry.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidToken`] describing the first failed check.
    pub fn verify(&self, token: &str) -> ServerResult<TokenPayload> {
        self.verify_at(token, now_ms())
    }

    /// Verifies a token as if the current time were `now_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidToken`] describing the first failed check.
    pub fn verify_at(&self, token: &str, now_ms: u64) -> ServerResult<TokenPayload> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| ServerError::InvalidToken("not base64".into()))?;
        if bytes.len() != TOKEN_LEN {
            return Err(ServerError::InvalidToken("invalid token length".into()));
        }

        let (data, signature) = bytes.split_at(SIGNED_LEN);
        let expected = self.sign(data);
        if !bool::from(expected.ct_eq(signature)) {
            return Err(ServerError::InvalidToken("invalid signature".into()));
        }

        let mut uid = [0u8; 8];
        let mut expires = [0u8; 8];
        let mut salt = [0u8; 16];
        uid.copy_from_slice(&data[0..8]);
        expires.copy_from_slice(&data[8..16]);
        salt.copy_from_slice(&data[16..32]);

        let payload = TokenPayload {
            uid: u64::from_be_bytes(uid),
            expires_ms: u64::from_be_bytes(expires),
            salt,
        };
        if now_ms > payload.expires_ms {
            return Err(ServerError::InvalidToken("token expired".into()));
        }
        Ok(payload)
    }

    /// Derives the signing key for a token.
    #[must_use]
    pub fn derive_key(&self, token: &str, salt: &[u8; 16]) -> Zeroizing<Vec<u8>> {
        let hkdf = Hkdf::<Sha256>::new(Some(&salt[..]), &self.secret);
        let info = format!("{DERIVE_INFO}{token}");
        let mut key = Zeroizing::new(vec![0u8; 32]);
        // 32 bytes is far below the HKDF-SHA256 output limit.
        if hkdf.expand(info.as_bytes(), &mut key).is_err() {
            key.clear();
        }
        key
    }

    fn sign(&self, data: &[u8]) -> [u8; 32] {
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => return [0u8; 32],
        };
        mac.update(data);
        mac.finalize().into_bytes().into()
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CredentialResolver for TokenSigner {
    fn resolve(
        &self,
        _request: &HawkRequest<'_>,
        key_id: &str,
    ) -> Result<Option<Credentials>, ResolverError> {
        match self.verify(key_id) {
            Ok(payload) => {
                let key = self.derive_key(key_id, &payload.salt);
                Ok(Some(Credentials::new(key_id, key.to_vec(), payload.uid)))
            }
            Err(err) => {
                tracing::debug!(error = %err, "token rejected");
                Ok(None)
            }
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
