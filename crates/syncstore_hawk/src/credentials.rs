//! Credentials and their resolution.

use crate::error::{AuthError, AuthResult};
use crate::HawkRequest;
use std::fmt;
use zeroize::Zeroizing;

/// MAC algorithms. Only SHA-256 is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// HMAC-SHA256.
    Sha256,
}

impl Algorithm {
    /// Looks up an algorithm by its wire name (`"sha256"`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }

    /// The wire name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

/// Signing credentials for one key identifier.
///
/// The key is wiped from memory when the credentials are dropped.
#[derive(Clone)]
pub struct Credentials {
    /// Key identifier presented by the client.
    pub key_id: String,
    /// Shared signing key.
    pub key: Zeroizing<Vec<u8>>,
    /// Algorithm name as reported by the resolver.
    pub algorithm: String,
    /// The user these credentials belong to.
    pub user_id: u64,
}

impl Credentials {
    /// Creates SHA-256 credentials.
    pub fn new(key_id: impl Into<String>, key: impl Into<Vec<u8>>, user_id: u64) -> Self {
        Self {
            key_id: key_id.into(),
            key: Zeroizing::new(key.into()),
            algorithm: Algorithm::Sha256.name().to_owned(),
            user_id,
        }
    }

    /// Checks that id and key are non-empty and the algorithm is supported.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedCredentials`] otherwise.
    pub fn validate(&self) -> AuthResult<Algorithm> {
        if self.key_id.is_empty() || self.key.is_empty() {
            return Err(AuthError::MalformedCredentials);
        }
        Algorithm::from_name(&self.algorithm).ok_or(AuthError::MalformedCredentials)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("key", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Failure inside a credential resolver (as opposed to "not found").
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ResolverError(pub String);

/// Looks up credentials for a key identifier.
///
/// `Ok(None)` means the identifier is unknown and the request is
/// unauthorized; `Err` means the lookup itself failed.
pub trait CredentialResolver: Send + Sync {
    /// Resolves `key_id` in the context of `request`.
    fn resolve(
        &self,
        request: &HawkRequest<'_>,
        key_id: &str,
    ) -> Result<Option<Credentials>, ResolverError>;
}

impl<F> CredentialResolver for F
where
    F: Fn(&HawkRequest<'_>, &str) -> Result<Option<Credentials>, ResolverError> + Send + Sync,
{
    fn resolve(
        &self,
        request: &HawkRequest<'_>,
        key_id: &str,
    ) -> Result<Option<Credentials>, ResolverError> {
        self(request, key_id)
    }
}
