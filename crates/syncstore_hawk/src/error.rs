//! Authentication error types.

use thiserror::Error;

/// Result type for authentication.
pub type AuthResult<T> = Result<T, AuthError>;

/// Reasons a request is not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No `Authorization` header was sent.
    #[error("missing authorization header")]
    MissingHeader,

    /// The header does not use the expected scheme.
    #[error("unsupported authorization scheme")]
    MalformedHeader,

    /// The parameter list could not be parsed or decoded.
    #[error("malformed parameters: {0}")]
    MalformedParameters(String),

    /// Resolved credentials are incomplete or use an unsupported algorithm.
    #[error("malformed credentials")]
    MalformedCredentials,

    /// The resolver knows no credentials for the presented id.
    #[error("credentials not found")]
    CredentialsNotFound,

    /// The resolver itself failed.
    #[error("credential resolver failed: {0}")]
    ResolverFault(String),

    /// The request body could not be read for payload hashing.
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// The MAC or payload hash does not match.
    #[error("signature mismatch")]
    SignatureMismatch,

    /// The timestamp is outside the accepted clock skew.
    #[error("timestamp outside allowed skew")]
    StaleTimestamp,

    /// The (id, nonce) pair was already used.
    #[error("replayed request")]
    ReplayDetected,
}

impl AuthError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedParameters(reason.into())
    }

    /// Returns `true` for unauthorized-class outcomes caused by the request.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` for internal-fault-class outcomes.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ResolverFault(_) | Self::BodyRead(_))
    }

    /// Short stable name of the error kind, for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingHeader => "missing_header",
            Self::MalformedHeader => "malformed_header",
            Self::MalformedParameters(_) => "malformed_parameters",
            Self::MalformedCredentials => "malformed_credentials",
            Self::CredentialsNotFound => "credentials_not_found",
            Self::ResolverFault(_) => "resolver_fault",
            Self::BodyRead(_) => "body_read",
            Self::SignatureMismatch => "signature_mismatch",
            Self::StaleTimestamp => "stale_timestamp",
            Self::ReplayDetected => "replay_detected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(AuthError::SignatureMismatch.is_client_error());
        assert!(AuthError::CredentialsNotFound.is_client_error());
        assert!(AuthError::ResolverFault("down".into()).is_server_error());
        assert!(AuthError::BodyRead("eof".into()).is_server_error());
    }

    #[test]
    fn kinds_are_distinct() {
        assert_ne!(
            AuthError::MissingHeader.kind(),
            AuthError::MalformedHeader.kind()
        );
        assert_eq!(AuthError::malformed("x").kind(), "malformed_parameters");
    }
}
