//! Error types for the storage server.

use syncstore_core::StoreError;
use syncstore_hawk::AuthError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while serving a request.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format (bad JSON, bad query, oversized batch).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    Unauthorized(#[from] AuthError),

    /// The authenticated user may not access the addressed user.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// No route matches the path.
    #[error("no such resource: {0}")]
    RouteNotFound(String),

    /// The route exists but not for this method.
    #[error("method {method} not allowed")]
    MethodNotAllowed {
        /// The rejected method.
        method: String,
        /// Methods the route accepts.
        allowed: &'static [&'static str],
    },

    /// A token could not be verified.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// HTTP status code for this error.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::Unauthorized(auth) if auth.is_server_error() => 500,
            Self::Unauthorized(_) | Self::InvalidToken(_) => 401,
            Self::Forbidden(_) => 403,
            Self::RouteNotFound(_) => 404,
            Self::MethodNotAllowed { .. } => 405,
            Self::Store(store) if store.is_not_found() => 404,
            Self::Store(store) if store.is_client_error() => 400,
            Self::Store(_) | Self::Config(_) | Self::Internal(_) | Self::Io(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Returns true if this is a server error (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status() >= 500
    }
}
