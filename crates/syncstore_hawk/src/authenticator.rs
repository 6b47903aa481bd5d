//! The request authenticator.

use crate::clock::{Clock, SystemClock};
use crate::credentials::{CredentialResolver, Credentials};
use crate::error::{AuthError, AuthResult};
use crate::header::AuthParameters;
use crate::payload::{payload_hash, RequestBody};
use crate::replay::{InMemoryReplayCache, ReplayCache};
use crate::signer::{macs_equal, SigningInput};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;
use std::sync::Arc;

/// Authenticator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Expected scheme token, matched case-sensitively.
    pub scheme: String,
    /// Accepted clock skew in seconds, either direction.
    pub skew_secs: i64,
    /// Minimum seconds between replay cache sweeps.
    pub sweep_interval_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            scheme: "Hawk".to_string(),
            skew_secs: 60,
            sweep_interval_secs: 30,
        }
    }
}

impl AuthConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scheme token.
    #[must_use]
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Sets the accepted clock skew.
    #[must_use]
    pub fn with_skew_secs(mut self, secs: i64) -> Self {
        self.skew_secs = secs;
        self
    }

    /// Sets the replay sweep interval.
    #[must_use]
    pub fn with_sweep_interval_secs(mut self, secs: i64) -> Self {
        self.sweep_interval_secs = secs;
        self
    }
}

/// The parts of an HTTP request the authenticator looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HawkRequest<'a> {
    /// HTTP method as received.
    pub method: &'a str,
    /// Path including query string and fragment.
    pub path: &'a str,
    /// `Content-Type` header, if any.
    pub content_type: Option<&'a str>,
    /// `Authorization` header, if any.
    pub authorization: Option<&'a str>,
}

/// Progress of one authentication attempt, reported when it is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    /// Nothing checked yet.
    NoHeader,
    /// Header parsed.
    Parsed,
    /// Credentials resolved and validated.
    CredentialsResolved,
    /// Payload hash verified (or not requested).
    PayloadHashed,
    /// MAC verified.
    SignatureChecked,
    /// Timestamp and nonce accepted.
    ReplayChecked,
    /// Request admitted.
    Admitted,
}

impl fmt::Display for AuthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoHeader => "no_header",
            Self::Parsed => "parsed",
            Self::CredentialsResolved => "credentials_resolved",
            Self::PayloadHashed => "payload_hashed",
            Self::SignatureChecked => "signature_checked",
            Self::ReplayChecked => "replay_checked",
            Self::Admitted => "admitted",
        };
        f.write_str(name)
    }
}

/// Admits or rejects requests.
///
/// Steps run strictly in order and the first failure ends the attempt:
/// parse the header, resolve and validate credentials, verify the payload
/// hash when one is presented, verify the MAC, check the timestamp, and
/// consult the replay cache. On admission the nonce is recorded, so an
/// identical second request is rejected even if the caller's operation
/// afterwards fails.
pub struct Authenticator {
    config: AuthConfig,
    resolver: Arc<dyn CredentialResolver>,
    replay: Arc<dyn ReplayCache>,
    clock: Arc<dyn Clock>,
}

impl Authenticator {
    /// Creates an authenticator using the system clock and an in-memory
    /// replay cache.
    pub fn new(config: AuthConfig, resolver: Arc<dyn CredentialResolver>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::with_clock(config, resolver, clock)
    }

    /// Like [`new`](Self::new) with an explicit clock for both the skew check
    /// and the replay cache.
    pub fn with_clock(
        config: AuthConfig,
        resolver: Arc<dyn CredentialResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let replay = Arc::new(InMemoryReplayCache::new(
            config.skew_secs,
            config.sweep_interval_secs,
            Arc::clone(&clock),
        ));
        Self {
            config,
            resolver,
            replay,
            clock,
        }
    }

    /// Replaces the replay cache.
    #[must_use]
    pub fn with_replay_cache(mut self, replay: Arc<dyn ReplayCache>) -> Self {
        self.replay = replay;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authenticates `request`, buffering `body` when a payload hash is
    /// presented so it can still be taken afterwards.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] of the first failing step.
    pub fn authenticate(
        &self,
        request: &HawkRequest<'_>,
        body: &mut RequestBody,
    ) -> AuthResult<Credentials> {
        let mut stage = AuthStage::NoHeader;
        let result = self.run(request, body, &mut stage);
        match &result {
            Ok(credentials) => {
                tracing::debug!(
                    key_id = %credentials.key_id,
                    user_id = credentials.user_id,
                    %stage,
                    "request admitted"
                );
            }
            Err(err) if err.is_server_error() => {
                tracing::error!(%stage, kind = err.kind(), error = %err, "authentication fault");
            }
            Err(err) => {
                tracing::info!(%stage, kind = err.kind(), method = request.method, path = request.path, "request rejected");
            }
        }
        result
    }

    fn run(
        &self,
        request: &HawkRequest<'_>,
        body: &mut RequestBody,
        stage: &mut AuthStage,
    ) -> AuthResult<Credentials> {
        let header = request.authorization.ok_or(AuthError::MissingHeader)?;
        let params = AuthParameters::from_header(header, &self.config.scheme)?;
        *stage = AuthStage::Parsed;

        let credentials = self
            .resolver
            .resolve(request, &params.id)
            .map_err(|e| AuthError::ResolverFault(e.to_string()))?
            .ok_or(AuthError::CredentialsNotFound)?;
        credentials.validate()?;
        *stage = AuthStage::CredentialsResolved;

        let encoded_hash = match &params.hash {
            Some(presented) => {
                let bytes = body.buffer().map_err(|e| AuthError::BodyRead(e.to_string()))?;
                let computed = payload_hash(request.content_type.unwrap_or_default(), bytes);
                if !macs_equal(&computed, presented) {
                    return Err(AuthError::SignatureMismatch);
                }
                STANDARD.encode(computed)
            }
            None => String::new(),
        };
        *stage = AuthStage::PayloadHashed;

        let expected = SigningInput {
            timestamp: params.timestamp,
            nonce: &params.nonce,
            method: request.method,
            path: request.path,
            payload_hash: &encoded_hash,
            ext: &params.ext,
        }
        .mac(&credentials.key);
        if !macs_equal(&expected, &params.mac) {
            return Err(AuthError::SignatureMismatch);
        }
        *stage = AuthStage::SignatureChecked;

        let now = self.clock.now();
        if now.abs_diff(params.timestamp) > self.config.skew_secs.unsigned_abs() {
            return Err(AuthError::StaleTimestamp);
        }
        if !self
            .replay
            .check_and_record(&params.id, &params.nonce, params.timestamp)
        {
            return Err(AuthError::ReplayDetected);
        }
        *stage = AuthStage::ReplayChecked;

        *stage = AuthStage::Admitted;
        Ok(credentials)
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
