//! # syncstore hawk
//!
//! Hawk request authentication.
//!
//! A client signs each request with a key it shares with the server; the
//! key never travels on the wire. The server:
//!
//! 1. parses the `Authorization: Hawk id="..", ts="..", nonce="..", mac=".."` header
//! 2. resolves credentials for `id` through a [`CredentialResolver`]
//! 3. verifies the optional payload hash over the buffered body
//! 4. recomputes the MAC over the canonical request string
//! 5. checks the timestamp skew and rejects replayed nonces
//!
//! ```rust
//! use std::sync::Arc;
//! use syncstore_hawk::{
//!     sign_request, AuthConfig, Authenticator, ClientRequest, Credentials, HawkRequest,
//!     ManualClock, RequestBody, ResolverError,
//! };
//!
//! let resolver = |_: &HawkRequest<'_>, id: &str| -> Result<Option<Credentials>, ResolverError> {
//!     Ok((id == "alice").then(|| Credentials::new("alice", b"secret".to_vec(), 7)))
//! };
//! let clock = Arc::new(ManualClock::new(1_700_000_000));
//! let auth = Authenticator::with_clock(AuthConfig::default(), Arc::new(resolver), clock);
//!
//! let creds = Credentials::new("alice", b"secret".to_vec(), 7);
//! let client = ClientRequest { method: "GET", path: "/1.5/7/info/collections", ..Default::default() };
//! let header = sign_request(&creds, &client, 1_700_000_000, "abc123").to_header("Hawk");
//!
//! let request = HawkRequest {
//!     method: "GET",
//!     path: "/1.5/7/info/collections",
//!     content_type: None,
//!     authorization: Some(&header),
//! };
//! let admitted = auth.authenticate(&request, &mut RequestBody::empty())?;
//! assert_eq!(admitted.user_id, 7);
//! # Ok::<(), syncstore_hawk::AuthError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod authenticator;
mod clock;
mod credentials;
mod error;
mod header;
mod payload;
mod replay;
mod signer;

pub use authenticator::{AuthConfig, AuthStage, Authenticator, HawkRequest};
pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::{Algorithm, CredentialResolver, Credentials, ResolverError};
pub use error::{AuthError, AuthResult};
pub use header::AuthParameters;
pub use payload::{encoded_payload_hash, normalize_content_type, payload_hash, RequestBody};
pub use replay::{InMemoryReplayCache, ReplayCache};
pub use signer::{generate_nonce, macs_equal, sign_request, ClientRequest, SigningInput};
