//! # syncstore server
//!
//! Storage server for per-user BSO collections.
//!
//! This crate provides:
//! - Routing for the `/1.5/{uid}/...` storage API
//! - Hawk authentication against tokens minted from a shared secret
//! - One [`ObjectStore`](syncstore_core::ObjectStore) directory per user
//! - Framework-agnostic [`Request`] and [`Response`] values
//!
//! # Tokens
//!
//! ```rust
//! use std::time::Duration;
//! use syncstore_server::TokenSigner;
//!
//! let signer = TokenSigner::new(b"shared-secret".to_vec(), Duration::from_secs(3600));
//! let issued = signer.issue(42);
//! assert_eq!(signer.verify(&issued.token).unwrap().uid, 42);
//! ```
//!
//! The client signs requests with `issued.token` as the Hawk id and
//! `issued.key` as the Hawk key.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod http;
mod routes;
mod server;
mod token;

pub use config::{AuthSettings, ServerConfig, DEFAULT_SHARED_SECRET};
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use http::{Request, Response, HEADER_NEXT_OFFSET, HEADER_RECORDS, HEADER_TIMESTAMP};
pub use routes::Route;
pub use server::StorageServer;
pub use token::{IssuedToken, TokenPayload, TokenSigner};
