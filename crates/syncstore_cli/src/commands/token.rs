//! Token command implementation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use std::time::Duration;
use syncstore_server::{IssuedToken, TokenSigner};

/// Mints a token for `uid`.
pub fn mint(uid: u64, secret: &str, ttl: Duration) -> IssuedToken {
    TokenSigner::new(secret.as_bytes(), ttl).issue(uid)
}

/// Runs the token command.
pub fn run(uid: u64, secret: &str, ttl: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let issued = mint(uid, secret, ttl);
    tracing::debug!(uid, expires_ms = issued.payload.expires_ms, "token minted");

    println!("id:      {}", issued.token);
    println!("key:     {}", URL_SAFE_NO_PAD.encode(issued.key.as_slice()));
    println!("uid:     {}", issued.payload.uid);
    println!("expires: {} ms", issued.payload.expires_ms);
    Ok(())
}
