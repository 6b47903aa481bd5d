//! Sign command implementation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use syncstore_hawk::{
    generate_nonce, sign_request, AuthConfig, ClientRequest, Clock, Credentials, SystemClock,
};

/// Inputs for one signature.
pub struct SignArgs<'a> {
    /// Hawk id.
    pub id: &'a str,
    /// Hawk key, URL-safe base64 without padding.
    pub key: &'a str,
    /// Request method.
    pub method: &'a str,
    /// Path and query string.
    pub path: &'a str,
    /// Content type and body, when the payload is covered.
    pub body: Option<(&'a str, &'a str)>,
    /// Application-specific data.
    pub ext: &'a str,
}

/// Builds the `Authorization` header value for `args`, signed now.
pub fn run(args: &SignArgs<'_>) -> Result<String, Box<dyn std::error::Error>> {
    sign_at(args, SystemClock.now(), &generate_nonce())
}

/// Builds the header with an explicit timestamp and nonce.
pub fn sign_at(
    args: &SignArgs<'_>,
    timestamp: i64,
    nonce: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    let key = URL_SAFE_NO_PAD
        .decode(args.key)
        .map_err(|e| format!("key is not URL-safe base64: {e}"))?;
    let credentials = Credentials::new(args.id, key, 0);
    let request = ClientRequest {
        method: args.method,
        path: args.path,
        payload: args.body.map(|(ct, body)| (ct, body.as_bytes())),
        ext: args.ext,
    };
    let params = sign_request(&credentials, &request, timestamp, nonce);
    Ok(params.to_header(&AuthConfig::default().scheme))
}
