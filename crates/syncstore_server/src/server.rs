//! Main storage server.

use crate::config::ServerConfig;
use crate::handler::{HandlerContext, RequestHandler};
use crate::http::{Request, Response};
use crate::token::TokenSigner;
use std::sync::Arc;
use syncstore_hawk::Authenticator;

/// The storage server.
///
/// Authenticates each request with Hawk, checks that the credentials belong
/// to the user named in the path and runs the operation against that user's
/// object store. Transport is left to the embedder.
///
/// # Example
///
/// ```
/// use syncstore_server::{Request, ServerConfig, StorageServer};
///
/// let config = ServerConfig::new("/tmp/syncstore-doc").with_shared_secret("secret");
/// let server = StorageServer::new(config);
///
/// let response = server.handle(Request::new("GET", "/version"));
/// assert_eq!(response.status, 200);
/// ```
pub struct StorageServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
    tokens: TokenSigner,
}

impl StorageServer {
    /// Creates a server that accepts tokens minted from the configured
    /// shared secret.
    pub fn new(config: ServerConfig) -> Self {
        let tokens = TokenSigner::new(config.shared_secret.as_bytes(), config.token_ttl());
        let authenticator = Authenticator::new(
            config.auth.to_auth_config(),
            Arc::new(tokens.clone()),
        );
        Self::build(config, authenticator, tokens)
    }

    /// Creates a server with a custom authenticator (other credential
    /// sources, a manual clock, a shared replay cache).
    pub fn with_authenticator(config: ServerConfig, authenticator: Authenticator) -> Self {
        let tokens = TokenSigner::new(config.shared_secret.as_bytes(), config.token_ttl());
        Self::build(config, authenticator, tokens)
    }

    fn build(config: ServerConfig, authenticator: Authenticator, tokens: TokenSigner) -> Self {
        if config.uses_default_secret() {
            tracing::warn!("shared_secret is the built-in default; tokens can be forged by anyone");
        }
        tracing::info!(
            data_root = %config.data_root.display(),
            max_batch = config.max_batch,
            "storage server ready"
        );
        let context = Arc::new(HandlerContext::new(config, authenticator));
        let handler = RequestHandler::new(Arc::clone(&context));
        Self {
            handler,
            context,
            tokens,
        }
    }

    /// Handles one request.
    pub fn handle(&self, request: Request) -> Response {
        self.handler.handle(request)
    }

    /// The signer for tokens this server accepts.
    pub fn token_signer(&self) -> &TokenSigner {
        &self.tokens
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }
}
