//! Server configuration.

use crate::error::{ServerError, ServerResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use syncstore_core::StoreConfig;
use syncstore_hawk::AuthConfig;

/// Secret used when none is configured. Publicly known: replace it in any
/// real deployment.
pub const DEFAULT_SHARED_SECRET: &str = "cheesebaconeggs";

/// Authentication settings as they appear in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Accepted clock skew in seconds.
    pub skew_secs: i64,
    /// Minimum seconds between replay cache sweeps.
    pub sweep_interval_secs: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        let defaults = AuthConfig::default();
        Self {
            skew_secs: defaults.skew_secs,
            sweep_interval_secs: defaults.sweep_interval_secs,
        }
    }
}

impl AuthSettings {
    /// Converts into the authenticator's configuration.
    #[must_use]
    pub fn to_auth_config(&self) -> AuthConfig {
        AuthConfig::default()
            .with_skew_secs(self.skew_secs)
            .with_sweep_interval_secs(self.sweep_interval_secs)
    }
}

/// Configuration for the storage server.
///
/// Loadable from TOML; every field has a default:
///
/// ```toml
/// data_root = "/var/lib/syncstore"
/// shared_secret = "change me"
/// token_ttl_secs = 3600
///
/// [auth]
/// skew_secs = 60
///
/// [store]
/// max_list_limit = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory holding one store directory per user.
    pub data_root: PathBuf,
    /// Secret shared with the token issuer.
    pub shared_secret: String,
    /// Lifetime of issued tokens, in seconds.
    pub token_ttl_secs: u64,
    /// Maximum number of objects in one batch write.
    pub max_batch: usize,
    /// Authentication settings.
    pub auth: AuthSettings,
    /// Settings applied to every opened user store.
    pub store: StoreConfig,
}

impl ServerConfig {
    /// Creates a configuration rooted at `data_root`.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            shared_secret: DEFAULT_SHARED_SECRET.to_string(),
            token_ttl_secs: 3600,
            max_batch: 100,
            auth: AuthSettings::default(),
            store: StoreConfig::default(),
        }
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the document is invalid.
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Whether the shared secret is still the built-in default.
    #[must_use]
    pub fn uses_default_secret(&self) -> bool {
        self.shared_secret == DEFAULT_SHARED_SECRET
    }

    /// Sets the shared token secret.
    #[must_use]
    pub fn with_shared_secret(mut self, secret: impl Into<String>) -> Self {
        self.shared_secret = secret.into();
        self
    }

    /// Sets the token lifetime.
    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl_secs = ttl.as_secs();
        self
    }

    /// Sets the maximum batch size.
    #[must_use]
    pub fn with_max_batch(mut self, max: usize) -> Self {
        self.max_batch = max;
        self
    }

    /// Sets the store configuration.
    #[must_use]
    pub fn with_store_config(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Token lifetime as a duration.
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("/tmp/syncstore")
    }
}
