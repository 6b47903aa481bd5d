//! syncstore CLI
//!
//! Command-line tools for syncstore deployments.
//!
//! # Commands
//!
//! - `inspect` - Display statistics and collections of a user store
//! - `compact` - Rewrite a user store's log as a snapshot
//! - `token` - Mint a token and its Hawk key
//! - `sign` - Build a Hawk `Authorization` header

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use syncstore_server::ServerConfig;
use tracing_subscriber::EnvFilter;

/// syncstore command-line tools.
#[derive(Parser)]
#[command(name = "syncstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Server configuration file (TOML)
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display statistics and collections of a user store
    Inspect {
        /// Data root (defaults to the configured one)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// User id
        #[arg(short, long)]
        uid: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Rewrite a user store's log as a snapshot
    Compact {
        /// Data root (defaults to the configured one)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// User id
        #[arg(short, long)]
        uid: u64,
    },

    /// Mint a token and its Hawk key
    Token {
        /// User id
        #[arg(short, long)]
        uid: u64,

        /// Shared secret (defaults to the configured one)
        #[arg(short, long)]
        secret: Option<String>,

        /// Token lifetime in seconds
        #[arg(short, long)]
        ttl_secs: Option<u64>,
    },

    /// Build a Hawk Authorization header
    Sign {
        /// Hawk id (a token)
        #[arg(long)]
        id: String,

        /// Hawk key, base64 (URL-safe, unpadded)
        #[arg(long)]
        key: String,

        /// Request method
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Request path including the query string
        #[arg(short, long)]
        path: String,

        /// Request body to cover with a payload hash
        #[arg(short, long)]
        body: Option<String>,

        /// Content type of the body
        #[arg(long, default_value = "application/json")]
        content_type: String,

        /// Application-specific data
        #[arg(short, long, default_value = "")]
        ext: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    match cli.command {
        Commands::Inspect { root, uid, format } => {
            let root = root.unwrap_or_else(|| config.data_root.clone());
            commands::inspect::run(&root, uid, &config, &format)?;
        }
        Commands::Compact { root, uid } => {
            let root = root.unwrap_or_else(|| config.data_root.clone());
            commands::compact::run(&root, uid, &config)?;
        }
        Commands::Token {
            uid,
            secret,
            ttl_secs,
        } => {
            let secret = secret.unwrap_or_else(|| config.shared_secret.clone());
            if secret.is_empty() {
                return Err("a shared secret is required (--secret or config file)".into());
            }
            let ttl = ttl_secs.map_or_else(|| config.token_ttl(), Duration::from_secs);
            commands::token::run(uid, &secret, ttl)?;
        }
        Commands::Sign {
            id,
            key,
            method,
            path,
            body,
            content_type,
            ext,
        } => {
            let args = commands::sign::SignArgs {
                id: &id,
                key: &key,
                method: &method,
                path: &path,
                body: body.as_deref().map(|b| (content_type.as_str(), b)),
                ext: &ext,
            };
            println!("{}", commands::sign::run(&args)?);
        }
        Commands::Version => {
            println!("syncstore CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("syncstore core v{}", syncstore_core::VERSION);
        }
    }

    Ok(())
}
