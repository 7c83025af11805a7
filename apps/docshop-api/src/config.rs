//! Process configuration
//!
//! Everything is read once at startup (flags, environment, `.env`) into an
//! immutable [`Config`] that is handed to [`crate::state::AppState`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use analysis_client::{ClientConfig, RetryPolicy};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

/// Command-line interface for the docshop server
#[derive(Parser, Debug)]
#[command(name = "docshop-api")]
#[command(about = "Document upload, cart and payment server")]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run migrations and start the HTTP server (default)
    Serve,
    /// Install or refresh the default per-KB price table
    InitPrices,
    /// Create an account, optionally with staff rights
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long, env = "DOCSHOP_USER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        staff: bool,
    },
    /// Block until the database accepts connections
    WaitForDb {
        #[arg(long, default_value_t = 30)]
        attempts: u32,
    },
}

#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:docshop.db?mode=rwc")]
    pub database_url: String,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub db_max_connections: u32,

    /// Key for session token hashing and flash message signing
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// Accepted Host header values; `*` allows any, `.example.com` allows subdomains
    #[arg(
        long,
        env = "ALLOWED_HOSTS",
        value_delimiter = ',',
        default_value = "localhost,127.0.0.1"
    )]
    pub allowed_hosts: Vec<String>,

    /// Directory uploaded files are stored under
    #[arg(long, env = "MEDIA_ROOT", default_value = "media")]
    pub media_root: PathBuf,

    #[arg(long, env = "ANALYSIS_BASE_URL", default_value = "http://127.0.0.1:8000")]
    pub analysis_base_url: String,

    /// Base URL used instead of the direct one when a token is configured
    #[arg(long, env = "ANALYSIS_PROXY_URL")]
    pub analysis_proxy_url: Option<String>,

    #[arg(long, env = "ANALYSIS_TOKEN", hide_env_values = true)]
    pub analysis_token: Option<String>,

    #[arg(long, env = "ANALYSIS_TIMEOUT_SECS", default_value_t = 30)]
    pub analysis_timeout_secs: u64,

    #[arg(long, env = "ANALYSIS_MAX_RETRIES", default_value_t = 2)]
    pub analysis_max_retries: u32,

    #[arg(long, env = "ANALYSIS_RETRY_BACKOFF_MS", default_value_t = 200)]
    pub analysis_retry_backoff_ms: u64,

    /// Mark cookies `Secure` (serve over HTTPS only)
    #[arg(long, env = "SECURE_COOKIES")]
    pub secure_cookies: bool,
}

impl Config {
    /// Reject settings the server cannot run with and normalize host patterns
    pub fn validated(mut self) -> Result<Self> {
        if self.secret_key.trim().is_empty() {
            bail!("SECRET_KEY must not be empty");
        }
        if self.db_max_connections == 0 {
            bail!("DB_MAX_CONNECTIONS must be at least 1");
        }
        self.allowed_hosts = self
            .allowed_hosts
            .iter()
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Ok(self)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    pub fn analysis_client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.analysis_base_url.clone())
            .with_timeout(Duration::from_secs(self.analysis_timeout_secs))
            .with_retry(RetryPolicy {
                max_retries: self.analysis_max_retries,
                base_delay: Duration::from_millis(self.analysis_retry_backoff_ms),
            });
        if let Some(token) = &self.analysis_token {
            config = config.with_bearer(token.clone(), self.analysis_proxy_url.clone());
        }
        config
    }

    #[cfg(test)]
    pub fn for_tests(media_root: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            secret_key: "test-secret-key".to_string(),
            allowed_hosts: vec!["*".to_string()],
            media_root,
            analysis_base_url: "http://127.0.0.1:9".to_string(),
            analysis_proxy_url: None,
            analysis_token: None,
            analysis_timeout_secs: 1,
            analysis_max_retries: 0,
            analysis_retry_backoff_ms: 1,
            secure_cookies: false,
        }
    }
}
