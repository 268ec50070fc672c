//! Configuration module for the murmur service.
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::database::SeedBoundary;

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Mongo,
    Memory,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,

    // MongoDB
    pub mongodb_uri: Option<String>,
    pub mongodb_database: String,

    /// Rows kept by the reset operation.
    pub seed: SeedBoundary,

    /// Messages per history page.
    pub history_page_size: i64,

    /// Maximum messages returned by one fetch.
    pub fetch_limit: i64,

    /// How long author profiles stay cached.
    pub author_cache_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Mongo,
            mongodb_uri: None,
            mongodb_database: "murmur".to_string(),
            seed: SeedBoundary::default(),
            history_page_size: 20,
            fetch_limit: 100,
            author_cache_ttl: Duration::from_secs(300),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns error if a variable is malformed, or if `MONGODB_URI` is
    /// missing while the Mongo backend is selected.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "mongo".to_string())
            .to_lowercase()
            .as_str()
        {
            "mongo" | "mongodb" => StoreBackend::Mongo,
            "memory" => StoreBackend::Memory,
            other => bail!("STORE_BACKEND must be 'mongo' or 'memory', got '{other}'"),
        };

        let mongodb_uri = env::var("MONGODB_URI").ok().filter(|s| !s.is_empty());
        if store_backend == StoreBackend::Mongo && mongodb_uri.is_none() {
            bail!("MONGODB_URI must be set when STORE_BACKEND is mongo");
        }

        let seed = SeedBoundary {
            max_channel_id: parse_var("SEED_MAX_CHANNEL_ID", defaults.seed.max_channel_id)?,
            max_message_id: parse_var("SEED_MAX_MESSAGE_ID", defaults.seed.max_message_id)?,
        };

        let history_page_size = parse_var("HISTORY_PAGE_SIZE", defaults.history_page_size)?;
        let fetch_limit = parse_var("FETCH_LIMIT", defaults.fetch_limit)?;
        if history_page_size <= 0 || fetch_limit <= 0 {
            bail!("HISTORY_PAGE_SIZE and FETCH_LIMIT must be positive");
        }

        let author_cache_ttl = Duration::from_secs(parse_var(
            "AUTHOR_CACHE_TTL_SECS",
            defaults.author_cache_ttl.as_secs(),
        )?);

        Ok(Self {
            store_backend,
            mongodb_uri,
            mongodb_database: env::var("MONGODB_DATABASE").unwrap_or(defaults.mongodb_database),
            seed,
            history_page_size,
            fetch_limit,
            author_cache_ttl,
        })
    }
}

/// Parse an optional numeric variable, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
