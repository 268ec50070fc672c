//! Murmur - chat service core
//!
//! Channel metadata cache, message ingestion and unread tracking.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - Store boundary with MongoDB and in-memory backends
//! - `cache` - Expiring channel cache and Moka-backed lookup caches
//! - `services` - Chat operations (post, fetch, unread, history, reset)
//! - `app` - State wiring and the command runner

mod app;
mod cache;
mod config;
mod database;
mod services;

use tracing::info;
use tracing_subscriber::EnvFilter;

use app::{AppState, Command};
use config::Config;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate.
    // Logs go to stderr; stdout carries command output.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("murmur=info,mongodb=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let command = Command::parse(std::env::args().skip(1))?;

    let config = Config::from_env()?;
    info!("Configuration loaded, store backend: {:?}", config.store_backend);

    let state = AppState::connect(&config).await?;
    let result = app::run(&state, command).await;

    state.shutdown().await;
    result
}
