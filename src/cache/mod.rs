//! Cache module - in-process caches for the chat service.
//!
//! ## Architecture
//!
//! - `ExpiringCache` - Generic key/value map with per-entry expiry behind one
//!   reader/writer lock; supports in-place updates and atomic full replacement
//! - `ChannelCache` - `ExpiringCache` of channel records plus the message count
//!   increment and the rebuild path
//! - `TypedCache` - Bounded Moka cache for lookups that may be evicted freely
//!   (author profiles)
//!
//! ## Usage
//!
//! ```rust
//! let channels = ChannelCache::new();
//! channels.rebuild(store.all_channels().await?);
//!
//! // On every persisted message
//! channels.increment_message_count(channel_id);
//! ```

mod channel;
mod config;
mod expiring;
mod typed;

pub use channel::ChannelCache;
pub use config::CacheConfig;
pub use expiring::ExpiringCache;
pub use typed::TypedCache;
