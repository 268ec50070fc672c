//! Cache configuration.

use std::time::Duration;

/// Configuration for a bounded Moka cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,

    /// Time-to-live for cache entries.
    /// After this duration, entries are automatically evicted.
    pub ttl: Option<Duration>,

    /// Time-to-idle for cache entries.
    /// Entries are evicted if not accessed within this duration.
    pub tti: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(300)), // 5 minutes
            tti: None,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with the given max capacity.
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            max_capacity,
            ..Default::default()
        }
    }

    /// Set time-to-live for cache entries.
    #[must_use]
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.ttl = Some(duration);
        self
    }

    /// Set time-to-idle for cache entries.
    #[must_use]
    pub fn tti(mut self, duration: Duration) -> Self {
        self.tti = Some(duration);
        self
    }

    /// Config for author profiles shown beside messages.
    /// Read on every message render, changed only by profile edits.
    pub fn author_profiles(ttl: Duration) -> Self {
        Self::with_capacity(20_000)
            .ttl(ttl)
            .tti(Duration::from_secs(120)) // 2 minutes idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_profiles_config() {
        let config = CacheConfig::author_profiles(Duration::from_secs(60));
        assert_eq!(config.max_capacity, 20_000);
        assert_eq!(config.ttl, Some(Duration::from_secs(60)));
        assert_eq!(config.tti, Some(Duration::from_secs(120)));
    }
}
