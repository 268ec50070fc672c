//! Channel metadata cache.
//!
//! Holds every channel record in memory so channel listings and unread
//! computation never query storage for per-channel totals. Message counts are
//! bumped in place on every post and resynchronized only by `rebuild`.

use tracing::{debug, info};

use super::ExpiringCache;
use crate::database::ChannelRecord;

/// Cache of channel records keyed by channel ID.
///
/// Entries never expire during normal operation. Cloning is cheap and shares
/// the same underlying map.
#[derive(Clone, Debug)]
pub struct ChannelCache {
    inner: ExpiringCache<i64, ChannelRecord>,
}

impl ChannelCache {
    pub fn new() -> Self {
        Self {
            inner: ExpiringCache::new("channels"),
        }
    }

    /// Get a copy of a channel record.
    pub fn get(&self, channel_id: i64) -> Option<ChannelRecord> {
        self.inner.get(&channel_id)
    }

    /// Snapshot of all channels, order unspecified.
    pub fn list_all(&self) -> Vec<ChannelRecord> {
        self.inner.list_all()
    }

    /// Snapshot of all channels ordered by ID.
    pub fn list_sorted(&self) -> Vec<ChannelRecord> {
        let mut channels = self.inner.list_all();
        channels.sort_unstable_by_key(|c| c.id);
        channels
    }

    /// Cache a newly created channel.
    pub fn insert(&self, record: ChannelRecord) {
        debug!("Caching channel {} ({})", record.id, record.name);
        self.inner.set(record.id, record, None);
    }

    /// Add one to a channel's message count.
    ///
    /// The read and the write share one exclusive critical section, so N
    /// concurrent calls advance the count by exactly N. Returns `false` and
    /// changes nothing if the channel is not cached; the next `rebuild`
    /// reconciles the count.
    pub fn increment_message_count(&self, channel_id: i64) -> bool {
        self.inner.update(&channel_id, |record| {
            record.message_count = record.message_count.saturating_add(1);
        })
    }

    /// Replace the whole cache with an authoritative set of records.
    ///
    /// Callers load `records` from storage before calling; if that load fails
    /// they never get here and the previous contents stay in place.
    pub fn rebuild(&self, records: Vec<ChannelRecord>) {
        let count = records.len();
        self.inner.replace_all(records.into_iter().map(|r| (r.id, r)), None);
        info!("Channel cache rebuilt with {} channels", count);
    }

    /// Number of cached channels.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if no channel is cached.
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for ChannelCache {
    fn default() -> Self {
        Self::new()
    }
}
