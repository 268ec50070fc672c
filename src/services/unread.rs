//! Unread-count derivation.
//!
//! Combines the cached channel list with one user's read watermarks. Channels
//! the user has read are counted exactly against storage; channels without a
//! watermark fall back to the cached total, since everything in them is unread.

use std::collections::HashMap;

use futures::future::try_join_all;
use serde::Serialize;

use crate::database::{ChannelRecord, MessageStore, ReadWatermark, StoreError, StoreResult};

/// Channel ID -> unread messages.
pub type UnreadCounts = HashMap<i64, i64>;

/// One line of an unread report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnreadCount {
    pub channel_id: i64,
    pub unread: i64,
}

/// Compute unread counts for every channel in `channels`.
///
/// Exact counts for watermarked channels are queried concurrently. A message
/// posted while this runs may be missed (undercount); a message above the
/// watermark is never treated as read. Counts are never negative.
pub async fn count_unread<S>(
    channels: &[ChannelRecord],
    watermarks: &[ReadWatermark],
    store: &S,
) -> StoreResult<UnreadCounts>
where
    S: MessageStore + ?Sized,
{
    let last_read: HashMap<i64, i64> = watermarks
        .iter()
        .map(|w| (w.channel_id, w.last_read_message_id))
        .collect();

    let exact = channels.iter().filter_map(|channel| {
        let last = *last_read.get(&channel.id)?;
        let channel_id = channel.id;
        Some(async move {
            let count = store.count_messages_after(channel_id, last).await?;
            Ok::<_, StoreError>((channel_id, count.max(0)))
        })
    });

    let mut counts: UnreadCounts = try_join_all(exact).await?.into_iter().collect();

    for channel in channels {
        if !last_read.contains_key(&channel.id) {
            counts.insert(channel.id, i64::from(channel.message_count.max(0)));
        }
    }

    Ok(counts)
}

/// Flatten counts into a report ordered by channel ID.
pub fn sorted_report(counts: &UnreadCounts) -> Vec<UnreadCount> {
    let mut report: Vec<UnreadCount> = counts
        .iter()
        .map(|(&channel_id, &unread)| UnreadCount { channel_id, unread })
        .collect();
    report.sort_unstable_by_key(|r| r.channel_id);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryStore;

    fn channel(id: i64, count: i64) -> ChannelRecord {
        ChannelRecord::new(id, format!("ch{id}"), "").with_message_count(count)
    }

    fn watermark(channel_id: i64, last: i64) -> ReadWatermark {
        ReadWatermark {
            user_id: 1,
            channel_id,
            last_read_message_id: last,
        }
    }

    #[tokio::test]
    async fn no_watermark_uses_cached_count() {
        let store = InMemoryStore::new();
        let counts = count_unread(&[channel(1, 42)], &[], &store).await.unwrap();
        assert_eq!(counts.get(&1), Some(&42));
    }

    #[tokio::test]
    async fn watermark_counts_exactly_ignoring_cache() {
        let store = InMemoryStore::new();
        for i in 0..15 {
            store.insert_message(1, 2, &format!("m{i}")).await.unwrap();
        }

        // Cached count is deliberately wrong; the watermark path must not use it.
        let counts = count_unread(&[channel(1, 999)], &[watermark(1, 10)], &store)
            .await
            .unwrap();
        assert_eq!(counts.get(&1), Some(&5));
    }

    #[tokio::test]
    async fn one_entry_per_channel() {
        let store = InMemoryStore::new();
        for _ in 0..3 {
            store.insert_message(2, 2, "x").await.unwrap();
        }
        let channels = [channel(1, 7), channel(2, 3), channel(3, 0)];
        // Watermark for a channel that is not in the list is ignored.
        let watermarks = [watermark(2, 1), watermark(9, 4)];

        let counts = count_unread(&channels, &watermarks, &store).await.unwrap();
        assert_eq!(counts.len(), 3);
        assert_eq!(counts[&1], 7);
        assert_eq!(counts[&2], 2);
        assert_eq!(counts[&3], 0);

        let report = sorted_report(&counts);
        let ids: Vec<i64> = report.iter().map(|r| r.channel_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn negative_cached_count_is_clamped() {
        let store = InMemoryStore::new();
        let mut broken = channel(1, 0);
        broken.message_count = -4;
        let counts = count_unread(&[broken], &[], &store).await.unwrap();
        assert_eq!(counts[&1], 0);
    }
}
