//! Message ingestion path.
//!
//! Persist first, then bump the cached count. The cache is an accelerator, not
//! the source of truth: a missing entry does not fail the post.

use tracing::{debug, warn};

use crate::cache::ChannelCache;
use crate::database::{MessageStore, StoreResult};

/// Persist a message and account for it in the channel cache.
///
/// If the insert fails the cache is left untouched and the storage error is
/// returned as is. If the channel is not cached the message still counts as
/// posted; the next rebuild reconciles the count.
pub async fn ingest_message<S>(
    store: &S,
    channels: &ChannelCache,
    channel_id: i64,
    user_id: i64,
    content: &str,
) -> StoreResult<i64>
where
    S: MessageStore + ?Sized,
{
    let message_id = store.insert_message(channel_id, user_id, content).await?;

    if channels.increment_message_count(channel_id) {
        debug!("Message {} posted to channel {}", message_id, channel_id);
    } else {
        warn!(
            "Message {} posted to uncached channel {}; count drift until next rebuild",
            message_id, channel_id
        );
    }

    Ok(message_id)
}
