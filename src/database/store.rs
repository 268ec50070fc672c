//! Durable store boundary.
//!
//! The chat core only talks to storage through these traits. `MongoStore` is
//! the production backend; `InMemoryStore` backs development runs and tests.

use async_trait::async_trait;

use super::StoreResult;
use super::models::{Author, ChannelRecord, Message, ReadWatermark};

/// Rows kept by a reset. Everything with a larger ID is considered derived
/// state and removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedBoundary {
    pub max_channel_id: i64,
    pub max_message_id: i64,
}

impl Default for SeedBoundary {
    fn default() -> Self {
        Self {
            max_channel_id: 10,
            max_message_id: 10_000,
        }
    }
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message and return its newly assigned, strictly increasing ID.
    async fn insert_message(&self, channel_id: i64, user_id: i64, content: &str)
    -> StoreResult<i64>;

    /// Exact number of messages in `channel_id` with an ID greater than `message_id`.
    async fn count_messages_after(&self, channel_id: i64, message_id: i64) -> StoreResult<i64>;

    /// Every channel, each carrying a freshly computed true message count.
    async fn all_channels(&self) -> StoreResult<Vec<ChannelRecord>>;

    /// Persist a new channel and return its record (message count 0).
    async fn insert_channel(&self, name: &str, description: &str) -> StoreResult<ChannelRecord>;

    /// Messages in `channel_id` with an ID greater than `last_id`, newest first.
    async fn messages_after(
        &self,
        channel_id: i64,
        last_id: i64,
        limit: i64,
    ) -> StoreResult<Vec<Message>>;

    /// One page of messages in `channel_id`, newest first.
    async fn messages_page(
        &self,
        channel_id: i64,
        limit: i64,
        offset: u64,
    ) -> StoreResult<Vec<Message>>;

    /// Remove channels and messages above the seed boundary.
    async fn truncate_to_seed(&self, seed: SeedBoundary) -> StoreResult<()>;
}

#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn get_watermark(&self, user_id: i64, channel_id: i64) -> StoreResult<Option<i64>>;

    /// All watermark rows of one user.
    async fn watermarks_for_user(&self, user_id: i64) -> StoreResult<Vec<ReadWatermark>>;

    /// Create the (user, channel) row or move it forward. Never moves a
    /// watermark backwards.
    async fn upsert_watermark(&self, user_id: i64, channel_id: i64, message_id: i64)
    -> StoreResult<()>;

    /// Delete every watermark (reset only).
    async fn clear_watermarks(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait AuthorStore: Send + Sync {
    async fn get_author(&self, user_id: i64) -> StoreResult<Option<Author>>;
}

/// Everything the chat core needs from storage.
pub trait ChatStore: MessageStore + WatermarkStore + AuthorStore {
    /// Short backend identifier for logs.
    fn backend_name(&self) -> &'static str;
}
