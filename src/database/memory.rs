//! In-memory implementation of the chat store.
//!
//! Not durable: all state is lost on process restart. Used for local runs
//! (`STORE_BACKEND=memory`) and tests. All state sits behind one
//! `parking_lot::RwLock`; no lock is held across an `.await`.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::StoreResult;
use super::models::{Author, ChannelRecord, Message, ReadWatermark};
use super::store::{AuthorStore, ChatStore, MessageStore, SeedBoundary, WatermarkStore};

#[derive(Debug, Default)]
struct State {
    /// Channel rows; `message_count` here is ignored and recomputed on read.
    channels: BTreeMap<i64, ChannelRecord>,
    /// Messages keyed (and therefore ordered) by ID.
    messages: BTreeMap<i64, Message>,
    /// (user_id, channel_id) -> last read message ID.
    watermarks: HashMap<(i64, i64), i64>,
    authors: HashMap<i64, Author>,
    last_message_id: i64,
    last_channel_id: i64,
}

impl State {
    fn message_count(&self, channel_id: i64) -> i64 {
        self.messages
            .values()
            .filter(|m| m.channel_id == channel_id)
            .count() as i64
    }
}

/// In-memory chat store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an author profile.
    #[cfg(test)]
    pub fn add_author(&self, author: Author) {
        self.state.write().authors.insert(author.user_id, author);
    }

    /// Insert a channel with a fixed ID, as seed data would.
    #[cfg(test)]
    pub fn seed_channel(&self, record: ChannelRecord) {
        let mut state = self.state.write();
        state.last_channel_id = state.last_channel_id.max(record.id);
        state.channels.insert(record.id, record);
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn insert_message(
        &self,
        channel_id: i64,
        user_id: i64,
        content: &str,
    ) -> StoreResult<i64> {
        let mut state = self.state.write();
        state.last_message_id += 1;
        let id = state.last_message_id;
        state.messages.insert(
            id,
            Message {
                id,
                channel_id,
                user_id,
                content: content.to_string(),
                created_at: chrono::Utc::now().timestamp(),
            },
        );
        Ok(id)
    }

    async fn count_messages_after(&self, channel_id: i64, message_id: i64) -> StoreResult<i64> {
        let state = self.state.read();
        let count = state
            .messages
            .range(message_id.saturating_add(1)..)
            .filter(|(_, m)| m.channel_id == channel_id)
            .count();
        Ok(count as i64)
    }

    async fn all_channels(&self) -> StoreResult<Vec<ChannelRecord>> {
        let state = self.state.read();
        let channels = state
            .channels
            .values()
            .map(|c| c.clone().with_message_count(state.message_count(c.id)))
            .collect();
        Ok(channels)
    }

    async fn insert_channel(&self, name: &str, description: &str) -> StoreResult<ChannelRecord> {
        let mut state = self.state.write();
        state.last_channel_id += 1;
        let record = ChannelRecord::new(state.last_channel_id, name, description);
        state.channels.insert(record.id, record.clone());
        Ok(record)
    }

    async fn messages_after(
        &self,
        channel_id: i64,
        last_id: i64,
        limit: i64,
    ) -> StoreResult<Vec<Message>> {
        let state = self.state.read();
        let messages = state
            .messages
            .range(last_id.saturating_add(1)..)
            .rev()
            .map(|(_, m)| m)
            .filter(|m| m.channel_id == channel_id)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect();
        Ok(messages)
    }

    async fn messages_page(
        &self,
        channel_id: i64,
        limit: i64,
        offset: u64,
    ) -> StoreResult<Vec<Message>> {
        let state = self.state.read();
        let messages = state
            .messages
            .values()
            .rev()
            .filter(|m| m.channel_id == channel_id)
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect();
        Ok(messages)
    }

    async fn truncate_to_seed(&self, seed: SeedBoundary) -> StoreResult<()> {
        let mut state = self.state.write();
        state.channels.retain(|id, _| *id <= seed.max_channel_id);
        state.messages.retain(|id, _| *id <= seed.max_message_id);
        debug!(
            "Truncated memory store to {} channels, {} messages",
            state.channels.len(),
            state.messages.len()
        );
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for InMemoryStore {
    async fn get_watermark(&self, user_id: i64, channel_id: i64) -> StoreResult<Option<i64>> {
        Ok(self.state.read().watermarks.get(&(user_id, channel_id)).copied())
    }

    async fn watermarks_for_user(&self, user_id: i64) -> StoreResult<Vec<ReadWatermark>> {
        let state = self.state.read();
        let rows = state
            .watermarks
            .iter()
            .filter(|((uid, _), _)| *uid == user_id)
            .map(|(&(user_id, channel_id), &last_read_message_id)| ReadWatermark {
                user_id,
                channel_id,
                last_read_message_id,
            })
            .collect();
        Ok(rows)
    }

    async fn upsert_watermark(
        &self,
        user_id: i64,
        channel_id: i64,
        message_id: i64,
    ) -> StoreResult<()> {
        let mut state = self.state.write();
        let current = state.watermarks.entry((user_id, channel_id)).or_insert(message_id);
        *current = (*current).max(message_id);
        Ok(())
    }

    async fn clear_watermarks(&self) -> StoreResult<()> {
        self.state.write().watermarks.clear();
        Ok(())
    }
}

#[async_trait]
impl AuthorStore for InMemoryStore {
    async fn get_author(&self, user_id: i64) -> StoreResult<Option<Author>> {
        Ok(self.state.read().authors.get(&user_id).cloned())
    }
}

impl ChatStore for InMemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
