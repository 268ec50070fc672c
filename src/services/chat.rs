//! Chat operations over the store and the channel cache.

use std::sync::Arc;

use tracing::{debug, info};

use super::authors::AuthorDirectory;
use super::error::{ChatError, ChatResult};
use super::ingest::ingest_message;
use super::unread::{UnreadCount, count_unread, sorted_report};
use crate::cache::ChannelCache;
use crate::config::Config;
use crate::database::{
    ChannelRecord, ChatStore, MessageStore, MessageView, SeedBoundary, WatermarkStore,
};

/// One page of channel history.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HistoryPage {
    pub channel_id: i64,
    pub page: i64,
    pub max_page: i64,
    /// Oldest first.
    pub messages: Vec<MessageView>,
}

/// Request-level chat operations.
///
/// Built once at startup and shared; holds the channel cache explicitly
/// rather than reaching for process-global state.
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    channels: ChannelCache,
    authors: AuthorDirectory,
    seed: SeedBoundary,
    history_page_size: i64,
    fetch_limit: i64,
}

impl ChatService {
    pub fn new(store: Arc<dyn ChatStore>, channels: ChannelCache, config: &Config) -> Self {
        let authors = AuthorDirectory::new(Arc::clone(&store), config.author_cache_ttl);
        Self {
            store,
            channels,
            authors,
            seed: config.seed,
            history_page_size: config.history_page_size,
            fetch_limit: config.fetch_limit,
        }
    }

    /// The channel cache this service maintains.
    #[cfg(test)]
    pub fn channels(&self) -> &ChannelCache {
        &self.channels
    }

    /// Load every channel with its true message count and rebuild the cache.
    ///
    /// The records are read before the cache lock is touched; a failed load
    /// returns early and leaves the current contents in place.
    async fn reload_channels(&self) -> ChatResult<usize> {
        let records = self.store.all_channels().await?;
        let count = records.len();
        self.channels.rebuild(records);
        Ok(count)
    }

    /// Startup initialization: populate the cache from storage.
    pub async fn warm_up(&self) -> ChatResult<usize> {
        let count = self.reload_channels().await?;
        info!(
            "Channel cache warmed from {} backend: {} channels",
            self.store.backend_name(),
            count
        );
        Ok(count)
    }

    /// Administrative reset.
    ///
    /// Drops derived state above the seed boundary, clears all read
    /// watermarks, then rebuilds the channel cache from freshly computed
    /// counts. This is the only path that repairs count drift.
    pub async fn initialize(&self) -> ChatResult<usize> {
        info!(
            "Resetting to seed (channels <= {}, messages <= {})",
            self.seed.max_channel_id, self.seed.max_message_id
        );

        self.store.truncate_to_seed(self.seed).await?;
        self.store.clear_watermarks().await?;
        self.authors.invalidate_all();

        let count = self.reload_channels().await?;
        info!("Reset complete: {} channels", count);
        Ok(count)
    }

    /// Post a message to a channel.
    pub async fn post_message(
        &self,
        channel_id: i64,
        user_id: i64,
        content: &str,
    ) -> ChatResult<i64> {
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let id = ingest_message(self.store.as_ref(), &self.channels, channel_id, user_id, content)
            .await?;
        Ok(id)
    }

    /// Messages newer than `last_message_id`, oldest first.
    ///
    /// When anything is returned, the user's watermark for the channel moves
    /// to the newest returned ID.
    pub async fn fetch_messages(
        &self,
        user_id: i64,
        channel_id: i64,
        last_message_id: i64,
    ) -> ChatResult<Vec<MessageView>> {
        let mut messages = self
            .store
            .messages_after(channel_id, last_message_id, self.fetch_limit)
            .await?;

        if let Some(newest) = messages.first() {
            self.store
                .upsert_watermark(user_id, channel_id, newest.id)
                .await?;
        }

        messages.reverse();
        let views = self.authors.render(messages).await?;
        debug!(
            "User {} fetched {} messages from channel {}",
            user_id,
            views.len(),
            channel_id
        );
        Ok(views)
    }

    /// Unread counts for every cached channel, ordered by channel ID.
    pub async fn fetch_unread(&self, user_id: i64) -> ChatResult<Vec<UnreadCount>> {
        let channels = self.channels.list_all();
        let watermarks = self.store.watermarks_for_user(user_id).await?;

        let counts = count_unread(&channels, &watermarks, self.store.as_ref()).await?;
        Ok(sorted_report(&counts))
    }

    /// All cached channels ordered by ID.
    pub fn list_channels(&self) -> Vec<ChannelRecord> {
        self.channels.list_sorted()
    }

    /// Description of a cached channel.
    pub fn channel_description(&self, channel_id: i64) -> Option<String> {
        self.channels.get(channel_id).map(|c| c.description)
    }

    /// Create a channel and cache it with a zero count.
    pub async fn add_channel(&self, name: &str, description: &str) -> ChatResult<ChannelRecord> {
        if name.is_empty() || description.is_empty() {
            return Err(ChatError::InvalidInput(
                "channel name and description are required".to_string(),
            ));
        }

        let record = self.store.insert_channel(name, description).await?;
        self.channels.insert(record.clone());
        info!("Channel {} ({}) created", record.id, record.name);
        Ok(record)
    }

    /// One page of history, newest page first.
    ///
    /// The page count comes from the cached message count, so it needs no
    /// count query.
    pub async fn history(&self, channel_id: i64, page: i64) -> ChatResult<HistoryPage> {
        if channel_id <= 0 {
            return Err(ChatError::InvalidInput(format!(
                "invalid channel id {channel_id}"
            )));
        }

        let page_size = self.history_page_size;
        let cached = self
            .channels
            .get(channel_id)
            .map_or(0, |c| i64::from(c.message_count.max(0)));
        let max_page = ((cached + page_size - 1) / page_size).max(1);

        if page < 1 || page > max_page {
            return Err(ChatError::InvalidPage { page, max_page });
        }

        let offset = u64::try_from((page - 1) * page_size).unwrap_or(0);
        let mut messages = self
            .store
            .messages_page(channel_id, page_size, offset)
            .await?;
        messages.reverse();

        Ok(HistoryPage {
            channel_id,
            page,
            max_page,
            messages: self.authors.render(messages).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use anyhow::anyhow;
    use async_trait::async_trait;

    use super::*;
    use crate::database::{
        Author, AuthorStore, InMemoryStore, Message, ReadWatermark, StoreError, StoreResult,
    };

    fn config() -> Config {
        Config {
            seed: SeedBoundary {
                max_channel_id: 2,
                max_message_id: 6,
            },
            history_page_size: 3,
            ..Config::default()
        }
    }

    async fn service() -> (Arc<InMemoryStore>, ChatService) {
        service_with(config()).await
    }

    async fn service_with(config: Config) -> (Arc<InMemoryStore>, ChatService) {
        let store = Arc::new(InMemoryStore::new());
        store.seed_channel(ChannelRecord::new(1, "general", "general talk"));
        store.seed_channel(ChannelRecord::new(2, "random", "anything"));
        for i in 0..6 {
            let channel = if i % 3 == 2 { 2 } else { 1 };
            store.insert_message(channel, 1, &format!("seed {i}")).await.unwrap();
        }

        let service = ChatService::new(store.clone(), ChannelCache::new(), &config);
        service.warm_up().await.unwrap();
        (store, service)
    }

    #[tokio::test]
    async fn warm_up_loads_true_counts() {
        let (_, service) = service().await;
        let channels = service.list_channels();
        let counts: Vec<(i64, i32)> = channels.iter().map(|c| (c.id, c.message_count)).collect();
        assert_eq!(counts, vec![(1, 4), (2, 2)]);
        assert_eq!(service.channel_description(2).as_deref(), Some("anything"));
        assert_eq!(service.channel_description(9), None);
    }

    #[tokio::test]
    async fn empty_message_is_rejected_before_storage() {
        let (store, service) = service().await;
        let err = service.post_message(1, 1, "").await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
        assert_eq!(store.count_messages_after(1, 0).await.unwrap(), 4);
        assert_eq!(service.channels().get(1).unwrap().message_count, 4);
    }

    #[tokio::test]
    async fn fetch_moves_watermark_and_unread_follows() {
        let (store, service) = service().await;

        // Never read anything: cached totals.
        let unread = service.fetch_unread(7).await.unwrap();
        assert_eq!(
            unread,
            vec![
                UnreadCount { channel_id: 1, unread: 4 },
                UnreadCount { channel_id: 2, unread: 2 },
            ]
        );

        let views = service.fetch_messages(7, 1, 0).await.unwrap();
        let ids: Vec<i64> = views.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![1, 2, 4, 5]);
        assert_eq!(store.get_watermark(7, 1).await.unwrap(), Some(5));

        service.post_message(1, 8, "new").await.unwrap();
        service.post_message(1, 8, "newer").await.unwrap();

        let unread = service.fetch_unread(7).await.unwrap();
        assert_eq!(unread[0], UnreadCount { channel_id: 1, unread: 2 });
        assert_eq!(unread[1], UnreadCount { channel_id: 2, unread: 2 });

        // Nothing new: the watermark stays where it is.
        let views = service.fetch_messages(7, 2, 100).await.unwrap();
        assert!(views.is_empty());
        assert_eq!(store.get_watermark(7, 2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn add_channel_is_cached_with_zero_count() {
        let (_, service) = service().await;

        let err = service.add_channel("", "desc").await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidInput(_)));

        let record = service.add_channel("rust", "crabs").await.unwrap();
        assert_eq!(record.id, 3);
        let cached = service.channels().get(3).unwrap();
        assert_eq!(cached.message_count, 0);
        assert_eq!(cached.name, "rust");

        service.post_message(3, 1, "hi").await.unwrap();
        assert_eq!(service.channels().get(3).unwrap().message_count, 1);
    }

    #[tokio::test]
    async fn history_pages_from_cached_count() {
        let (_, service) = service().await;

        // Channel 1 holds ids 1, 2, 4, 5 with page size 3.
        let first = service.history(1, 1).await.unwrap();
        assert_eq!(first.max_page, 2);
        let ids: Vec<i64> = first.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 4, 5]);

        let second = service.history(1, 2).await.unwrap();
        let ids: Vec<i64> = second.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1]);

        let err = service.history(1, 3).await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidPage { page: 3, max_page: 2 }));
        assert!(matches!(
            service.history(1, 0).await.unwrap_err(),
            ChatError::InvalidPage { .. }
        ));
        assert!(matches!(
            service.history(0, 1).await.unwrap_err(),
            ChatError::InvalidInput(_)
        ));

        // Unknown channel still has one (empty) page.
        let empty = service.history(42, 1).await.unwrap();
        assert_eq!(empty.max_page, 1);
        assert!(empty.messages.is_empty());
    }

    #[tokio::test]
    async fn initialize_truncates_and_repairs_drift() {
        let mut config = config();
        config.seed.max_message_id = 7;
        let (store, service) = service_with(config).await;

        service.add_channel("extra", "to be removed").await.unwrap();
        // Drift: message 7 lands in channel 2 without the cache hearing of it.
        store.insert_message(2, 1, "behind the cache's back").await.unwrap();
        // Message 8 is above the seed boundary.
        service.post_message(1, 1, "beyond seed").await.unwrap();
        service.fetch_messages(1, 1, 0).await.unwrap();

        assert_eq!(service.channels().get(1).unwrap().message_count, 5);
        assert_eq!(service.channels().get(2).unwrap().message_count, 2);

        let count = service.initialize().await.unwrap();
        assert_eq!(count, 2);
        assert!(service.channels().get(3).is_none());
        assert_eq!(service.channels().get(1).unwrap().message_count, 4);
        assert_eq!(service.channels().get(2).unwrap().message_count, 3);
        assert_eq!(store.get_watermark(1, 1).await.unwrap(), None);
    }

    /// Store that delegates to memory but can be told to fail `all_channels`.
    struct FlakyStore {
        inner: InMemoryStore,
        fail_load: AtomicBool,
    }

    #[async_trait]
    impl MessageStore for FlakyStore {
        async fn insert_message(&self, c: i64, u: i64, content: &str) -> StoreResult<i64> {
            self.inner.insert_message(c, u, content).await
        }
        async fn count_messages_after(&self, c: i64, m: i64) -> StoreResult<i64> {
            self.inner.count_messages_after(c, m).await
        }
        async fn all_channels(&self) -> StoreResult<Vec<ChannelRecord>> {
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(StoreError::Unexpected(anyhow!("load failed")));
            }
            self.inner.all_channels().await
        }
        async fn insert_channel(&self, name: &str, desc: &str) -> StoreResult<ChannelRecord> {
            self.inner.insert_channel(name, desc).await
        }
        async fn messages_after(&self, c: i64, last: i64, limit: i64) -> StoreResult<Vec<Message>> {
            self.inner.messages_after(c, last, limit).await
        }
        async fn messages_page(
            &self,
            c: i64,
            limit: i64,
            offset: u64,
        ) -> StoreResult<Vec<Message>> {
            self.inner.messages_page(c, limit, offset).await
        }
        async fn truncate_to_seed(&self, seed: SeedBoundary) -> StoreResult<()> {
            self.inner.truncate_to_seed(seed).await
        }
    }

    #[async_trait]
    impl WatermarkStore for FlakyStore {
        async fn get_watermark(&self, u: i64, c: i64) -> StoreResult<Option<i64>> {
            self.inner.get_watermark(u, c).await
        }
        async fn watermarks_for_user(&self, u: i64) -> StoreResult<Vec<ReadWatermark>> {
            self.inner.watermarks_for_user(u).await
        }
        async fn upsert_watermark(&self, u: i64, c: i64, m: i64) -> StoreResult<()> {
            self.inner.upsert_watermark(u, c, m).await
        }
        async fn clear_watermarks(&self) -> StoreResult<()> {
            self.inner.clear_watermarks().await
        }
    }

    #[async_trait]
    impl AuthorStore for FlakyStore {
        async fn get_author(&self, u: i64) -> StoreResult<Option<Author>> {
            self.inner.get_author(u).await
        }
    }

    impl ChatStore for FlakyStore {
        fn backend_name(&self) -> &'static str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_cache() {
        let inner = InMemoryStore::new();
        inner.seed_channel(ChannelRecord::new(1, "general", "talk"));
        let store = Arc::new(FlakyStore {
            inner,
            fail_load: AtomicBool::new(false),
        });

        let service = ChatService::new(store.clone(), ChannelCache::new(), &config());
        service.warm_up().await.unwrap();
        service.post_message(1, 1, "hello").await.unwrap();

        store.fail_load.store(true, Ordering::SeqCst);
        let err = service.initialize().await.unwrap_err();
        assert_eq!(err.to_string(), "load failed");
        assert!(matches!(err, ChatError::Storage(StoreError::Unexpected(_))));

        let cached = service.channels().get(1).unwrap();
        assert_eq!(cached.message_count, 1);
        assert_eq!(service.channels().len(), 1);
    }
}
