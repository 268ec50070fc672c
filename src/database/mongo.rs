//! MongoDB database wrapper and store backend.

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{
    ClientOptions, FindOneAndUpdateOptions, FindOneOptions, FindOptions, ReturnDocument,
    UpdateOptions,
};
use mongodb::{Client, Collection};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::models::{Author, ChannelRecord, Message, ReadWatermark};
use super::store::{AuthorStore, ChatStore, MessageStore, SeedBoundary, WatermarkStore};
use super::{StoreError, StoreResult};

/// MongoDB duplicate key error code.
const DUPLICATE_KEY: i32 = 11000;

/// Sequence names in the `counters` collection.
const MESSAGE_SEQ: &str = "message_id";
const CHANNEL_SEQ: &str = "channel_id";

/// Database wrapper for MongoDB operations.
#[derive(Debug, Clone)]
pub struct Database {
    client: Client,
    db: mongodb::Database,
}

impl Database {
    /// Connect to MongoDB with the given URI and database name.
    ///
    /// # Arguments
    /// * `uri` - MongoDB connection string
    /// * `db_name` - Database name to use
    ///
    /// # Errors
    /// Returns error if connection fails.
    pub async fn connect(uri: &str, db_name: &str) -> anyhow::Result<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;

        // Ping the database to verify connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!("Successfully connected to MongoDB");

        let db = client.database(db_name);

        Ok(Self { client, db })
    }

    /// Get a typed collection from the database.
    ///
    /// # Arguments
    /// * `name` - Collection name
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    /// Drop the whole database.
    #[cfg(all(test, feature = "mongo-tests"))]
    pub async fn drop_database(&self) -> anyhow::Result<()> {
        self.db.drop().await?;
        Ok(())
    }

    /// Close the underlying client.
    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }
}

/// Chat store backed by MongoDB.
///
/// Message and channel IDs are `i64` `_id`s drawn from sequences in the
/// `counters` collection, so they are strictly increasing.
pub struct MongoStore {
    channels: Collection<ChannelRecord>,
    messages: Collection<Message>,
    watermarks: Collection<ReadWatermark>,
    authors: Collection<Author>,
    counters: Collection<Document>,
    /// Held from message ID allocation until the row is written.
    message_order: Mutex<()>,
}

impl MongoStore {
    /// Create the store and align ID sequences with rows already present
    /// (seed data is loaded without going through the sequences).
    pub async fn new(db: &Database) -> anyhow::Result<Self> {
        let store = Self {
            channels: db.collection("channels"),
            messages: db.collection("messages"),
            watermarks: db.collection("haveread"),
            authors: db.collection("users"),
            counters: db.collection("counters"),
            message_order: Mutex::new(()),
        };

        let max_message = store.max_id(&store.messages.clone_with_type()).await?;
        store.raise_sequence(MESSAGE_SEQ, max_message).await?;
        let max_channel = store.max_id(&store.channels.clone_with_type()).await?;
        store.raise_sequence(CHANNEL_SEQ, max_channel).await?;

        debug!(
            "Sequences aligned: message_id >= {}, channel_id >= {}",
            max_message, max_channel
        );
        Ok(store)
    }

    /// Largest `_id` in a collection, 0 if empty.
    async fn max_id(&self, collection: &Collection<Document>) -> StoreResult<i64> {
        let options = FindOneOptions::builder()
            .sort(doc! { "_id": -1 })
            .projection(doc! { "_id": 1 })
            .build();

        let top = collection.find_one(doc! {}).with_options(options).await?;
        Ok(top
            .as_ref()
            .and_then(|d| d.get("_id"))
            .and_then(bson_as_i64)
            .unwrap_or(0))
    }

    /// Make sure a sequence is at least `floor`.
    async fn raise_sequence(&self, name: &str, floor: i64) -> StoreResult<()> {
        let options = UpdateOptions::builder().upsert(true).build();
        self.counters
            .update_one(doc! { "_id": name }, doc! { "$max": { "seq": floor } })
            .with_options(options)
            .await?;
        Ok(())
    }

    /// Atomically advance a sequence and return the new value.
    async fn next_id(&self, name: &str) -> StoreResult<i64> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let counter = self
            .counters
            .find_one_and_update(doc! { "_id": name }, doc! { "$inc": { "seq": 1_i64 } })
            .with_options(options)
            .await?
            .with_context(|| format!("sequence '{name}' missing after upsert"))?;

        let id = counter
            .get("seq")
            .and_then(bson_as_i64)
            .with_context(|| format!("sequence '{name}' is not an integer"))?;
        Ok(id)
    }

    /// True message count per channel.
    async fn message_counts(&self) -> StoreResult<HashMap<i64, i64>> {
        let pipeline = vec![doc! {
            "$group": { "_id": "$channel_id", "count": { "$sum": 1 } }
        }];

        let rows: Vec<Document> = self
            .messages
            .clone_with_type::<Document>()
            .aggregate(pipeline)
            .await?
            .try_collect()
            .await?;

        let counts = rows
            .iter()
            .filter_map(|row| {
                let channel_id = row.get("_id").and_then(bson_as_i64)?;
                let count = row.get("count").and_then(bson_as_i64)?;
                Some((channel_id, count))
            })
            .collect();
        Ok(counts)
    }
}

/// Map a duplicate `_id` on insert to `Conflict`; anything else stays a backend error.
fn insert_error(err: mongodb::error::Error, what: &str) -> StoreError {
    if let ErrorKind::Write(WriteFailure::WriteError(write)) = err.kind.as_ref()
        && write.code == DUPLICATE_KEY
    {
        return StoreError::Conflict(format!("{what} already exists"));
    }
    StoreError::Backend(err)
}

/// Read an integer regardless of the width it was stored with.
fn bson_as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) if v.fract() == 0.0 => Some(*v as i64),
        _ => None,
    }
}

#[async_trait]
impl MessageStore for MongoStore {
    /// Allocation and insert run under `message_order`, so messages become
    /// visible in ID order: a reader that sees ID `n` already sees every
    /// smaller ID this process wrote, and a watermark set from `n` cannot
    /// skip one that lands later. Several writer processes sharing one
    /// database do not get this guarantee.
    async fn insert_message(
        &self,
        channel_id: i64,
        user_id: i64,
        content: &str,
    ) -> StoreResult<i64> {
        let _ordered = self.message_order.lock().await;
        let id = self.next_id(MESSAGE_SEQ).await?;
        let message = Message {
            id,
            channel_id,
            user_id,
            content: content.to_string(),
            created_at: chrono::Utc::now().timestamp(),
        };

        self.messages
            .insert_one(&message)
            .await
            .map_err(|e| insert_error(e, &format!("message {id}")))?;
        debug!("Inserted message {} into channel {}", id, channel_id);
        Ok(id)
    }

    async fn count_messages_after(&self, channel_id: i64, message_id: i64) -> StoreResult<i64> {
        let filter = doc! { "channel_id": channel_id, "_id": { "$gt": message_id } };
        let count = self.messages.count_documents(filter).await?;
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn all_channels(&self) -> StoreResult<Vec<ChannelRecord>> {
        // Counts first: a message landing between the two reads is at worst
        // missing from the count, never counted for a channel twice.
        let counts = self.message_counts().await?;
        let channels: Vec<ChannelRecord> = self
            .channels
            .find(doc! {})
            .sort(doc! { "_id": 1 })
            .await?
            .try_collect()
            .await?;

        Ok(channels
            .into_iter()
            .map(|c| {
                let count = counts.get(&c.id).copied().unwrap_or(0);
                c.with_message_count(count)
            })
            .collect())
    }

    async fn insert_channel(&self, name: &str, description: &str) -> StoreResult<ChannelRecord> {
        let id = self.next_id(CHANNEL_SEQ).await?;
        let record = ChannelRecord::new(id, name, description);
        self.channels
            .insert_one(&record)
            .await
            .map_err(|e| insert_error(e, &format!("channel {id}")))?;
        debug!("Inserted channel {} ({})", id, name);
        Ok(record)
    }

    async fn messages_after(
        &self,
        channel_id: i64,
        last_id: i64,
        limit: i64,
    ) -> StoreResult<Vec<Message>> {
        let filter = doc! { "channel_id": channel_id, "_id": { "$gt": last_id } };
        let options = FindOptions::builder()
            .sort(doc! { "_id": -1 })
            .limit(limit)
            .build();

        let messages = self
            .messages
            .find(filter)
            .with_options(options)
            .await?
            .try_collect()
            .await?;
        Ok(messages)
    }

    async fn messages_page(
        &self,
        channel_id: i64,
        limit: i64,
        offset: u64,
    ) -> StoreResult<Vec<Message>> {
        let options = FindOptions::builder()
            .sort(doc! { "_id": -1 })
            .skip(offset)
            .limit(limit)
            .build();

        let messages = self
            .messages
            .find(doc! { "channel_id": channel_id })
            .with_options(options)
            .await?
            .try_collect()
            .await?;
        Ok(messages)
    }

    async fn truncate_to_seed(&self, seed: SeedBoundary) -> StoreResult<()> {
        let channels = self
            .channels
            .delete_many(doc! { "_id": { "$gt": seed.max_channel_id } })
            .await?;
        let messages = self
            .messages
            .delete_many(doc! { "_id": { "$gt": seed.max_message_id } })
            .await?;

        info!(
            "Truncated to seed: removed {} channels, {} messages",
            channels.deleted_count, messages.deleted_count
        );
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for MongoStore {
    async fn get_watermark(&self, user_id: i64, channel_id: i64) -> StoreResult<Option<i64>> {
        let filter = doc! { "user_id": user_id, "channel_id": channel_id };
        let row = self.watermarks.find_one(filter).await?;
        Ok(row.map(|w| w.last_read_message_id))
    }

    async fn watermarks_for_user(&self, user_id: i64) -> StoreResult<Vec<ReadWatermark>> {
        let rows = self
            .watermarks
            .find(doc! { "user_id": user_id })
            .await?
            .try_collect()
            .await?;
        Ok(rows)
    }

    async fn upsert_watermark(
        &self,
        user_id: i64,
        channel_id: i64,
        message_id: i64,
    ) -> StoreResult<()> {
        let now = chrono::Utc::now().timestamp();
        let filter = doc! { "user_id": user_id, "channel_id": channel_id };
        let update = doc! {
            "$max": { "message_id": message_id },
            "$set": { "updated_at": now },
            "$setOnInsert": { "created_at": now },
        };
        let options = UpdateOptions::builder().upsert(true).build();

        self.watermarks
            .update_one(filter, update)
            .with_options(options)
            .await?;

        debug!(
            "Watermark for user {} in channel {} -> {}",
            user_id, channel_id, message_id
        );
        Ok(())
    }

    async fn clear_watermarks(&self) -> StoreResult<()> {
        let result = self.watermarks.delete_many(doc! {}).await?;
        debug!("Cleared {} watermarks", result.deleted_count);
        Ok(())
    }
}

#[async_trait]
impl AuthorStore for MongoStore {
    async fn get_author(&self, user_id: i64) -> StoreResult<Option<Author>> {
        let options = FindOneOptions::builder()
            .projection(doc! { "_id": 1, "name": 1, "display_name": 1, "avatar_icon": 1 })
            .build();

        let author = self
            .authors
            .find_one(doc! { "_id": user_id })
            .with_options(options)
            .await?;
        Ok(author)
    }
}

impl ChatStore for MongoStore {
    fn backend_name(&self) -> &'static str {
        "mongodb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bson_as_i64_accepts_integer_widths() {
        assert_eq!(bson_as_i64(&Bson::Int32(7)), Some(7));
        assert_eq!(bson_as_i64(&Bson::Int64(1 << 40)), Some(1 << 40));
        assert_eq!(bson_as_i64(&Bson::Double(3.0)), Some(3));
        assert_eq!(bson_as_i64(&Bson::Double(3.5)), None);
        assert_eq!(bson_as_i64(&Bson::String("3".into())), None);
    }
}
