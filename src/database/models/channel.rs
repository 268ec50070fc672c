//! Channel metadata model.

use serde::{Deserialize, Serialize};

/// Channel metadata as held by the channel cache.
///
/// `message_count` is never negative and, outside of drift windows, equals the
/// number of persisted messages in the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Channel ID (primary key)
    #[serde(rename = "_id")]
    pub id: i64,

    pub name: String,

    pub description: String,

    /// Messages posted to this channel.
    /// Recomputed from the message collection on rebuild, not trusted from storage.
    #[serde(default)]
    pub message_count: i32,

    /// Unix timestamp of last update.
    pub updated_at: i64,

    /// Unix timestamp of creation.
    pub created_at: i64,
}

impl ChannelRecord {
    /// Create a fresh channel record with no messages.
    pub fn new(id: i64, name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id,
            name: name.into(),
            description: description.into(),
            message_count: 0,
            updated_at: now,
            created_at: now,
        }
    }

    /// Same record with the message count replaced.
    #[must_use]
    pub fn with_message_count(mut self, count: i64) -> Self {
        self.message_count = i32::try_from(count.max(0)).unwrap_or(i32::MAX);
        self
    }
}
