//! Message models: stored row and rendered view.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use super::Author;

/// Display format for message dates.
const DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message ID, strictly increasing.
    #[serde(rename = "_id")]
    pub id: i64,
    pub channel_id: i64,
    pub user_id: i64,
    pub content: String,
    /// Unix timestamp of creation.
    pub created_at: i64,
}

/// A message joined with its author, ready to hand to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub id: i64,
    pub user: Author,
    pub date: String,
    pub content: String,
}

impl MessageView {
    pub fn new(message: Message, user: Author) -> Self {
        let date = DateTime::from_timestamp(message.created_at, 0)
            .map(|dt| dt.format(DATE_FORMAT).to_string())
            .unwrap_or_default();

        Self {
            id: message.id,
            user,
            date,
            content: message.content,
        }
    }
}
