//! Read watermark model.

use serde::{Deserialize, Serialize};

/// Highest message ID a user has fetched in a channel.
///
/// One row per (user, channel). Created on the first fetch that returns
/// messages, moved forward on later fetches, removed only by a full reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadWatermark {
    pub user_id: i64,
    pub channel_id: i64,
    #[serde(rename = "message_id")]
    pub last_read_message_id: i64,
}
