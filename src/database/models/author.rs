//! Message author profile.

use serde::{Deserialize, Serialize};

/// Public profile of a message author, as shown next to each message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// User ID (never rendered).
    #[serde(rename = "_id", skip_serializing)]
    pub user_id: i64,
    pub name: String,
    pub display_name: String,
    pub avatar_icon: String,
}

impl Author {
    /// Placeholder used when the author row no longer exists.
    pub fn unknown(user_id: i64) -> Self {
        Self {
            user_id,
            name: String::new(),
            display_name: "unknown".to_string(),
            avatar_icon: "default.png".to_string(),
        }
    }
}
