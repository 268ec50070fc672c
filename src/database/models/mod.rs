//! Database model exports.

pub mod author;
pub mod channel;
pub mod message;
pub mod watermark;

pub use author::Author;
pub use channel::ChannelRecord;
pub use message::{Message, MessageView};
pub use watermark::ReadWatermark;
