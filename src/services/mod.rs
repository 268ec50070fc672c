//! Chat services built on the channel cache and the store boundary.
//!
//! - `ingest` - persist-then-increment message path
//! - `unread` - unread-count derivation from cached totals and watermarks
//! - `authors` - cached author profiles for rendering messages
//! - `chat` - the operations request handlers call

mod authors;
mod chat;
mod error;
mod ingest;
mod unread;

pub use chat::ChatService;
