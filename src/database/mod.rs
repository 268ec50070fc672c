//! Database module exports.

mod error;
mod memory;
mod models;
mod mongo;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use models::*;
pub use mongo::{Database, MongoStore};
pub use store::{AuthorStore, ChatStore, MessageStore, SeedBoundary, WatermarkStore};
