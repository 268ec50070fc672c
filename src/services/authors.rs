//! Author profile lookups with cache-first reads.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheConfig, TypedCache};
use crate::database::{Author, ChatStore, Message, MessageView, StoreResult};

/// Resolves message authors, caching profiles in a bounded Moka cache.
#[derive(Clone)]
pub struct AuthorDirectory {
    store: Arc<dyn ChatStore>,
    cache: TypedCache<i64, Author>,
}

impl AuthorDirectory {
    pub fn new(store: Arc<dyn ChatStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: TypedCache::new("authors", CacheConfig::author_profiles(ttl)),
        }
    }

    /// Get an author profile, falling back to a placeholder for deleted users.
    pub async fn get(&self, user_id: i64) -> StoreResult<Author> {
        if let Some(author) = self.cache.get(&user_id) {
            return Ok(author);
        }

        match self.store.get_author(user_id).await? {
            Some(author) => {
                self.cache.insert(user_id, author.clone());
                Ok(author)
            }
            None => {
                debug!("Author {} not found, using placeholder", user_id);
                Ok(Author::unknown(user_id))
            }
        }
    }

    /// Join messages with their authors, keeping the input order.
    pub async fn render(&self, messages: Vec<Message>) -> StoreResult<Vec<MessageView>> {
        let mut seen: HashMap<i64, Author> = HashMap::new();
        let mut views = Vec::with_capacity(messages.len());

        for message in messages {
            let author = match seen.get(&message.user_id) {
                Some(author) => author.clone(),
                None => {
                    let author = self.get(message.user_id).await?;
                    seen.insert(message.user_id, author.clone());
                    author
                }
            };
            views.push(MessageView::new(message, author));
        }

        Ok(views)
    }

    /// Drop every cached profile.
    pub fn invalidate_all(&self) {
        debug!("Invalidating {} cache", self.cache.name());
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{InMemoryStore, MessageStore};

    fn alice() -> Author {
        Author {
            user_id: 1,
            name: "alice".to_string(),
            display_name: "Alice".to_string(),
            avatar_icon: "alice.png".to_string(),
        }
    }

    #[tokio::test]
    async fn render_joins_authors_in_order() {
        let store = Arc::new(InMemoryStore::new());
        store.add_author(alice());
        store.insert_message(1, 1, "first").await.unwrap();
        store.insert_message(1, 2, "second").await.unwrap();

        let directory = AuthorDirectory::new(store.clone(), Duration::from_secs(60));
        let messages = store.messages_page(1, 10, 0).await.unwrap();
        let views = directory.render(messages).await.unwrap();

        assert_eq!(views.len(), 2);
        assert_eq!(views[0].content, "second");
        assert_eq!(views[0].user, Author::unknown(2));
        assert_eq!(views[1].user.display_name, "Alice");
    }

    #[tokio::test]
    async fn profiles_are_served_from_cache() {
        let store = Arc::new(InMemoryStore::new());
        store.add_author(alice());
        let directory = AuthorDirectory::new(store.clone(), Duration::from_secs(60));

        assert_eq!(directory.get(1).await.unwrap().display_name, "Alice");

        // A profile edit is not visible until the cache is dropped.
        store.add_author(Author {
            display_name: "Alice B".to_string(),
            ..alice()
        });
        assert_eq!(directory.get(1).await.unwrap().display_name, "Alice");

        directory.invalidate_all();
        assert_eq!(directory.get(1).await.unwrap().display_name, "Alice B");
    }
}
