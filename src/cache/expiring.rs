//! Expiring key/value cache guarded by a single reader/writer lock.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// A stored value plus its optional deadline.
///
/// `expires_at == None` means the entry never expires.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Option<Duration>) -> Self {
        let expires_at = ttl
            .filter(|ttl| !ttl.is_zero())
            .map(|ttl| Instant::now() + ttl);
        Self { value, expires_at }
    }

    #[inline]
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

/// Generic in-process cache with per-entry expiry.
///
/// All access goes through one `RwLock` over the whole map: reads take the
/// shared side, writes the exclusive side. Nothing inside the lock performs
/// I/O. Values are cloned on the way in and on the way out, so callers never
/// hold a reference into the map after the lock is released.
///
/// Expired entries are not evicted lazily; `get` stays a pure read. They are
/// dropped on the next overwrite, `delete`, `clear` or `replace_all`.
pub struct ExpiringCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<RwLock<HashMap<K, CacheEntry<V>>>>,
    name: Arc<str>,
}

// Manual Clone implementation that doesn't require K: Clone
impl<K, V> Clone for ExpiringCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            name: Arc::clone(&self.name),
        }
    }
}

impl<K, V> ExpiringCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty cache with the given name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            name: name.into(),
        }
    }

    /// Get the name of this cache.
    #[allow(dead_code)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a copy of the value stored under `key`.
    ///
    /// Returns `None` if the key is absent or its deadline has passed.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let entries = self.inner.read();
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    /// Insert or overwrite `key`.
    ///
    /// A `ttl` of `None` or zero stores the entry without expiry.
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        let entry = CacheEntry::new(value, ttl);
        self.inner.write().insert(key, entry);
    }

    /// Remove `key`. Returns `true` if an entry (live or expired) was removed.
    #[allow(dead_code)]
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.write().remove(key).is_some()
    }

    /// Remove every entry.
    #[allow(dead_code)]
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Snapshot of all live values, in no particular order.
    ///
    /// The values are copied out under a single read lock, so the result
    /// reflects one consistent state of the map.
    pub fn list_all(&self) -> Vec<V> {
        let now = Instant::now();
        let entries = self.inner.read();
        entries
            .values()
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
            .collect()
    }

    /// Mutate a live entry in place.
    ///
    /// The lookup and the mutation happen inside one exclusive critical
    /// section, so concurrent updates on the same key compose instead of
    /// overwriting each other. Returns `false` without calling `f` if the key
    /// is absent or expired.
    pub fn update<Q, F>(&self, key: &Q, f: F) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&mut V),
    {
        let now = Instant::now();
        let mut entries = self.inner.write();
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                f(&mut entry.value);
                true
            }
            _ => false,
        }
    }

    /// Atomically replace the whole contents of the cache.
    ///
    /// The new map is built before the exclusive lock is taken; the lock is
    /// held only for the swap. Readers observe either the old set or the new
    /// set, never a mix.
    pub fn replace_all<I>(&self, entries: I, ttl: Option<Duration>)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let fresh: HashMap<K, CacheEntry<V>> = entries
            .into_iter()
            .map(|(key, value)| (key, CacheEntry::new(value, ttl)))
            .collect();

        let previous = std::mem::replace(&mut *self.inner.write(), fresh);
        // Old entries are dropped after the lock is released.
        drop(previous);
    }

    /// Number of stored entries, including ones whose deadline has passed.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Check if the cache holds no entries.
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl<K, V> std::fmt::Debug for ExpiringCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("name", &self.name)
            .field("entry_count", &self.len())
            .finish()
    }
}
