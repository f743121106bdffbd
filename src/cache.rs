use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::models::ReviewTemplate;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Process-local map with per-entry expiry.
///
/// There is no cross-instance invalidation; writers in the same process call
/// [`TtlCache::invalidate`].
#[derive(Debug)]
pub struct TtlCache<K, V> {
    inner: RwLock<HashMap<K, Entry<V>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        {
            let guard = self.inner.read().await;
            match guard.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.value.clone())
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: drop it so the map does not grow with dead entries.
        let mut guard = self.inner.write().await;
        if guard
            .get(key)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            guard.remove(key);
        }
        None
    }

    pub async fn insert(&self, key: K, value: V) {
        let expires_at = Instant::now() + self.ttl;
        self.inner
            .write()
            .await
            .insert(key, Entry { value, expires_at });
    }

    pub async fn invalidate(&self, key: &K) {
        self.inner.write().await.remove(key);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

/// Public feedback listings keyed by business id.
pub type FeedbackCache = TtlCache<Uuid, Vec<ReviewTemplate>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache: TtlCache<u32, &'static str> = TtlCache::new(Duration::from_secs(60));
        cache.insert(1, "one").await;
        assert_eq!(cache.get(&1).await, Some("one"));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&1).await, Some("one"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&1).await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache: FeedbackCache = TtlCache::default();
        let id = Uuid::new_v4();
        cache.insert(id, Vec::new()).await;
        assert_eq!(cache.len().await, 1);
        cache.invalidate(&id).await;
        assert_eq!(cache.get(&id).await, None);
        assert_eq!(cache.ttl(), DEFAULT_TTL);
    }
}
