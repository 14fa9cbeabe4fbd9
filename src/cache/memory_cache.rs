use super::{CacheEntry, CacheKey, ThumbnailCache};
use crate::error::CacheError;
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Clone)]
struct CacheItem {
    entry: CacheEntry,
    expires_at: Instant,
}

/// In-process LRU cache with per-entry expiry.
pub struct MemoryCache {
    store: Mutex<LruCache<CacheKey, CacheItem>>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn len(&self) -> usize {
        self.store.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ThumbnailCache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let mut store = self.store.lock().await;
        if let Some(item) = store.get(key).cloned() {
            if Instant::now() < item.expires_at {
                return Ok(Some(item.entry));
            }
            store.pop(key);
        }
        Ok(None)
    }

    async fn set(
        &self,
        key: &CacheKey,
        thumbnail_url: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let item = CacheItem {
            entry: CacheEntry::new(thumbnail_url),
            expires_at: Instant::now() + ttl,
        };
        self.store.lock().await.put(key.clone(), item);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
