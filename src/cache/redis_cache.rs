use super::{CacheEntry, CacheKey, ThumbnailCache};
use crate::error::CacheError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::{debug, info};

/// Redis-backed cache. Entries are JSON-encoded and written with `SETEX`.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to Redis thumbnail cache");
        Ok(Self { conn })
    }
}

#[async_trait]
impl ThumbnailCache for RedisCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key.as_str()).await?;
        raw.as_deref().map(decode_entry).transpose()
    }

    async fn set(
        &self,
        key: &CacheKey,
        thumbnail_url: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let data = encode_entry(&CacheEntry::new(thumbnail_url))?;
        let ttl_secs = ttl.as_secs().max(1);

        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key.as_str(), data, ttl_secs).await?;

        debug!(key = %key, ttl = ttl_secs, "Cache set");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

fn encode_entry(entry: &CacheEntry) -> Result<String, CacheError> {
    Ok(serde_json::to_string(entry)?)
}

/// Values that do not decode are [`CacheError::Corrupt`], which the resolver
/// reads as a miss and overwrites on the next lookup.
fn decode_entry(raw: &str) -> Result<CacheEntry, CacheError> {
    Ok(serde_json::from_str(raw)?)
}
