mod memory_cache;
mod redis_cache;

pub use memory_cache::*;
pub use redis_cache::*;

use crate::error::CacheError;
use crate::reference::{Provider, VideoReference};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Six hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(21600);

/// `provider:video_id`. Width and bypass flags never take part in the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(provider: Provider, video_id: &str) -> Self {
        Self(format!("{}:{}", provider.as_str(), video_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&VideoReference> for CacheKey {
    fn from(reference: &VideoReference) -> Self {
        Self::new(reference.provider, &reference.video_id)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub thumbnail_url: String,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(thumbnail_url: impl Into<String>) -> Self {
        Self {
            thumbnail_url: thumbnail_url.into(),
            stored_at: Utc::now(),
        }
    }
}

/// TTL store for canonical thumbnail URLs.
///
/// Implementations enforce expiry themselves; callers treat any error as a
/// miss.
#[async_trait]
pub trait ThumbnailCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    async fn set(&self, key: &CacheKey, thumbnail_url: &str, ttl: Duration)
        -> Result<(), CacheError>;

    fn name(&self) -> &'static str;
}
