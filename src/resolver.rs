//! Resolution pipeline: classify, consult the cache, look the video up on a
//! miss, transform, store.

use crate::cache::{CacheEntry, CacheKey, ThumbnailCache, DEFAULT_TTL};
use crate::error::{CacheError, ProviderError, ResolveError};
use crate::providers::{Lookup, ThumbnailProvider};
use crate::reference::{classify, Provider, VideoReference};
use crate::transform::Transformer;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);
const CACHE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Bypass,
}

/// Terminal state of one resolution. Both variants carry a URL to deliver.
#[derive(Debug)]
pub enum Resolution {
    Resolved {
        delivery_url: String,
        cache: CacheStatus,
    },
    Fallback {
        delivery_url: String,
        reason: ResolveError,
    },
}

impl Resolution {
    pub fn delivery_url(&self) -> &str {
        match self {
            Self::Resolved { delivery_url, .. } | Self::Fallback { delivery_url, .. } => {
                delivery_url
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

pub struct Resolver {
    cache: Arc<dyn ThumbnailCache>,
    providers: HashMap<Provider, Arc<dyn ThumbnailProvider>>,
    transformer: Transformer,
    fallback_url: String,
    cache_ttl: Duration,
    lookup_timeout: Duration,
}

impl Resolver {
    pub fn new(
        cache: Arc<dyn ThumbnailCache>,
        transformer: Transformer,
        fallback_url: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            providers: HashMap::new(),
            transformer,
            fallback_url: fallback_url.into(),
            cache_ttl: DEFAULT_TTL,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Registers an adapter under the provider it reports; replaces any earlier one.
    pub fn with_provider(mut self, provider: Arc<dyn ThumbnailProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_lookup_timeout(mut self, lookup_timeout: Duration) -> Self {
        self.lookup_timeout = lookup_timeout;
        self
    }

    pub fn fallback_url(&self) -> &str {
        &self.fallback_url
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Resolves a raw reference. Never fails: unresolvable references end in
    /// [`Resolution::Fallback`] pointing at the error thumbnail.
    pub async fn resolve(&self, raw: &str, bypass: bool) -> Resolution {
        match classify(raw) {
            Ok(reference) => self.resolve_reference(&reference, bypass).await,
            Err(reason) => self.fallback(reason),
        }
    }

    pub async fn resolve_reference(&self, reference: &VideoReference, bypass: bool) -> Resolution {
        let key = CacheKey::from(reference);

        if !bypass {
            if let Some(entry) = self.cache_get(&key).await {
                debug!(key = %key, "Thumbnail cache hit");
                return Resolution::Resolved {
                    delivery_url: self
                        .transformer
                        .transform(&entry.thumbnail_url, reference.requested_width),
                    cache: CacheStatus::Hit,
                };
            }
            debug!(key = %key, "Thumbnail cache miss");
        }

        let thumbnail_url = match self.lookup(reference).await {
            Ok(Lookup::Found { thumbnail_url }) => thumbnail_url,
            Ok(Lookup::NotFound) => {
                return self.fallback(ResolveError::ProviderNotFound {
                    provider: reference.provider,
                    video_id: reference.video_id.clone(),
                })
            }
            Err(source) => {
                return self.fallback(ResolveError::Provider {
                    provider: reference.provider,
                    source,
                })
            }
        };

        self.cache_set(&key, &thumbnail_url).await;

        Resolution::Resolved {
            delivery_url: self
                .transformer
                .transform(&thumbnail_url, reference.requested_width),
            cache: if bypass {
                CacheStatus::Bypass
            } else {
                CacheStatus::Miss
            },
        }
    }

    async fn lookup(&self, reference: &VideoReference) -> Result<Lookup, ProviderError> {
        let provider = self
            .providers
            .get(&reference.provider)
            .ok_or(ProviderError::NotConfigured(reference.provider))?;

        match timeout(self.lookup_timeout, provider.lookup(&reference.video_id)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.lookup_timeout)),
        }
    }

    async fn cache_get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let result = match timeout(CACHE_TIMEOUT, self.cache.get(key)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout),
        };
        match result {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, cache = self.cache.name(), error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn cache_set(&self, key: &CacheKey, thumbnail_url: &str) {
        let result = match timeout(
            CACHE_TIMEOUT,
            self.cache.set(key, thumbnail_url, self.cache_ttl),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout),
        };
        if let Err(e) = result {
            warn!(key = %key, cache = self.cache.name(), error = %e, "Cache write failed");
        }
    }

    fn fallback(&self, reason: ResolveError) -> Resolution {
        Resolution::Fallback {
            delivery_url: self.fallback_url.clone(),
            reason,
        }
    }
}
