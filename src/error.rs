use crate::reference::Provider;
use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single provider lookup.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("lookup timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("no adapter registered for {0}")]
    NotConfigured(Provider),
}

/// Cache failures never reach the caller; they are downgraded to a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("corrupt cache entry: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("cache call timed out")]
    Timeout,
}

/// Why a request fell back to the error thumbnail.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unrecognized reference: {0:?}")]
    Unrecognized(String),

    #[error("{provider} has no thumbnail for {video_id}")]
    ProviderNotFound { provider: Provider, video_id: String },

    #[error("{provider} lookup failed: {source}")]
    Provider {
        provider: Provider,
        #[source]
        source: ProviderError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment error: {0}")]
    Env(#[from] envy::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure fetching image bytes for proxy mode.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned {0}")]
    Status(StatusCode),
}
