mod vimeo;
mod youtube;

pub use vimeo::*;
pub use youtube::*;

use crate::error::ProviderError;
use crate::reference::Provider;
use async_trait::async_trait;
use std::time::Duration;

/// Outcome of a provider lookup that reached the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found { thumbnail_url: String },
    NotFound,
}

/// A video host that can resolve an id to a canonical thumbnail URL.
#[async_trait]
pub trait ThumbnailProvider: Send + Sync {
    fn kind(&self) -> Provider;

    async fn lookup(&self, video_id: &str) -> Result<Lookup, ProviderError>;
}

const USER_AGENT: &str = concat!("posterframe/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for provider calls. `timeout` bounds the whole exchange.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Client for proxied image downloads. Bodies are streamed after the status
/// line has gone out, so the total budget is separate from the provider one.
pub fn image_client(
    connect_timeout: Duration,
    timeout: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}
