use super::{Lookup, ThumbnailProvider};
use crate::error::ProviderError;
use crate::reference::Provider;
use crate::transform::strip_size_suffix;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

pub const VIMEO_OEMBED_URL: &str = "https://vimeo.com/api/oembed.json";

#[derive(Debug, Deserialize)]
struct OEmbed {
    thumbnail_url: Option<String>,
}

/// Looks thumbnails up through Vimeo's oEmbed endpoint.
pub struct VimeoProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl VimeoProvider {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ThumbnailProvider for VimeoProvider {
    fn kind(&self) -> Provider {
        Provider::Vimeo
    }

    async fn lookup(&self, video_id: &str) -> Result<Lookup, ProviderError> {
        let video_url = format!("https://vimeo.com/{}", video_id);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("url", video_url.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ProviderError::Status(status));
        }

        let body: OEmbed = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        match body.thumbnail_url.filter(|url| !url.is_empty()) {
            Some(url) => {
                debug!(video_id, thumbnail = %url, "Vimeo thumbnail found");
                Ok(Lookup::Found {
                    thumbnail_url: strip_size_suffix(&url),
                })
            }
            None => Ok(Lookup::NotFound),
        }
    }
}
