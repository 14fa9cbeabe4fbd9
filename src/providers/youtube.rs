use super::{Lookup, ThumbnailProvider};
use crate::error::ProviderError;
use crate::reference::Provider;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

pub const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3/videos";

#[derive(Debug, Deserialize)]
struct VideoList {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    #[serde(default)]
    thumbnails: BTreeMap<String, Thumbnail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Thumbnail {
    fn area(&self) -> u64 {
        u64::from(self.width.unwrap_or(0)) * u64::from(self.height.unwrap_or(0))
    }
}

/// Picks the variant with the greatest declared resolution, independent of
/// the order the API lists them in. Ties go to the wider variant, then the URL.
pub fn largest_thumbnail<'a>(
    variants: impl IntoIterator<Item = &'a Thumbnail>,
) -> Option<&'a Thumbnail> {
    variants.into_iter().max_by(|a, b| {
        a.area()
            .cmp(&b.area())
            .then_with(|| a.width.cmp(&b.width))
            .then_with(|| b.url.cmp(&a.url))
    })
}

/// Looks thumbnails up through the YouTube Data API videos list call.
pub struct YouTubeProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl YouTubeProvider {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ThumbnailProvider for YouTubeProvider {
    fn kind(&self) -> Provider {
        Provider::YouTube
    }

    async fn lookup(&self, video_id: &str) -> Result<Lookup, ProviderError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("part", "id,snippet"),
                ("id", video_id),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status));
        }

        let list: VideoList = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let Some(snippet) = list.items.into_iter().find_map(|item| item.snippet) else {
            return Ok(Lookup::NotFound);
        };

        match largest_thumbnail(snippet.thumbnails.values()) {
            Some(thumbnail) => {
                debug!(
                    video_id,
                    width = ?thumbnail.width,
                    height = ?thumbnail.height,
                    "YouTube thumbnail selected"
                );
                Ok(Lookup::Found {
                    thumbnail_url: thumbnail.url.clone(),
                })
            }
            None => Ok(Lookup::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thumb(name: &str, width: u32, height: u32) -> Thumbnail {
        Thumbnail {
            url: format!("https://i.ytimg.com/vi/x/{}.jpg", name),
            width: Some(width),
            height: Some(height),
        }
    }

    #[test]
    fn test_largest_ignores_order() {
        let ascending = vec![
            thumb("default", 120, 90),
            thumb("medium", 320, 180),
            thumb("maxres", 1280, 720),
        ];
        let shuffled = vec![
            thumb("maxres", 1280, 720),
            thumb("default", 120, 90),
            thumb("medium", 320, 180),
        ];

        assert!(largest_thumbnail(&ascending).unwrap().url.ends_with("maxres.jpg"));
        assert!(largest_thumbnail(&shuffled).unwrap().url.ends_with("maxres.jpg"));
    }

    #[test]
    fn test_largest_prefers_declared_size_over_name() {
        // Alphabetically last key is not the biggest one.
        let mut map = BTreeMap::new();
        map.insert("standard".to_string(), thumb("sddefault", 640, 480));
        map.insert("maxres".to_string(), thumb("maxresdefault", 1280, 720));
        map.insert("high".to_string(), thumb("hqdefault", 480, 360));

        let best = largest_thumbnail(map.values()).unwrap();
        assert!(best.url.ends_with("maxresdefault.jpg"));
    }

    #[test]
    fn test_missing_dimensions_rank_lowest() {
        let variants = vec![
            Thumbnail {
                url: "https://i.ytimg.com/vi/x/unknown.jpg".into(),
                width: None,
                height: None,
            },
            thumb("default", 120, 90),
        ];
        assert!(largest_thumbnail(&variants).unwrap().url.ends_with("default.jpg"));
    }

    #[test]
    fn test_empty_variants() {
        assert!(largest_thumbnail(&Vec::<Thumbnail>::new()).is_none());
    }
}
