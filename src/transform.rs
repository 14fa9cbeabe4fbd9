//! Width transforms via a signed image-resize URL.
//!
//! Resize URLs have the form
//! `https://{host}/{urlencoded source}?w={width}&s={hmac_hex}` where the
//! signature is HMAC-SHA256 over `/{urlencoded source}?w={width}`.

use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::Sha256;
use tracing::{info, warn};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

static SIZE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_\d+(?:x\d+)?(\.[A-Za-z0-9]+)?$").expect("valid size suffix regex"));

/// Removes a provider size suffix (`_640`, `_295x166`) from the last path
/// segment, keeping the extension and any query string.
pub fn strip_size_suffix(thumbnail_url: &str) -> String {
    match Url::parse(thumbnail_url) {
        Ok(mut url) => {
            let path = SIZE_SUFFIX.replace(url.path(), "${1}").into_owned();
            url.set_path(&path);
            url.to_string()
        }
        Err(_) => {
            let (path, query) = match thumbnail_url.split_once('?') {
                Some((path, query)) => (path, Some(query)),
                None => (thumbnail_url, None),
            };
            let path = SIZE_SUFFIX.replace(path, "${1}");
            match query {
                Some(query) => format!("{}?{}", path, query),
                None => path.into_owned(),
            }
        }
    }
}

#[derive(Clone)]
struct SigningBackend {
    host: String,
    token: String,
}

/// Rewrites canonical thumbnail URLs into delivery URLs.
#[derive(Clone, Default)]
pub struct Transformer {
    backend: Option<SigningBackend>,
}

impl Transformer {
    pub fn passthrough() -> Self {
        Self { backend: None }
    }

    pub fn signed(host: impl Into<String>, token: impl Into<String>) -> Self {
        let host = host.into();
        let host = host
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();
        Self {
            backend: Some(SigningBackend {
                host,
                token: token.into(),
            }),
        }
    }

    /// Missing or empty credentials leave the transformer in pass-through mode.
    pub fn from_credentials(host: Option<&str>, token: Option<&str>) -> Self {
        match (host.filter(|h| !h.is_empty()), token.filter(|t| !t.is_empty())) {
            (Some(host), Some(token)) => {
                info!(host = %host, "Image transform backend enabled");
                Self::signed(host, token)
            }
            _ => {
                info!("No image transform backend configured, widths are ignored");
                Self::passthrough()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn transform(&self, thumbnail_url: &str, requested_width: Option<u32>) -> String {
        let (Some(backend), Some(width)) = (&self.backend, requested_width) else {
            return thumbnail_url.to_string();
        };

        let source = strip_size_suffix(&backend.source_of(thumbnail_url));
        match backend.sign(&source, width) {
            Some(url) => url,
            None => {
                warn!(url = %thumbnail_url, "Transform signing failed, serving unsized thumbnail");
                source
            }
        }
    }
}

impl SigningBackend {
    /// Unwraps a URL that already points at the resize host back to its source,
    /// so repeated transforms never stack widths.
    fn source_of(&self, thumbnail_url: &str) -> String {
        let Ok(url) = Url::parse(thumbnail_url) else {
            return thumbnail_url.to_string();
        };
        if url.host_str() != Some(self.host.as_str()) {
            return thumbnail_url.to_string();
        }
        let encoded = url.path().trim_start_matches('/');
        match urlencoding::decode(encoded) {
            Ok(source) if !source.is_empty() => source.into_owned(),
            _ => thumbnail_url.to_string(),
        }
    }

    fn sign(&self, source: &str, width: u32) -> Option<String> {
        let path = format!("/{}", urlencoding::encode(source));
        let query = format!("w={}", width);

        let mut mac = HmacSha256::new_from_slice(self.token.as_bytes()).ok()?;
        mac.update(format!("{}?{}", path, query).as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Some(format!(
            "https://{}{}?{}&s={}",
            self.host, path, query, signature
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZED: &str = "https://i.vimeocdn.com/video/76979871_640.jpg";
    const UNSIZED: &str = "https://i.vimeocdn.com/video/76979871.jpg";

    fn signed() -> Transformer {
        Transformer::signed("https://img.example.net/", "secret-token")
    }

    #[test]
    fn test_strip_size_suffix() {
        assert_eq!(strip_size_suffix(SIZED), UNSIZED);
        assert_eq!(
            strip_size_suffix("https://i.vimeocdn.com/video/452001751-8216e0b3_295x166.webp?r=pad"),
            "https://i.vimeocdn.com/video/452001751-8216e0b3.webp?r=pad"
        );
        assert_eq!(
            strip_size_suffix("https://i.vimeocdn.com/video/452001751-d_640"),
            "https://i.vimeocdn.com/video/452001751-d"
        );
        assert_eq!(strip_size_suffix(UNSIZED), UNSIZED);
        assert_eq!(
            strip_size_suffix("https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg"),
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg"
        );
    }

    #[test]
    fn test_passthrough_without_backend() {
        let transformer = Transformer::passthrough();
        assert!(!transformer.is_enabled());
        assert_eq!(transformer.transform(UNSIZED, Some(200)), UNSIZED);
    }

    #[test]
    fn test_passthrough_without_width() {
        assert_eq!(signed().transform(UNSIZED, None), UNSIZED);
    }

    #[test]
    fn test_from_credentials_requires_both() {
        assert!(!Transformer::from_credentials(Some("img.example.net"), None).is_enabled());
        assert!(!Transformer::from_credentials(Some(""), Some("t")).is_enabled());
        assert!(Transformer::from_credentials(Some("img.example.net"), Some("t")).is_enabled());
    }

    #[test]
    fn test_signed_url_encodes_width() {
        let url = signed().transform(UNSIZED, Some(200));
        assert!(url.starts_with("https://img.example.net/https%3A%2F%2Fi.vimeocdn.com"));
        assert!(url.contains("?w=200&s="));

        let signature = url.rsplit("&s=").next().unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_transform_is_idempotent() {
        let transformer = signed();
        let once = transformer.transform(UNSIZED, Some(200));
        let twice = transformer.transform(&once, Some(200));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_widths_never_stack() {
        let transformer = signed();
        let first = transformer.transform(SIZED, Some(100));
        let second = transformer.transform(&first, Some(200));

        assert!(second.contains("w=200"));
        assert!(!second.contains("w=100"));
        assert!(!second.contains("_640"));
        assert_eq!(second, transformer.transform(UNSIZED, Some(200)));
    }

    #[test]
    fn test_signature_depends_on_token() {
        let a = Transformer::signed("img.example.net", "one").transform(UNSIZED, Some(200));
        let b = Transformer::signed("img.example.net", "two").transform(UNSIZED, Some(200));
        assert_ne!(a, b);
    }
}
