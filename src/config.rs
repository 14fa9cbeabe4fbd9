use crate::error::ConfigError;
use crate::providers::{VIMEO_OEMBED_URL, YOUTUBE_API_URL};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

pub const ENV_PREFIX: &str = "POSTERFRAME_";
pub const DEFAULT_ERROR_THUMBNAIL_URL: &str =
    "https://storage.googleapis.com/posterframe-assets/static.png";

/// Service configuration, read from `POSTERFRAME_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Unset means the in-process cache is used.
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_memory_cache_capacity")]
    pub memory_cache_capacity: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
    /// Total budget for a proxied image download, body included.
    #[serde(default = "default_image_timeout_secs")]
    pub image_timeout_secs: u64,
    #[serde(default = "default_vimeo_oembed_url")]
    pub vimeo_oembed_url: String,
    #[serde(default = "default_youtube_api_url")]
    pub youtube_api_url: String,
    #[serde(default)]
    pub youtube_api_key: Option<String>,

    #[serde(default)]
    pub transform_host: Option<String>,
    #[serde(default)]
    pub transform_token: Option<String>,

    #[serde(default = "default_error_thumbnail_url")]
    pub error_thumbnail_url: String,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> usize {
    100
}

fn default_memory_cache_capacity() -> usize {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    21600
}

fn default_provider_timeout_ms() -> u64 {
    5000
}

fn default_image_timeout_secs() -> u64 {
    30
}

fn default_vimeo_oembed_url() -> String {
    VIMEO_OEMBED_URL.into()
}

fn default_youtube_api_url() -> String {
    YOUTUBE_API_URL.into()
}

fn default_error_thumbnail_url() -> String {
    DEFAULT_ERROR_THUMBNAIL_URL.into()
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let config: Config = envy::prefixed(ENV_PREFIX).from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Config = envy::prefixed(ENV_PREFIX).from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid("max_connections must be positive".into()));
        }
        if self.memory_cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "memory_cache_capacity must be positive".into(),
            ));
        }
        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache_ttl_secs must be positive".into()));
        }
        if self.provider_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "provider_timeout_ms must be positive".into(),
            ));
        }
        if self.image_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "image_timeout_secs must be positive".into(),
            ));
        }
        url::Url::parse(&self.error_thumbnail_url).map_err(|e| {
            ConfigError::Invalid(format!(
                "error_thumbnail_url {:?} is not a URL: {}",
                self.error_thumbnail_url, e
            ))
        })?;
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("host {:?} is not an IP address", self.host)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }
}
