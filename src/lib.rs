//! Video thumbnail resolver.
//!
//! Turns a Vimeo or YouTube reference embedded in a request path into a
//! thumbnail URL, optionally resized through a signed image CDN, and either
//! redirects to it or streams it back. Resolved URLs are cached per video.

pub mod cache;
pub mod config;
pub mod error;
pub mod providers;
pub mod proxy;
pub mod reference;
pub mod resolver;
pub mod transform;

pub use config::Config;
pub use reference::{classify, Provider, VideoReference};
pub use resolver::{CacheStatus, Resolution, Resolver};
