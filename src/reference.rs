//! Classification of inbound references into a provider and video id.
//!
//! Classification is a pure function of the input string so that routing
//! decisions can be tested without any I/O.

use crate::error::ResolveError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Vimeo,
    YouTube,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vimeo => "vimeo",
            Self::YouTube => "youtube",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference {
    pub provider: Provider,
    pub video_id: String,
    pub requested_width: Option<u32>,
}

const VIMEO_HOSTS: &[&str] = &["vimeo.com"];
const YOUTUBE_HOSTS: &[&str] = &["youtube.com", "youtu.be", "youtube-nocookie.com"];

/// Classifies a raw path (optionally with its query string).
///
/// A Vimeo host segment wins over a YouTube one; with neither present, a
/// `v=` query parameter means YouTube and otherwise a purely numeric path
/// segment is taken as a Vimeo id, which covers the legacy `/id/<n>` route.
pub fn classify(raw: &str) -> Result<VideoReference, ResolveError> {
    let (path, query) = match raw.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (raw, None),
    };
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let host = |domains: &[&str]| {
        segments
            .iter()
            .position(|s| domains.iter().any(|d| is_host(s, d)))
    };

    let classified = if let Some(pos) = host(VIMEO_HOSTS) {
        classify_vimeo(&segments[pos + 1..], false)
    } else if let Some(pos) = host(YOUTUBE_HOSTS) {
        classify_youtube(&segments[pos + 1..], query)
    } else if query.and_then(query_video_param).is_some() {
        // Query-style reference without a host, e.g. `/watch?v=<id>`.
        classify_youtube(&[], query)
    } else {
        classify_vimeo(&segments, true)
    };

    classified.ok_or_else(|| ResolveError::Unrecognized(raw.to_string()))
}

/// `player.vimeo.com` and `vimeo.com:443` are both on `vimeo.com`.
fn is_host(segment: &str, domain: &str) -> bool {
    let host = segment.split(':').next().unwrap_or(segment).to_ascii_lowercase();
    host == domain
        || host
            .strip_suffix(domain)
            .map_or(false, |sub| sub.ends_with('.'))
}

/// After a Vimeo host the id is the first digit run in any segment
/// (`video76979871`, `76979871#t=30`); on a bare path the segment must be
/// all digits.
fn classify_vimeo(segments: &[&str], strict: bool) -> Option<VideoReference> {
    let (idx, video_id) = segments.iter().enumerate().find_map(|(idx, segment)| {
        let digits = if strict {
            Some(*segment).filter(|s| is_numeric(s))
        } else {
            first_digit_run(segment)
        };
        digits.map(|d| (idx, d.to_string()))
    })?;

    Some(VideoReference {
        provider: Provider::Vimeo,
        video_id,
        requested_width: segments.get(idx + 1).and_then(|s| parse_width(s)),
    })
}

fn classify_youtube(segments: &[&str], query: Option<&str>) -> Option<VideoReference> {
    if let Some(value) = query.and_then(query_video_param) {
        // `v=<id>/<width>` keeps the positional width convention.
        let mut parts = value.split('/').filter(|s| !s.is_empty());
        let video_id = parts.next()?;
        let width = parts
            .next()
            .and_then(parse_width)
            .or_else(|| segments.last().and_then(|s| parse_width(s)));
        return youtube_reference(video_id, width);
    }

    match segments {
        [] => None,
        [.., id, width] if is_numeric(width) => youtube_reference(id, parse_width(width)),
        [.., id] => youtube_reference(id, None),
    }
}

fn youtube_reference(video_id: &str, requested_width: Option<u32>) -> Option<VideoReference> {
    let video_id = video_id.trim();
    if video_id.is_empty() {
        return None;
    }
    Some(VideoReference {
        provider: Provider::YouTube,
        video_id: video_id.to_string(),
        requested_width,
    })
}

fn query_video_param(query: &str) -> Option<&str> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("v="))
        .filter(|v| !v.is_empty())
}

fn first_digit_run(segment: &str) -> Option<&str> {
    let start = segment.find(|c: char| c.is_ascii_digit())?;
    let rest = &segment[start..];
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    Some(&rest[..end])
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Parses a width segment; zero, negative and non-numeric values mean "no width".
pub fn parse_width(segment: &str) -> Option<u32> {
    segment
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|w| *w > 0)
        .and_then(|w| u32::try_from(w).ok())
}
