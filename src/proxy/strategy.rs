use crate::resolver::Resolution;

/// How a resolved thumbnail is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    #[default]
    Redirect,
    Proxy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseAction {
    Redirect { location: String, cacheable: bool },
    Stream {
        source: String,
        fallback: Option<String>,
        cacheable: bool,
    },
}

/// Chooses the response for a resolution. Fallbacks are delivered through the
/// same mode as successes so callers never see a raw error.
pub fn plan(mode: ResponseMode, resolution: &Resolution, fallback_url: &str) -> ResponseAction {
    let target = resolution.delivery_url().to_string();
    match mode {
        ResponseMode::Redirect => ResponseAction::Redirect {
            location: target,
            cacheable: !resolution.is_fallback(),
        },
        ResponseMode::Proxy => {
            // A failed stream of the resolved image retries once with the fallback.
            let fallback = (!resolution.is_fallback() && target != fallback_url)
                .then(|| fallback_url.to_string());
            ResponseAction::Stream {
                source: target,
                fallback,
                cacheable: !resolution.is_fallback(),
            }
        }
    }
}
