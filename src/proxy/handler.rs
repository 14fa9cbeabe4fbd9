use crate::error::UpstreamError;
use crate::proxy::strategy::{plan, ResponseAction, ResponseMode};
use crate::resolver::{Resolution, Resolver};
use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Empty, Full, StreamBody};
use http::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE, LOCATION, REFERER};
use http::{Method, Request, Response, StatusCode};
use hyper::body::Frame;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

const NO_STORE: &str = "no-store";

/// Per-request flags peeled off the path before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub reference: String,
    pub bypass: bool,
    pub mode: ResponseMode,
}

/// Splits leading flag segments (`nocache`, `proxy`, `redirect`) and the
/// matching query flags off the request target. The legacy `/id/<n>` route
/// proxies unless a mode was given explicitly.
pub fn parse_route(path: &str, query: Option<&str>) -> Route {
    let mut bypass = false;
    let mut mode = None;

    let mut rest = path.trim_start_matches('/');
    loop {
        let (head, tail) = rest.split_once('/').unwrap_or((rest, ""));
        match head {
            "nocache" => bypass = true,
            "proxy" => mode = Some(ResponseMode::Proxy),
            "redirect" => mode = Some(ResponseMode::Redirect),
            _ => break,
        }
        rest = tail.trim_start_matches('/');
    }

    if mode.is_none() && rest.split('/').next() == Some("id") {
        mode = Some(ResponseMode::Proxy);
    }

    let mut kept = Vec::new();
    for pair in query.unwrap_or("").split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let enabled = !matches!(value, "0" | "false" | "no");
        match name {
            "nocache" => bypass = bypass || enabled,
            "proxy" if enabled => mode = Some(ResponseMode::Proxy),
            "proxy" => {}
            _ => kept.push(pair),
        }
    }

    let mut reference = format!("/{}", rest);
    if !kept.is_empty() {
        reference.push('?');
        reference.push_str(&kept.join("&"));
    }

    Route {
        reference,
        bypass,
        mode: mode.unwrap_or_default(),
    }
}

pub struct AppState {
    resolver: Resolver,
    client: reqwest::Client,
}

impl AppState {
    pub fn new(resolver: Resolver, client: reqwest::Client) -> Self {
        Self { resolver, client }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    async fn stream(
        &self,
        source: &str,
        fallback: Option<&str>,
        cacheable: bool,
    ) -> Response<ResponseBody> {
        match self.fetch(source, cacheable).await {
            Ok(response) => return response,
            Err(e) => warn!(url = %source, error = %e, "Upstream image fetch failed"),
        }

        if let Some(fallback) = fallback {
            match self.fetch(fallback, false).await {
                Ok(response) => return response,
                Err(e) => warn!(url = %fallback, error = %e, "Fallback image fetch failed"),
            }
        }

        self.redirect(self.resolver.fallback_url(), false)
    }

    /// Streams `url` through. The error thumbnail is never `cacheable`, so a
    /// later request can retry the lookup.
    async fn fetch(
        &self,
        url: &str,
        cacheable: bool,
    ) -> Result<Response<ResponseBody>, UpstreamError> {
        let upstream = self.client.get(url).send().await?;

        let status = upstream.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        let content_type = upstream
            .headers()
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

        let stream = upstream
            .bytes_stream()
            .map_ok(Frame::data)
            .map_err(|e| Box::new(e) as BoxError);

        let mut response = Response::new(StreamBody::new(stream).boxed_unsync());
        response.headers_mut().insert(CONTENT_TYPE, content_type);
        response
            .headers_mut()
            .insert(CACHE_CONTROL, self.cache_control(cacheable));

        debug!(url = %url, "Streaming upstream image");
        Ok(response)
    }

    fn redirect(&self, location: &str, cacheable: bool) -> Response<ResponseBody> {
        let location = HeaderValue::from_str(location)
            .or_else(|_| HeaderValue::from_str(self.resolver.fallback_url()));

        match location {
            Ok(location) => {
                let mut response = Response::new(empty());
                *response.status_mut() = StatusCode::FOUND;
                response.headers_mut().insert(LOCATION, location);
                response
                    .headers_mut()
                    .insert(CACHE_CONTROL, self.cache_control(cacheable));
                response
            }
            Err(_) => status_response(StatusCode::INTERNAL_SERVER_ERROR, "invalid redirect target"),
        }
    }

    fn cache_control(&self, cacheable: bool) -> HeaderValue {
        if !cacheable {
            return HeaderValue::from_static(NO_STORE);
        }
        let max_age = self.resolver.cache_ttl().as_secs();
        HeaderValue::from_str(&format!("public, max-age={}", max_age))
            .unwrap_or_else(|_| HeaderValue::from_static(NO_STORE))
    }
}

pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<ResponseBody>, Infallible> {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return Ok(status_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"));
    }

    if req.uri().path() == "/health" {
        return Ok(status_response(StatusCode::OK, "OK"));
    }

    let route = parse_route(req.uri().path(), req.uri().query());
    let referer = req
        .headers()
        .get(REFERER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let resolution = state.resolver.resolve(&route.reference, route.bypass).await;
    match &resolution {
        Resolution::Resolved { delivery_url, cache } => info!(
            reference = %route.reference,
            referer = %referer,
            cache = ?cache,
            mode = ?route.mode,
            url = %delivery_url,
            "Thumbnail resolved"
        ),
        Resolution::Fallback { reason, .. } => warn!(
            reference = %route.reference,
            referer = %referer,
            mode = ?route.mode,
            reason = %reason,
            "Serving error thumbnail"
        ),
    }

    let response = match plan(route.mode, &resolution, state.resolver.fallback_url()) {
        ResponseAction::Redirect {
            location,
            cacheable,
        } => state.redirect(&location, cacheable),
        ResponseAction::Stream {
            source,
            fallback,
            cacheable,
        } => state.stream(&source, fallback.as_deref(), cacheable).await,
    };
    Ok(response)
}

fn empty() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

fn status_response(status: StatusCode, message: &'static str) -> Response<ResponseBody> {
    let mut response = Response::new(
        Full::new(Bytes::from_static(message.as_bytes()))
            .map_err(|never| match never {})
            .boxed_unsync(),
    );
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_reference() {
        assert_eq!(
            parse_route("/vimeo.com/76979871", None),
            Route {
                reference: "/vimeo.com/76979871".into(),
                bypass: false,
                mode: ResponseMode::Redirect,
            }
        );
    }

    #[test]
    fn test_leading_flags() {
        let route = parse_route("/nocache/proxy/vimeo.com/76979871/200", None);
        assert_eq!(route.reference, "/vimeo.com/76979871/200");
        assert!(route.bypass);
        assert_eq!(route.mode, ResponseMode::Proxy);

        let route = parse_route("/proxy/https://vimeo.com/76979871", None);
        assert_eq!(route.reference, "/https://vimeo.com/76979871");
        assert!(!route.bypass);
    }

    #[test]
    fn test_query_flags_are_removed() {
        let route = parse_route("/youtube.com/watch", Some("v=dQw4w9WgXcQ&nocache&proxy=1"));
        assert_eq!(route.reference, "/youtube.com/watch?v=dQw4w9WgXcQ");
        assert!(route.bypass);
        assert_eq!(route.mode, ResponseMode::Proxy);

        let route = parse_route("/vimeo.com/1", Some("nocache=0&proxy=false"));
        assert_eq!(route.reference, "/vimeo.com/1");
        assert!(!route.bypass);
        assert_eq!(route.mode, ResponseMode::Redirect);
    }

    #[test]
    fn test_legacy_id_route_proxies() {
        let route = parse_route("/id/76979871", None);
        assert_eq!(route.reference, "/id/76979871");
        assert_eq!(route.mode, ResponseMode::Proxy);

        let route = parse_route("/redirect/id/76979871", None);
        assert_eq!(route.mode, ResponseMode::Redirect);
    }
}
