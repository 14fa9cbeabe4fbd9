use posterframe::error::ProviderError;
use posterframe::providers::{http_client, Lookup, ThumbnailProvider, VimeoProvider, YouTubeProvider};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn vimeo(server: &MockServer) -> VimeoProvider {
    VimeoProvider::new(
        http_client(Duration::from_secs(2)).unwrap(),
        format!("{}/api/oembed.json", server.uri()),
    )
}

fn youtube(server: &MockServer) -> YouTubeProvider {
    YouTubeProvider::new(
        http_client(Duration::from_secs(2)).unwrap(),
        format!("{}/youtube/v3/videos", server.uri()),
        "test-key",
    )
}

#[tokio::test]
async fn vimeo_strips_size_suffix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/oembed.json"))
        .and(query_param("url", "https://vimeo.com/76979871"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "video",
            "title": "The New Vimeo Player",
            "thumbnail_url": "https://i.vimeocdn.com/video/76979871_640.jpg",
            "thumbnail_width": 640,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let lookup = vimeo(&server).lookup("76979871").await.unwrap();
    assert_eq!(
        lookup,
        Lookup::Found {
            thumbnail_url: "https://i.vimeocdn.com/video/76979871.jpg".into()
        }
    );
}

#[tokio::test]
async fn vimeo_without_thumbnail_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/oembed.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "type": "video" })))
        .mount(&server)
        .await;

    assert_eq!(vimeo(&server).lookup("1").await.unwrap(), Lookup::NotFound);
}

#[tokio::test]
async fn vimeo_non_200_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/oembed.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = vimeo(&server).lookup("1").await.unwrap_err();
    assert!(matches!(err, ProviderError::Status(status) if status.as_u16() == 404));
}

#[tokio::test]
async fn vimeo_malformed_body_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/oembed.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
        .mount(&server)
        .await;

    let err = vimeo(&server).lookup("1").await.unwrap_err();
    assert!(matches!(err, ProviderError::Malformed(_)));
}

#[tokio::test]
async fn slow_provider_hits_client_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/oembed.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "thumbnail_url": "https://i.vimeocdn.com/video/1.jpg" }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let provider = VimeoProvider::new(
        http_client(Duration::from_millis(100)).unwrap(),
        format!("{}/api/oembed.json", server.uri()),
    );
    let err = provider.lookup("1").await.unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)));
}

#[tokio::test]
async fn youtube_selects_largest_declared_thumbnail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/videos"))
        .and(query_param("part", "id,snippet"))
        .and(query_param("id", "dQw4w9WgXcQ"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "youtube#videoListResponse",
            "items": [{
                "id": "dQw4w9WgXcQ",
                "snippet": {
                    "title": "Never Gonna Give You Up",
                    "thumbnails": {
                        "maxres": { "url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg", "width": 1280, "height": 720 },
                        "default": { "url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/default.jpg", "width": 120, "height": 90 },
                        "standard": { "url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/sddefault.jpg", "width": 640, "height": 480 },
                        "high": { "url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg", "width": 480, "height": 360 }
                    }
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let lookup = youtube(&server).lookup("dQw4w9WgXcQ").await.unwrap();
    assert_eq!(
        lookup,
        Lookup::Found {
            thumbnail_url: "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg".into()
        }
    );
}

#[tokio::test]
async fn youtube_empty_items_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    assert_eq!(youtube(&server).lookup("missing").await.unwrap(), Lookup::NotFound);
}

#[tokio::test]
async fn youtube_api_error_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/videos"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "quotaExceeded" }
        })))
        .mount(&server)
        .await;

    let err = youtube(&server).lookup("dQw4w9WgXcQ").await.unwrap_err();
    assert!(matches!(err, ProviderError::Status(status) if status.as_u16() == 403));
}
