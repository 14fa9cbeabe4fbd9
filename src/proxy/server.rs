use crate::cache::{MemoryCache, RedisCache, ThumbnailCache};
use crate::config::Config;
use crate::providers::{http_client, image_client, VimeoProvider, YouTubeProvider};
use crate::proxy::handler::{handle_request, AppState};
use crate::resolver::Resolver;
use crate::transform::Transformer;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn};

/// How long in-flight connections get to finish after a shutdown signal.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ProxyServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    semaphore: Arc<Semaphore>,
    max_connections: usize,
}

impl ProxyServer {
    pub fn new(addr: SocketAddr, state: Arc<AppState>, max_connections: usize) -> Self {
        Self {
            addr,
            state,
            semaphore: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    /// Wires cache, providers and transformer from configuration.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = http_client(config.provider_timeout())?;
        let images = image_client(config.provider_timeout(), config.image_timeout())?;

        let mut resolver = Resolver::new(
            connect_cache(config).await,
            Transformer::from_credentials(
                config.transform_host.as_deref(),
                config.transform_token.as_deref(),
            ),
            config.error_thumbnail_url.clone(),
        )
        .with_cache_ttl(config.cache_ttl())
        .with_lookup_timeout(config.provider_timeout())
        .with_provider(Arc::new(VimeoProvider::new(
            client.clone(),
            config.vimeo_oembed_url.clone(),
        )));

        match config.youtube_api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(api_key) => {
                resolver = resolver.with_provider(Arc::new(YouTubeProvider::new(
                    client,
                    config.youtube_api_url.clone(),
                    api_key,
                )));
            }
            None => warn!("No YouTube API key configured, YouTube references will fall back"),
        }

        Ok(Self::new(
            config.socket_addr()?,
            Arc::new(AppState::new(resolver, images)),
            config.max_connections,
        ))
    }

    /// Serves until SIGTERM or Ctrl-C.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Accepts connections until `shutdown` completes, then lets open
    /// connections finish their current request for up to [`DRAIN_TIMEOUT`].
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Thumbnail server listening on http://{}", listener.local_addr()?);
        info!("- cache ttl: {}s", self.state.resolver().cache_ttl().as_secs());
        info!("- max connections: {}", self.max_connections);

        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::pin!(shutdown);

        loop {
            let permit = tokio::select! {
                permit = self.semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = &mut shutdown => break,
            };
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = &mut shutdown => break,
            };

            let state = self.state.clone();
            let mut stop = stop_rx.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let service = service_fn(move |req| handle_request(req, state.clone()));
                let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                tokio::pin!(conn);

                let result = tokio::select! {
                    result = conn.as_mut() => result,
                    _ = stop.changed() => {
                        conn.as_mut().graceful_shutdown();
                        conn.as_mut().await
                    }
                };
                if let Err(e) = result {
                    debug!(peer = %peer, error = %e, "Connection closed with error");
                }
            });
        }

        info!("Shutdown signal received, draining connections");
        drop(listener);
        let _ = stop_tx.send(true);

        // Every permit comes back once the last connection task ends.
        let all = u32::try_from(self.max_connections).unwrap_or(u32::MAX);
        match tokio::time::timeout(DRAIN_TIMEOUT, self.semaphore.acquire_many(all)).await {
            Ok(_) => info!("All connections closed"),
            Err(_) => warn!(
                open = self.max_connections - self.semaphore.available_permits(),
                "Drain timed out, dropping remaining connections"
            ),
        }
        Ok(())
    }
}

/// Resolves on SIGTERM or Ctrl-C.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to install SIGTERM handler"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Redis when configured and reachable, otherwise the in-process LRU.
async fn connect_cache(config: &Config) -> Arc<dyn ThumbnailCache> {
    if let Some(redis_url) = config.redis_url.as_deref().filter(|u| !u.is_empty()) {
        match RedisCache::connect(redis_url).await {
            Ok(cache) => return Arc::new(cache),
            Err(e) => warn!(error = %e, "Redis unavailable, using in-memory cache"),
        }
    }
    info!(
        capacity = config.memory_cache_capacity,
        "Using in-memory thumbnail cache"
    );
    Arc::new(MemoryCache::new(config.memory_cache_capacity))
}
