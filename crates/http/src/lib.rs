//! `HttpHandler` adapters for the lifecycle supervisor.
//!
//! Two flavors share one implementation: the application's own request
//! handler (an arbitrary `axum::Router` handed in by the composition root,
//! optionally served over TLS), and a trivial permanent-redirect listener
//! that sends plain HTTP to the canonical HTTPS base URL when TLS is
//! enabled. Grounded on `fourthplaces-mntogether/packages/server`'s
//! `axum::serve` + `tokio::net::TcpListener` pattern, the closest
//! production axum+tower+tower-http stack in the retrieval pack.

mod redirect;
mod tls;

pub use redirect::redirect_router;
pub use tls::load_rustls_config;

use async_trait::async_trait;
use axum::Router;
use ripcore_core::error::{AppError, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Per-request ceiling applied to every handler the supervisor serves.
/// Independent of the scheduler's per-job timeout and the
/// shutdown-graceful timeout — this one bounds a single HTTP
/// request/response cycle.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An `axum::Router`-backed `HttpHandler`, served either plaintext or over
/// TLS depending on how it was constructed. `serve` consumes the router on
/// first call; a second call is a programmer error, matching the
/// supervisor's "each handler is served exactly once" contract.
pub struct AxumHttpHandler {
    addr: SocketAddr,
    router: Mutex<Option<Router>>,
    tls: Option<axum_server::tls_rustls::RustlsConfig>,
    shutdown_token: CancellationToken,
    finished: AtomicBool,
    finished_notify: Notify,
}

impl AxumHttpHandler {
    /// Plaintext handler bound to `addr`.
    pub fn plain(addr: SocketAddr, router: Router) -> Self {
        Self::new(addr, router, None)
    }

    /// TLS handler bound to `addr`, terminating rustls with `tls`.
    pub fn tls(addr: SocketAddr, router: Router, tls: axum_server::tls_rustls::RustlsConfig) -> Self {
        Self::new(addr, router, Some(tls))
    }

    fn new(addr: SocketAddr, router: Router, tls: Option<axum_server::tls_rustls::RustlsConfig>) -> Self {
        let router = router
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT));
        Self {
            addr,
            router: Mutex::new(Some(router)),
            tls,
            shutdown_token: CancellationToken::new(),
            finished: AtomicBool::new(false),
            finished_notify: Notify::new(),
        }
    }

    fn mark_finished(&self) {
        self.finished.store(true, Ordering::SeqCst);
        self.finished_notify.notify_waiters();
    }
}

#[async_trait]
impl ripcore_core::application::HttpHandler for AxumHttpHandler {
    async fn serve(&self, error_tx: mpsc::Sender<Result<()>>) -> Result<()> {
        let router = self
            .router
            .lock()
            .expect("router mutex poisoned")
            .take()
            .expect("AxumHttpHandler::serve called more than once");

        let token = self.shutdown_token.clone();
        info!(addr = %self.addr, tls = self.tls.is_some(), "http handler listening");

        let result = if let Some(tls) = &self.tls {
            axum_server::bind_rustls(self.addr, tls.clone())
                .handle({
                    let handle = axum_server::Handle::new();
                    let shutdown_handle = handle.clone();
                    tokio::spawn(async move {
                        token.cancelled().await;
                        shutdown_handle.graceful_shutdown(Some(Duration::from_secs(0)));
                    });
                    handle
                })
                .serve(router.into_make_service())
                .await
                .map_err(|e| AppError::Internal(format!("https listener failed: {e}")))
        } else {
            let listener = tokio::net::TcpListener::bind(self.addr)
                .await
                .map_err(|e| AppError::Internal(format!("http bind failed: {e}")))?;
            axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
                .map_err(|e| AppError::Internal(format!("http listener failed: {e}")))
        };

        self.mark_finished();
        if let Err(ref e) = result {
            let _ = error_tx.send(Err(AppError::Internal(e.to_string()))).await;
        }
        result
    }

    async fn shutdown(&self, _ctx: CancellationToken, timeout: Duration) -> Result<()> {
        // `notified()` registers the waiter before we check `finished`, so a
        // `notify_waiters()` racing with this call can never be missed.
        let notified = self.finished_notify.notified();
        if self.finished.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.shutdown_token.cancel();

        if tokio::time::timeout(timeout, notified).await.is_err()
            && !self.finished.load(Ordering::SeqCst)
        {
            warn!("http handler shutdown timed out");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripcore_core::application::HttpHandler;
    use std::sync::Arc;

    #[tokio::test]
    async fn serves_then_shuts_down_within_timeout() {
        let router = Router::new().route("/health", axum::routing::get(|| async { "ok" }));
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let handler = Arc::new(AxumHttpHandler::plain(addr, router));

        let (error_tx, mut error_rx) = mpsc::channel(1);
        let serving = Arc::clone(&handler);
        let serve_task = tokio::spawn(async move { serving.serve(error_tx).await });

        // Give the listener a moment to bind before tearing it down.
        tokio::time::sleep(Duration::from_millis(50)).await;

        handler
            .shutdown(CancellationToken::new(), Duration::from_secs(1))
            .await
            .unwrap();

        let served = tokio::time::timeout(Duration::from_secs(1), serve_task)
            .await
            .expect("serve task did not finish after shutdown")
            .unwrap();
        assert!(served.is_ok());
        assert!(error_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn shutdown_before_serve_returns_immediately_is_not_supported() {
        // shutdown() only makes sense after serve() has been spawned; this
        // test documents that calling it on a freshly constructed, never
        // served handler still completes within the timeout rather than
        // hanging forever.
        let router = Router::new();
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let handler = AxumHttpHandler::plain(addr, router);
        let result = tokio::time::timeout(
            Duration::from_millis(200),
            handler.shutdown(CancellationToken::new(), Duration::from_millis(100)),
        )
        .await;
        assert!(result.is_ok());
    }
}
