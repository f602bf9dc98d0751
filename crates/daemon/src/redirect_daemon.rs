//! Adapts the HTTPS-redirect listener (`ripcore_http::redirect_router`)
//! to the supervisor's `Daemon` contract so it runs alongside the
//! scheduler under the same ordered start/stop protocol, while the TLS
//! handler itself remains the supervisor's single `HttpHandler`.

use async_trait::async_trait;
use ripcore_core::application::{Daemon, HttpHandler};
use ripcore_core::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

pub struct HttpRedirectDaemon {
    inner: Arc<dyn HttpHandler>,
}

impl HttpRedirectDaemon {
    pub fn new(inner: Arc<dyn HttpHandler>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Daemon for HttpRedirectDaemon {
    fn name(&self) -> &str {
        "https-redirect"
    }

    async fn start(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        let (error_tx, mut error_rx) = mpsc::channel(1);
        tokio::spawn(async move {
            if let Err(e) = inner.serve(error_tx).await {
                error!(err = %e, "https-redirect listener exited with error");
            }
        });
        // Drain (and log) any later runtime errors; the redirect listener
        // is a convenience, not load-bearing, so its failures never flow
        // into the supervisor's central error channel.
        tokio::spawn(async move {
            while let Some(Err(e)) = error_rx.recv().await {
                error!(err = %e, "https-redirect listener runtime error");
            }
        });
        Ok(())
    }

    async fn stop(&self, ctx: CancellationToken, timeout: Duration) -> Result<()> {
        self.inner.shutdown(ctx, timeout).await
    }
}
