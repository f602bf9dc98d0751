//! Lifecycle supervisor - owns process lifetime
//!
//! Starts an HTTP request handler and an ordered set of background
//! daemons, watches termination/reload signals, and orchestrates bounded
//! parallel graceful shutdown.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A background component with a bounded start/stop lifecycle. The
/// scheduler is the primary daemon; others are injected by the
/// composition root.
#[async_trait]
pub trait Daemon: Send + Sync {
    fn name(&self) -> &str;
    async fn start(&self) -> Result<()>;
    async fn stop(&self, ctx: CancellationToken, timeout: Duration) -> Result<()>;
}

/// The HTTP request handler the supervisor starts and stops alongside the
/// daemons. Shaped for both the application's own handler and the
/// HTTPS-redirect listener.
#[async_trait]
pub trait HttpHandler: Send + Sync {
    async fn serve(&self, error_tx: mpsc::Sender<Result<()>>) -> Result<()>;
    async fn shutdown(&self, ctx: CancellationToken, timeout: Duration) -> Result<()>;
}

pub type ReloadCallback = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;
pub type ExitFn = Arc<dyn Fn(i32) + Send + Sync>;

/// Signals the supervisor reacts to. Decoupled
/// from any particular signal-delivery mechanism so that `infra-system`'s
/// `tokio::signal`-based source and a test-only in-memory source can share
/// this contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorSignal {
    Terminate,
    Reload,
}

#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn next(&mut self) -> SupervisorSignal;
}

pub struct Supervisor {
    daemons: Vec<Arc<dyn Daemon>>,
    http: Arc<dyn HttpHandler>,
    reload: ReloadCallback,
    exit_fn: ExitFn,
    shutdown_graceful_timeout: Duration,
}

impl Supervisor {
    pub fn new(
        daemons: Vec<Arc<dyn Daemon>>,
        http: Arc<dyn HttpHandler>,
        reload: ReloadCallback,
        exit_fn: ExitFn,
        shutdown_graceful_timeout: Duration,
    ) -> Self {
        Self {
            daemons,
            http,
            reload,
            exit_fn,
            shutdown_graceful_timeout,
        }
    }

    /// Runs startup, blocks on signals/errors, then runs shutdown. Exits
    /// via the injected `exit_fn` (never `std::process::exit` directly) so
    /// the whole sequence remains testable.
    pub async fn run(&self, mut signals: impl SignalSource) {
        // Buffered to at least 1 + daemon_count so neither the HTTP
        // listener nor any daemon can deadlock trying to report a
        // startup/runtime error.
        let (error_tx, mut error_rx) = mpsc::channel::<Result<()>>(1 + self.daemons.len());

        let http_error_tx = error_tx.clone();
        let http = Arc::clone(&self.http);
        tokio::spawn(async move {
            if let Err(e) = http.serve(http_error_tx.clone()).await {
                let _ = http_error_tx.send(Err(e)).await;
            }
        });

        let mut started: Vec<Arc<dyn Daemon>> = Vec::new();
        let mut startup_failed = false;
        for daemon in &self.daemons {
            match daemon.start().await {
                Ok(()) => started.push(Arc::clone(daemon)),
                Err(e) => {
                    error!(daemon = daemon.name(), err = %e, "daemon failed to start");
                    startup_failed = true;
                    break;
                }
            }
        }

        if startup_failed {
            self.rollback(&started).await;
            (self.exit_fn)(1);
            return;
        }

        info!("supervisor running");
        let exit_code = loop {
            tokio::select! {
                signal = signals.next() => match signal {
                    SupervisorSignal::Reload => {
                        if let Err(e) = (self.reload)().await {
                            error!(err = %e, "reload failed");
                        }
                        continue;
                    }
                    SupervisorSignal::Terminate => break 0,
                },
                maybe_err = error_rx.recv() => {
                    match maybe_err {
                        Some(Err(e)) => {
                            error!(err = %e, "runtime error, shutting down");
                            break 1;
                        }
                        Some(Ok(())) => continue,
                        None => break 0,
                    }
                }
            }
        };

        let shutdown_ok = self.shutdown(&started).await;
        // Emit a non-zero exit on any shutdown error, zero
        // otherwise" — a shutdown failure escalates an otherwise-clean
        // exit but never downgrades a runtime error already observed.
        let final_code = if exit_code != 0 {
            exit_code
        } else if shutdown_ok {
            0
        } else {
            1
        };
        (self.exit_fn)(final_code);
    }

    async fn rollback(&self, started: &[Arc<dyn Daemon>]) {
        let ctx = CancellationToken::new();
        ctx.cancel();
        for daemon in started.iter().rev() {
            if let Err(e) = daemon.stop(ctx.clone(), self.shutdown_graceful_timeout).await {
                warn!(daemon = daemon.name(), err = %e, "rollback stop failed");
            }
        }
        // A daemon startup failure must also tear down the
        // HTTP listener, not just the daemons that had already started.
        if let Err(e) = self.http.shutdown(ctx, self.shutdown_graceful_timeout).await {
            warn!(err = %e, "rollback http shutdown failed");
        }
    }

    /// Runs the bounded parallel shutdown. Returns `true` iff the
    /// HTTP handler and every daemon stopped cleanly within the timeout;
    /// `run` maps a `false` here to a non-zero process exit.
    async fn shutdown(&self, started: &[Arc<dyn Daemon>]) -> bool {
        let ctx = CancellationToken::new();
        ctx.cancel();
        let timeout = self.shutdown_graceful_timeout;

        let http_fut = self.http.shutdown(ctx.clone(), timeout);
        let daemon_futs = started
            .iter()
            .map(|d| d.stop(ctx.clone(), timeout))
            .collect::<Vec<_>>();

        let (http_result, daemon_results) = tokio::time::timeout(
            timeout,
            futures::future::join(http_fut, futures::future::join_all(daemon_futs)),
        )
        .await
        .unwrap_or_else(|_| {
            (
                Err(AppError::Internal("shutdown timed out".to_string())),
                Vec::new(),
            )
        });

        let mut ok = true;
        if let Err(e) = http_result {
            error!(err = %e, "http shutdown error");
            ok = false;
        }
        for result in daemon_results {
            if let Err(e) = result {
                error!(err = %e, "daemon shutdown error");
                ok = false;
            }
        }
        ok
    }
}
