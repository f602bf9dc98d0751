//! `ripcored` — composition root and lifecycle supervisor binary.
//!
//! Wires the secure config store, the atomically swappable config
//! provider, the durable queue, the scheduler, and an axum HTTP handler
//! behind the `Supervisor`, then blocks on signals until shutdown.

mod handlers;
mod redirect_daemon;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use redirect_daemon::HttpRedirectDaemon;
use ripcore_core::application::admin_ops::APPLICATION_SCOPE;
use ripcore_core::application::{
    ConfigProvider, Daemon, ExecutorRegistry, Scheduler, SchedulerDaemon, Supervisor,
};
use ripcore_core::domain::{ConfigSnapshot, JobType};
use ripcore_core::error::{AppError, StateError};
use ripcore_core::port::SecureConfigStore;
use ripcore_crypto::{discover_keyfile, load_identity};
use ripcore_sqlite::{create_pool, run_migrations, SqliteConfigStore, SqliteJobQueue};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_DB_PATH: &str = "app.db";

#[derive(Parser)]
#[command(name = "ripcored", about = "ripcore lifecycle supervisor daemon", version)]
struct Args {
    /// Path to the age identity keyfile (default discovery: age_key.txt, age.key)
    #[arg(long = "agekey", env = "RIPCORE_AGEKEY")]
    agekey: Option<PathBuf>,

    /// Path to the SQLite database file
    #[arg(long = "dbpath", env = "RIPCORE_DBPATH", default_value = DEFAULT_DB_PATH)]
    dbpath: PathBuf,
}

fn init_logging() {
    let log_format = std::env::var("RIPCORE_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ripcore=info"));

    let file_appender = tracing_appender::rolling::daily("logs", "ripcored.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    // Leaked deliberately: the guard must outlive the process, and
    // `ripcored` never exits the logging scope except via `std::process::exit`.
    Box::leak(Box::new(guard));

    match log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .with(fmt::layer().json().with_writer(file_writer))
            .init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .with(fmt::layer().with_ansi(false).with_writer(file_writer))
            .init(),
    }
}

async fn load_snapshot(store: &dyn SecureConfigStore) -> Result<ConfigSnapshot> {
    let (plaintext, _format) = store.get(APPLICATION_SCOPE, 0).await.map_err(|e| match e {
        AppError::State(StateError::ScopeNotFound(_)) => anyhow::anyhow!(
            "no application configuration found; run `ripc app create` first"
        ),
        other => other.into(),
    })?;
    let text = String::from_utf8(plaintext).context("config plaintext is not utf8")?;
    toml::from_str(&text).context("failed to decode application config")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();
    if let Err(e) = telemetry::init_telemetry() {
        tracing::warn!(err = ?e, "failed to initialize OpenTelemetry (continuing without it)");
    }

    info!(version = env!("CARGO_PKG_VERSION"), "ripcored starting");

    if !args.dbpath.is_file() {
        anyhow::bail!(
            "Error: {}",
            AppError::State(StateError::DatabaseNotFound(args.dbpath.display().to_string()))
        );
    }

    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let agekey_path = discover_keyfile(args.agekey.as_deref(), &cwd)?;
    let identity = Arc::new(load_identity(&agekey_path)?);

    let database_url = format!("sqlite://{}", args.dbpath.display());
    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;

    let store: Arc<dyn SecureConfigStore> =
        Arc::new(SqliteConfigStore::new(pool.clone(), identity.clone()));
    let initial_snapshot = load_snapshot(store.as_ref()).await?;

    let provider = Arc::new(ConfigProvider::new(initial_snapshot));

    let executor = Arc::new(ExecutorRegistry::new());
    executor.register(JobType::new("backup_local"), Arc::new(handlers::LoggingBackupHandler));

    let time_provider = Arc::new(ripcore_core::port::time_provider::SystemTimeProvider);
    let queue = Arc::new(SqliteJobQueue::new(pool.clone(), time_provider));

    let worker_id = format!("ripcored-{}", ripcore_system::process_id());
    let scheduler = Arc::new(Scheduler::new(
        queue.clone(),
        executor.clone(),
        provider.clone(),
        worker_id,
    ));
    let scheduler_daemon: Arc<dyn Daemon> = Arc::new(SchedulerDaemon::new(scheduler));

    let snapshot = provider.get();
    let shutdown_timeout = snapshot.http.shutdown_graceful_timeout;

    let health_router = axum::Router::new().route(
        "/healthz",
        axum::routing::get(|| async { "ok" }),
    );

    let mut daemons: Vec<Arc<dyn Daemon>> = vec![scheduler_daemon];

    let http: Arc<dyn ripcore_core::application::HttpHandler> = if snapshot.http.tls_enabled {
        let cert_path = snapshot
            .http
            .tls_cert_path
            .as_ref()
            .context("tls_enabled but no tls_cert_path configured")?;
        let key_path = snapshot
            .http
            .tls_key_path
            .as_ref()
            .context("tls_enabled but no tls_key_path configured")?;
        let tls_config = ripcore_http::load_rustls_config(
            std::path::Path::new(cert_path),
            std::path::Path::new(key_path),
        )
        .await?;

        let https_addr = snapshot
            .http
            .https_address
            .as_deref()
            .unwrap_or(&snapshot.http.address)
            .parse()
            .context("invalid https_address")?;
        let tls_handler: Arc<dyn ripcore_core::application::HttpHandler> =
            Arc::new(ripcore_http::AxumHttpHandler::tls(https_addr, health_router, tls_config));

        if let Some(base_url) = snapshot.http.https_base_url.clone() {
            let redirect_addr = snapshot.http.address.parse().context("invalid http address")?;
            let redirect_handler: Arc<dyn ripcore_core::application::HttpHandler> = Arc::new(
                ripcore_http::AxumHttpHandler::plain(redirect_addr, ripcore_http::redirect_router(base_url)),
            );
            daemons.push(Arc::new(HttpRedirectDaemon::new(redirect_handler)));
        }

        tls_handler
    } else {
        let addr = snapshot.http.address.parse().context("invalid http address")?;
        Arc::new(ripcore_http::AxumHttpHandler::plain(addr, health_router))
    };

    let reload_store = Arc::clone(&store);
    let reload_provider = Arc::clone(&provider);
    let reload: ripcore_core::application::ReloadCallback = Arc::new(move || {
        let store = Arc::clone(&reload_store);
        let provider = Arc::clone(&reload_provider);
        Box::pin(async move {
            let snapshot = load_snapshot(store.as_ref())
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
            provider.update(snapshot);
            info!("configuration reloaded");
            Ok(())
        })
    });

    let exit_fn: ripcore_core::application::ExitFn = Arc::new(|code| std::process::exit(code));

    let supervisor = Supervisor::new(daemons, http, reload, exit_fn, shutdown_timeout);
    let signals = ripcore_system::UnixSignalSource::new().context("failed to install signal handlers")?;

    // `Supervisor::run` never returns `Err`; shutdown exit codes are
    // reported via the injected `exit_fn` so the whole sequence stays
    // testable.
    supervisor.run(signals).await;

    Ok(())
}
