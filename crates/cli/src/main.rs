//! `ripc` — thin admin driver over `ripcore-core`.
//!
//! Unlike a client talking to a running daemon over a wire protocol,
//! `ripc` opens the same SQLite file and age identity `ripcored` uses and
//! calls the core ports directly in-process: a thin driver over the core.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use ripcore_core::application::admin_ops::{self, APPLICATION_SCOPE};
use ripcore_core::domain::{ConfigSnapshot, JobId};
use ripcore_core::error::{AppError, StateError};
use ripcore_core::port::{JobQueue, SecureConfigStore};
use ripcore_crypto::{discover_keyfile, generate_and_write_identity, load_identity};
use ripcore_sqlite::{create_pool, run_migrations, schema_already_initialized, SqliteConfigStore, SqliteJobQueue};
use std::path::PathBuf;
use std::sync::Arc;
use tabled::Tabled;

const DEFAULT_DB_PATH: &str = "app.db";

#[derive(Parser)]
#[command(name = "ripc", about = "ripcore admin CLI", version)]
struct Cli {
    /// Path to the age identity keyfile (default discovery: age_key.txt, age.key)
    #[arg(long = "agekey", global = true, env = "RIPCORE_AGEKEY")]
    agekey: Option<PathBuf>,

    /// Path to the SQLite database file
    #[arg(long = "dbpath", global = true, env = "RIPCORE_DBPATH", default_value = DEFAULT_DB_PATH)]
    dbpath: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Application lifecycle
    App {
        #[command(subcommand)]
        cmd: AppCommands,
    },
    /// Versioned encrypted configuration store
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
    /// Identity secrets and OAuth2 provider table
    Auth {
        #[command(subcommand)]
        cmd: AuthCommands,
    },
    /// Durable job queue
    Job {
        #[command(subcommand)]
        cmd: JobCommands,
    },
    /// Logging infrastructure
    Log {
        #[command(subcommand)]
        cmd: LogCommands,
    },
}

#[derive(Subcommand)]
enum AppCommands {
    /// Run embedded migrations and seed generation 1 of scope `application`
    Create,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the value at a dotted path (e.g. `scheduler.max_jobs_per_tick`)
    Get { path: String },
    /// Set the value at a dotted path, saving a new generation
    Set { path: String, value: String },
    /// List every known dotted path in the current snapshot
    Paths,
    /// Print the entire decrypted plaintext of a generation (0 = latest)
    Dump {
        #[arg(default_value_t = 0)]
        generation: i64,
    },
    /// List generations of scope `application`
    List,
    /// Unified diff between a generation and the latest
    Diff { generation: i64 },
    /// Roll back scope `application` to a prior generation
    Rollback { generation: i64 },
    /// Save raw content read from a file as a new generation
    Save {
        file: PathBuf,
        format: String,
        description: String,
    },
    /// List every known scope
    Scopes,
    /// Seed generation 1 of scope `application` if absent
    Init,
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Regenerate every identity secret
    RotateJwtSecrets,
    /// Add a skeleton OAuth2 provider entry
    AddOauth2 { name: String },
    /// Remove an OAuth2 provider entry
    RmOauth2 { name: String },
}

#[derive(Subcommand)]
enum JobCommands {
    /// Insert a recurrent `backup_local` job
    AddBackup {
        /// Interval in seconds between runs
        interval_secs: i64,
        /// First run time, RFC3339
        first_run: DateTime<Utc>,
        #[arg(default_value_t = 3)]
        max_attempts: i32,
    },
    /// List jobs, most recently created first
    List {
        #[arg(default_value_t = 50)]
        limit: u32,
    },
    /// Delete a job outright
    Rm { id: String },
}

#[derive(Subcommand)]
enum LogCommands {
    /// Create the `logs/` directory ripcored's file appender writes into
    Init,
}

#[derive(Tabled)]
struct VersionRow {
    generation: i64,
    format: String,
    description: String,
    created_at: String,
}

#[derive(Tabled)]
struct JobRow {
    id: String,
    job_type: String,
    status: String,
    attempts: i32,
    max_attempts: i32,
    scheduled_for: String,
}

async fn open_store(cli: &Cli) -> Result<(Arc<dyn SecureConfigStore>, sqlx::SqlitePool)> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let agekey_path = discover_keyfile(cli.agekey.as_deref(), &cwd)
        .or_else(|_| -> Result<PathBuf, AppError> {
            let default_path = cwd.join("age_key.txt");
            generate_and_write_identity(&default_path)?;
            Ok(default_path)
        })
        .context("failed to resolve identity keyfile")?;
    let identity = Arc::new(load_identity(&agekey_path)?);

    let database_url = format!("sqlite://{}", cli.dbpath.display());
    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;

    let store: Arc<dyn SecureConfigStore> = Arc::new(SqliteConfigStore::new(pool.clone(), identity));
    Ok((store, pool))
}

async fn load_snapshot(store: &dyn SecureConfigStore) -> Result<ConfigSnapshot> {
    let (plaintext, _format) = store.get(APPLICATION_SCOPE, 0).await?;
    let text = String::from_utf8(plaintext).context("config plaintext is not utf8")?;
    toml::from_str(&text).context("failed to decode application config")
}

fn navigate<'a>(value: &'a toml::Value, path: &str) -> Option<&'a toml::Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_table()?.get(segment)?;
    }
    Some(current)
}

fn collect_paths(value: &toml::Value, prefix: &str, out: &mut Vec<String>) {
    match value {
        toml::Value::Table(table) => {
            for (key, child) in table {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                collect_paths(child, &path, out);
            }
        }
        _ => out.push(prefix.to_string()),
    }
}

fn set_path(value: &mut toml::Value, path: &str, new_value: toml::Value) -> Result<()> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop().context("empty path")?;
    let mut current = value;
    for segment in segments {
        current = current
            .as_table_mut()
            .context("path does not navigate a table")?
            .get_mut(segment)
            .with_context(|| format!("path not found in config: {segment}"))?;
    }
    current
        .as_table_mut()
        .context("path does not navigate a table")?
        .insert(last.to_string(), new_value);
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {e:#}", "Error:".red().bold());
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::App { cmd } => run_app(&cli, cmd).await,
        Commands::Config { cmd } => run_config(&cli, cmd).await,
        Commands::Auth { cmd } => run_auth(&cli, cmd).await,
        Commands::Job { cmd } => run_job(&cli, cmd).await,
        Commands::Log { cmd } => run_log(cmd).await,
    }
}

async fn run_app(cli: &Cli, cmd: &AppCommands) -> Result<()> {
    match cmd {
        AppCommands::Create => {
            let database_url = format!("sqlite://{}", cli.dbpath.display());
            let pool = create_pool(&database_url).await?;
            if schema_already_initialized(&pool).await? {
                anyhow::bail!(AppError::State(StateError::DatabaseAlreadyExists(
                    cli.dbpath.display().to_string()
                )));
            }
            run_migrations(&pool).await?;

            let cwd = std::env::current_dir()?;
            let agekey_path = cli.agekey.clone().unwrap_or_else(|| cwd.join("age_key.txt"));
            let identity = if agekey_path.is_file() {
                load_identity(&agekey_path)?
            } else {
                generate_and_write_identity(&agekey_path)?
            };

            let store = SqliteConfigStore::new(pool, Arc::new(identity));
            admin_ops::create_application(&store).await?;
            println!("{}", "Application created".green().bold());
            println!("  database: {}", cli.dbpath.display());
            println!("  identity: {}", agekey_path.display());
        }
    }
    Ok(())
}

async fn run_config(cli: &Cli, cmd: &ConfigCommands) -> Result<()> {
    let (store, _pool) = open_store(cli).await?;

    match cmd {
        ConfigCommands::Get { path } => {
            let snapshot = load_snapshot(store.as_ref()).await?;
            let value = toml::Value::try_from(&snapshot)?;
            let found = navigate(&value, path)
                .with_context(|| format!("path not found in config: {path}"))?;
            println!("{found}");
        }
        ConfigCommands::Set { path, value } => {
            let snapshot = load_snapshot(store.as_ref()).await?;
            let mut doc = toml::Value::try_from(&snapshot)?;
            let parsed: toml::Value = toml::from_str(value).unwrap_or(toml::Value::String(value.clone()));
            set_path(&mut doc, path, parsed)?;
            let updated: ConfigSnapshot = doc.try_into()?;
            let plaintext = toml::to_string_pretty(&updated)?;
            let generation = store
                .save(APPLICATION_SCOPE, plaintext.as_bytes(), "toml", &format!("Set {path}"))
                .await?;
            println!("{} generation {generation}", "Saved".green().bold());
        }
        ConfigCommands::Paths => {
            let snapshot = load_snapshot(store.as_ref()).await?;
            let value = toml::Value::try_from(&snapshot)?;
            let mut paths = Vec::new();
            collect_paths(&value, "", &mut paths);
            paths.sort();
            for path in paths {
                println!("{path}");
            }
        }
        ConfigCommands::Dump { generation } => {
            let (plaintext, format) = store.get(APPLICATION_SCOPE, *generation).await?;
            println!("# format: {format}");
            println!("{}", String::from_utf8_lossy(&plaintext));
        }
        ConfigCommands::List => {
            let versions = store.list_versions(APPLICATION_SCOPE).await?;
            let rows: Vec<VersionRow> = versions
                .into_iter()
                .map(|v| VersionRow {
                    generation: v.generation,
                    format: v.format,
                    description: v.description,
                    created_at: v.created_at.to_rfc3339(),
                })
                .collect();
            println!("{}", tabled::Table::new(rows));
        }
        ConfigCommands::Diff { generation } => {
            let diff = store.diff(APPLICATION_SCOPE, *generation).await?;
            if diff.is_empty() {
                println!("{}", "(no differences)".yellow());
            } else {
                print!("{diff}");
            }
        }
        ConfigCommands::Rollback { generation } => {
            let new_gen = admin_ops::rollback(store.as_ref(), APPLICATION_SCOPE, *generation).await?;
            println!("{} generation {new_gen}", "Rolled back to".green().bold());
        }
        ConfigCommands::Save { file, format, description } => {
            let content = std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
            let generation = store.save(APPLICATION_SCOPE, &content, format, description).await?;
            println!("{} generation {generation}", "Saved".green().bold());
        }
        ConfigCommands::Scopes => {
            for scope in store.list_scopes().await? {
                println!("{scope}");
            }
        }
        ConfigCommands::Init => match admin_ops::create_application(store.as_ref()).await {
            Ok(()) => println!("{}", "Initialized generation 1 of scope `application`".green().bold()),
            Err(AppError::State(StateError::DatabaseAlreadyExists(_))) => {
                println!("{}", "Scope `application` already initialized".yellow());
            }
            Err(e) => return Err(e.into()),
        },
    }
    Ok(())
}

async fn run_auth(cli: &Cli, cmd: &AuthCommands) -> Result<()> {
    let (store, _pool) = open_store(cli).await?;
    match cmd {
        AuthCommands::RotateJwtSecrets => {
            let generation = admin_ops::rotate_identity_secrets(store.as_ref()).await?;
            println!("{} generation {generation}", "Secrets rotated,".green().bold());
        }
        AuthCommands::AddOauth2 { name } => {
            let generation = admin_ops::add_oauth2_provider(store.as_ref(), name).await?;
            println!("{} '{name}' (generation {generation})", "Added OAuth2 provider".green().bold());
        }
        AuthCommands::RmOauth2 { name } => {
            let generation = admin_ops::remove_oauth2_provider(store.as_ref(), name).await?;
            println!("{} '{name}' (generation {generation})", "Removed OAuth2 provider".green().bold());
        }
    }
    Ok(())
}

async fn run_job(cli: &Cli, cmd: &JobCommands) -> Result<()> {
    let database_url = format!("sqlite://{}", cli.dbpath.display());
    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;
    let time_provider = Arc::new(ripcore_core::port::time_provider::SystemTimeProvider);
    let queue = SqliteJobQueue::new(pool, time_provider);

    match cmd {
        JobCommands::AddBackup { interval_secs, first_run, max_attempts } => {
            admin_ops::add_backup_job(
                &queue,
                chrono::Duration::seconds(*interval_secs),
                *first_run,
                *max_attempts,
            )
            .await?;
            println!("{}", "Recurrent backup job inserted".green().bold());
        }
        JobCommands::List { limit } => {
            let jobs = queue.list(*limit).await?;
            let rows: Vec<JobRow> = jobs
                .into_iter()
                .map(|j| JobRow {
                    id: j.id.to_string(),
                    job_type: j.job_type.to_string(),
                    status: j.status.to_string(),
                    attempts: j.attempts,
                    max_attempts: j.max_attempts,
                    scheduled_for: j.scheduled_for.to_rfc3339(),
                })
                .collect();
            println!("{}", tabled::Table::new(rows));
        }
        JobCommands::Rm { id } => {
            let job_id: JobId = id.parse().context("invalid job id")?;
            queue.delete(job_id).await?;
            println!("{} {id}", "Deleted job".green().bold());
        }
    }
    Ok(())
}

async fn run_log(cmd: &LogCommands) -> Result<()> {
    match cmd {
        LogCommands::Init => {
            std::fs::create_dir_all("logs").context("failed to create logs directory")?;
            println!("{}", "logs/ directory ready".green().bold());
        }
    }
    Ok(())
}
