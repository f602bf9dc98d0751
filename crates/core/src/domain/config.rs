// Config Record / Snapshot Domain Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// A row in the versioned secure config store, keyed by `(scope, generation)`.
/// `content` is always ciphertext; plaintext is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub scope: String,
    /// 1-based, contiguous per scope. `0` on read means "latest".
    pub generation: i64,
    pub content: Vec<u8>,
    pub format: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Alias for "latest generation" used by `get`/`rollback` callers.
pub const LATEST_GENERATION: i64 = 0;

/// Decoded scheduler parameters (one section of the `ConfigSnapshot`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerParams {
    pub tick_interval: Duration,
    pub max_jobs_per_tick: u32,
    pub concurrency_multiplier: u32,
    pub job_timeout: Duration,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            max_jobs_per_tick: 50,
            concurrency_multiplier: 4,
            job_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpParams {
    pub address: String,
    pub https_address: Option<String>,
    pub tls_enabled: bool,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
    pub https_base_url: Option<String>,
    pub shutdown_graceful_timeout: Duration,
}

impl Default for HttpParams {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8080".to_string(),
            https_address: None,
            tls_enabled: false,
            tls_cert_path: None,
            tls_key_path: None,
            https_base_url: None,
            shutdown_graceful_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitParams {
    pub requests_per_second: u32,
    pub burst: u32,
}

impl Default for RateLimitParams {
    fn default() -> Self {
        Self {
            requests_per_second: 20,
            burst: 40,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentitySecrets {
    pub jwt_signing_secret: String,
    pub jwt_refresh_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthProvider {
    pub display_name: String,
    pub callback_path: String,
    pub client_id: String,
    pub client_secret: String,
    pub pkce_enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailParams {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from_address: String,
}

/// The decoded configuration, held behind an atomically swappable reference
/// by the config provider. Internally immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub scheduler: SchedulerParams,
    pub http: HttpParams,
    pub rate_limits: RateLimitParams,
    pub identity_secrets: IdentitySecrets,
    pub oauth_providers: BTreeMap<String, OAuthProvider>,
    pub mail: MailParams,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            scheduler: SchedulerParams::default(),
            http: HttpParams::default(),
            rate_limits: RateLimitParams::default(),
            identity_secrets: IdentitySecrets::default(),
            oauth_providers: BTreeMap::new(),
            mail: MailParams::default(),
        }
    }
}
