//! Admin operations - core-side operations invoked by the CLI
//!
//! Each operation either fully succeeds (persisted new state) or fails
//! with no partial effect, delegated to the queue's/store's transactional
//! primitives. Validation happens up front, before any port is touched.

use crate::domain::{ConfigSnapshot, JobType, NewJob, OAuthProvider};
use crate::error::{AppError, Result, StateError, ValidationError};
use crate::port::{JobQueue, SecureConfigStore};
use chrono::{DateTime, Utc};
use rand::Rng;

pub const APPLICATION_SCOPE: &str = "application";
const SECRET_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const SECRET_LEN: usize = 32;
const BACKUP_JOB_TYPE: &str = "backup_local";

fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    (0..SECRET_LEN)
        .map(|_| SECRET_ALPHABET[rng.gen_range(0..SECRET_ALPHABET.len())] as char)
        .collect()
}

/// Decode, mutate, re-encode a snapshot and save it as the scope's next
/// generation. Every admin op that touches `ConfigSnapshot` funnels
/// through this helper so the encode/decode format stays centralised.
async fn save_snapshot(
    store: &dyn SecureConfigStore,
    snapshot: &ConfigSnapshot,
    description: &str,
) -> Result<i64> {
    let plaintext = toml::to_string_pretty(snapshot)
        .map_err(|e| AppError::Serialization(crate::error::SerializationError::Marshal {
            format: "toml".to_string(),
            source: Box::new(e),
        }))?;
    store
        .save(APPLICATION_SCOPE, plaintext.as_bytes(), "toml", description)
        .await
}

async fn load_snapshot(store: &dyn SecureConfigStore) -> Result<ConfigSnapshot> {
    let (plaintext, _format) = store.get(APPLICATION_SCOPE, 0).await?;
    let text = String::from_utf8(plaintext)
        .map_err(|e| AppError::Internal(format!("config plaintext is not utf8: {e}")))?;
    toml::from_str(&text).map_err(|e| {
        AppError::Serialization(crate::error::SerializationError::Unmarshal {
            format: "toml".to_string(),
            source: Box::new(e),
        })
    })
}

/// Apply embedded schema migrations (delegated to the storage layer by the
/// caller) and persist a default configuration as generation 1 of scope
/// `application`. Fails if the scope already has a generation.
pub async fn create_application(store: &dyn SecureConfigStore) -> Result<()> {
    if !store.list_versions(APPLICATION_SCOPE).await?.is_empty() {
        return Err(AppError::State(StateError::DatabaseAlreadyExists(
            APPLICATION_SCOPE.to_string(),
        )));
    }
    save_snapshot(store, &ConfigSnapshot::default(), "Initial configuration").await?;
    Ok(())
}

/// Regenerate every identity secret and save the result as the next
/// generation.
pub async fn rotate_identity_secrets(store: &dyn SecureConfigStore) -> Result<i64> {
    let mut snapshot = load_snapshot(store).await?;
    snapshot.identity_secrets.jwt_signing_secret = generate_secret();
    snapshot.identity_secrets.jwt_refresh_secret = generate_secret();
    save_snapshot(store, &snapshot, "Rotate identity secrets").await
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn validate_provider_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(AppError::Validation(ValidationError::MissingArgument(
            "provider name".to_string(),
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(AppError::Validation(ValidationError::InvalidFlag(format!(
            "invalid oauth provider name: {name}"
        ))));
    }
    Ok(())
}

/// Insert a skeleton OAuth provider entry. Fails if `name` is already
/// present.
pub async fn add_oauth2_provider(store: &dyn SecureConfigStore, name: &str) -> Result<i64> {
    validate_provider_name(name)?;
    let mut snapshot = load_snapshot(store).await?;
    if snapshot.oauth_providers.contains_key(name) {
        return Err(AppError::State(StateError::ProviderAlreadyExists(
            name.to_string(),
        )));
    }
    snapshot.oauth_providers.insert(
        name.to_string(),
        OAuthProvider {
            display_name: capitalize(name),
            callback_path: format!("/oauth2/{name}/callback"),
            client_id: String::new(),
            client_secret: String::new(),
            pkce_enabled: true,
        },
    );
    save_snapshot(store, &snapshot, &format!("Add OAuth provider {name}")).await
}

/// Remove an OAuth provider entry. Fails if `name` is absent.
pub async fn remove_oauth2_provider(store: &dyn SecureConfigStore, name: &str) -> Result<i64> {
    validate_provider_name(name)?;
    let mut snapshot = load_snapshot(store).await?;
    if snapshot.oauth_providers.remove(name).is_none() {
        return Err(AppError::State(StateError::ProviderNotFound(
            name.to_string(),
        )));
    }
    save_snapshot(store, &snapshot, &format!("Remove OAuth provider {name}")).await
}

/// Roll back `scope` to `generation`.
pub async fn rollback(store: &dyn SecureConfigStore, scope: &str, generation: i64) -> Result<i64> {
    store.rollback(scope, generation).await
}

/// Insert a recurrent backup job with fixed `job_type = backup_local`.
pub async fn add_backup_job(
    queue: &dyn JobQueue,
    interval: chrono::Duration,
    first_run: DateTime<Utc>,
    max_attempts: i32,
) -> Result<()> {
    if max_attempts < 1 {
        return Err(AppError::Validation(ValidationError::InvalidMaxAttempts));
    }
    let next = NewJob::recurrent(
        JobType::new(BACKUP_JOB_TYPE),
        first_run,
        interval,
        max_attempts,
    )?;
    queue.insert(next).await?;
    Ok(())
}
