//! Admin operation scenarios exercised against a real SQLite-backed
//! config store and job queue, the same storage each admin op runs over
//! in production.

use ripcore_core::application::admin_ops::{
    self, add_backup_job, add_oauth2_provider, create_application, remove_oauth2_provider,
    rotate_identity_secrets, APPLICATION_SCOPE,
};
use ripcore_core::domain::ConfigSnapshot;
use ripcore_core::error::{AppError, StateError, ValidationError};
use ripcore_core::port::{JobQueue, SecureConfigStore};
use ripcore_sqlite::{create_pool, run_migrations, SqliteConfigStore, SqliteJobQueue};
use std::sync::Arc;

async fn setup_store() -> SqliteConfigStore {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    let identity = Arc::new(age::x25519::Identity::generate());
    SqliteConfigStore::new(pool, identity)
}

async fn load(store: &dyn SecureConfigStore) -> ConfigSnapshot {
    let (plaintext, _) = store.get(APPLICATION_SCOPE, 0).await.unwrap();
    toml::from_str(&String::from_utf8(plaintext).unwrap()).unwrap()
}

/// `app create` seeds generation 1 of scope `application` with a default
/// configuration, and refuses to run a second time.
#[tokio::test]
async fn create_application_seeds_defaults_once() {
    let store = setup_store().await;
    create_application(&store).await.unwrap();

    let versions = store.list_versions(APPLICATION_SCOPE).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].generation, 1);

    let snapshot = load(&store).await;
    assert!(snapshot.oauth_providers.is_empty());

    let err = create_application(&store).await.unwrap_err();
    assert!(matches!(err, AppError::State(StateError::DatabaseAlreadyExists(_))));
}

/// Rotating identity secrets replaces both JWT secrets and saves a new
/// generation; the old secrets never reappear.
#[tokio::test]
async fn rotate_identity_secrets_replaces_both_secrets() {
    let store = setup_store().await;
    create_application(&store).await.unwrap();
    let before = load(&store).await;

    let new_gen = rotate_identity_secrets(&store).await.unwrap();
    assert_eq!(new_gen, 2);

    let after = load(&store).await;
    assert_ne!(before.identity_secrets.jwt_signing_secret, after.identity_secrets.jwt_signing_secret);
    assert_ne!(before.identity_secrets.jwt_refresh_secret, after.identity_secrets.jwt_refresh_secret);
    assert!(after.identity_secrets.jwt_signing_secret.len() >= 32);
}

/// Add/remove OAuth provider: a fresh provider gets a capitalised
/// display name, the conventional callback path, PKCE on, empty
/// credentials; a duplicate add fails; removal leaves no trace.
#[tokio::test]
async fn add_remove_oauth_provider_scenario() {
    let store = setup_store().await;
    create_application(&store).await.unwrap();

    add_oauth2_provider(&store, "github").await.unwrap();
    let snapshot = load(&store).await;
    let provider = snapshot.oauth_providers.get("github").unwrap();
    assert_eq!(provider.display_name, "Github");
    assert_eq!(provider.callback_path, "/oauth2/github/callback");
    assert!(provider.pkce_enabled);
    assert!(provider.client_id.is_empty());
    assert!(provider.client_secret.is_empty());

    let err = add_oauth2_provider(&store, "github").await.unwrap_err();
    assert!(matches!(err, AppError::State(StateError::ProviderAlreadyExists(_))));

    remove_oauth2_provider(&store, "github").await.unwrap();
    let snapshot = load(&store).await;
    assert!(!snapshot.oauth_providers.contains_key("github"));

    let err = remove_oauth2_provider(&store, "github").await.unwrap_err();
    assert!(matches!(err, AppError::State(StateError::ProviderNotFound(_))));
}

/// Rollback delegated through `admin_ops` behaves exactly like the
/// store's own rollback.
#[tokio::test]
async fn admin_ops_rollback_delegates_to_store() {
    let store = setup_store().await;
    create_application(&store).await.unwrap();
    add_oauth2_provider(&store, "github").await.unwrap();

    let new_gen = admin_ops::rollback(&store, APPLICATION_SCOPE, 1).await.unwrap();
    let snapshot = load(&store).await;
    assert!(snapshot.oauth_providers.is_empty());
    assert_eq!(store.list_versions(APPLICATION_SCOPE).await.unwrap().len(), new_gen as usize);
}

/// Adding a recurrent backup job inserts it with the fixed job type and
/// an empty payload; rejecting `max_attempts < 1` at the admin-op
/// boundary.
#[tokio::test]
async fn add_backup_job_scenario() {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    let time = Arc::new(ripcore_core::port::time_provider::SystemTimeProvider);
    let queue = SqliteJobQueue::new(pool, time);

    let first_run = chrono::Utc::now() + chrono::Duration::seconds(5);
    add_backup_job(&queue, chrono::Duration::minutes(30), first_run, 3).await.unwrap();

    let jobs = queue.list(10).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_type.as_str(), "backup_local");
    assert!(jobs[0].recurrent);
    assert_eq!(jobs[0].interval_secs, 1800);
    assert!(jobs[0].payload.is_empty());
    assert!(jobs[0].payload_extra.is_empty());

    let err = add_backup_job(&queue, chrono::Duration::minutes(30), first_run, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(ValidationError::InvalidMaxAttempts)));
}

/// A non-positive interval is rejected as a validation error rather than
/// panicking the process.
#[tokio::test]
async fn add_backup_job_rejects_non_positive_interval() {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    let time = Arc::new(ripcore_core::port::time_provider::SystemTimeProvider);
    let queue = SqliteJobQueue::new(pool, time);

    let first_run = chrono::Utc::now() + chrono::Duration::seconds(5);
    let err = add_backup_job(&queue, chrono::Duration::zero(), first_run, 3)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(ValidationError::Other(_))));

    let err = add_backup_job(&queue, chrono::Duration::seconds(-30), first_run, 3)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(ValidationError::Other(_))));

    assert!(queue.list(10).await.unwrap().is_empty());
}
