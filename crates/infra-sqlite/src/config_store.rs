//! `SqliteConfigStore` — versioned encrypted config store.
//!
//! Persistence lives here (the `config` table, append-only by
//! construction); the encryption protocol is delegated to
//! `ripcore-crypto::{encrypt, decrypt}` over a process-wide identity and
//! its derived recipient. The format tag and description are stored in
//! the clear.

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ripcore_core::domain::ConfigRecord;
use ripcore_core::error::{AppError, Result, SerializationError, StateError};
use ripcore_core::port::SecureConfigStore;
use similar::TextDiff;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

pub struct SqliteConfigStore {
    pool: SqlitePool,
    identity: Arc<age::x25519::Identity>,
    recipient: age::x25519::Recipient,
}

impl SqliteConfigStore {
    pub fn new(pool: SqlitePool, identity: Arc<age::x25519::Identity>) -> Self {
        let recipient = identity.to_public();
        Self {
            pool,
            identity,
            recipient,
        }
    }

    async fn max_generation(&self, scope: &str) -> Result<i64> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(generation) FROM config WHERE scope = ?")
                .bind(scope)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        Ok(max.unwrap_or(0))
    }

    async fn resolve_generation(&self, scope: &str, generation: i64) -> Result<i64> {
        let latest = self.max_generation(scope).await?;
        if latest == 0 {
            return Err(AppError::State(StateError::ScopeNotFound(scope.to_string())));
        }
        if generation == 0 {
            return Ok(latest);
        }
        if generation < 1 || generation > latest {
            return Err(AppError::State(StateError::InvalidGeneration(generation)));
        }
        Ok(generation)
    }

    /// Parse-then-reserialize `plaintext` through its declared format, so
    /// `diff` compares canonical representations rather than raw bytes.
    fn canonicalize(plaintext: &[u8], format: &str) -> Result<String> {
        let text = String::from_utf8(plaintext.to_vec())
            .map_err(|e| AppError::Internal(format!("config plaintext is not utf8: {e}")))?;
        match format {
            "toml" => {
                let value: toml::Value = toml::from_str(&text).map_err(|e| {
                    AppError::Serialization(SerializationError::Unmarshal {
                        format: format.to_string(),
                        source: Box::new(e),
                    })
                })?;
                toml::to_string_pretty(&value).map_err(|e| {
                    AppError::Serialization(SerializationError::Marshal {
                        format: format.to_string(),
                        source: Box::new(e),
                    })
                })
            }
            // Unrecognized formats pass through verbatim; the declared
            // tag is preserved but there is no canonical parser for it.
            _ => Ok(text),
        }
    }
}

#[async_trait]
impl SecureConfigStore for SqliteConfigStore {
    async fn get(&self, scope: &str, generation: i64) -> Result<(Vec<u8>, String)> {
        let resolved = self.resolve_generation(scope, generation).await?;

        let row = sqlx::query("SELECT content, format FROM config WHERE scope = ? AND generation = ?")
            .bind(scope)
            .bind(resolved)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(AppError::State(StateError::InvalidGeneration(resolved)))?;

        let content: Vec<u8> = row.try_get("content").map_err(map_sqlx_error)?;
        let format: String = row.try_get("format").map_err(map_sqlx_error)?;

        let plaintext = ripcore_crypto::decrypt(&self.identity, &content)?;
        Ok((plaintext, format))
    }

    async fn save(&self, scope: &str, plaintext: &[u8], format: &str, description: &str) -> Result<i64> {
        let ciphertext = ripcore_crypto::encrypt(&self.recipient, plaintext)?;
        let next_generation = self.max_generation(scope).await? + 1;
        let now: DateTime<Utc> = Utc::now();

        sqlx::query(
            "INSERT INTO config (scope, generation, content, format, description, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(scope)
        .bind(next_generation)
        .bind(&ciphertext)
        .bind(format)
        .bind(description)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(next_generation)
    }

    async fn list_scopes(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT scope FROM config ORDER BY scope")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter()
            .map(|row| row.try_get::<String, _>("scope").map_err(map_sqlx_error))
            .collect()
    }

    async fn list_versions(&self, scope: &str) -> Result<Vec<ConfigRecord>> {
        let rows = sqlx::query(
            "SELECT scope, generation, content, format, description, created_at FROM config WHERE scope = ? ORDER BY created_at DESC",
        )
        .bind(scope)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(ConfigRecord {
                    scope: row.try_get("scope").map_err(map_sqlx_error)?,
                    generation: row.try_get("generation").map_err(map_sqlx_error)?,
                    content: row.try_get("content").map_err(map_sqlx_error)?,
                    format: row.try_get("format").map_err(map_sqlx_error)?,
                    description: row.try_get("description").map_err(map_sqlx_error)?,
                    created_at: row.try_get("created_at").map_err(map_sqlx_error)?,
                })
            })
            .collect()
    }

    async fn diff(&self, scope: &str, generation: i64) -> Result<String> {
        let resolved = self.resolve_generation(scope, generation).await?;
        let latest = self.max_generation(scope).await?;

        let (old_plaintext, old_format) = self.get(scope, resolved).await?;
        let (new_plaintext, new_format) = self.get(scope, latest).await?;

        let old_canonical = Self::canonicalize(&old_plaintext, &old_format)?;
        let new_canonical = Self::canonicalize(&new_plaintext, &new_format)?;

        let text_diff = TextDiff::from_lines(&old_canonical, &new_canonical);
        let mut unified = text_diff.unified_diff();
        unified.header(&format!("{scope}@{resolved}"), &format!("{scope}@{latest}"));
        Ok(unified.to_string())
    }

    async fn rollback(&self, scope: &str, generation: i64) -> Result<i64> {
        // Unlike `get`, `0` is never an alias for "latest" here:
        // rolling back to generation 0 must fail outright.
        let latest = self.max_generation(scope).await?;
        if generation < 1 || generation > latest {
            return Err(AppError::State(StateError::InvalidGeneration(generation)));
        }

        let (plaintext, format) = self.get(scope, generation).await?;
        self.save(
            scope,
            &plaintext,
            &format,
            &format!("Rollback to generation {generation}"),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, migration::run_migrations};

    async fn setup() -> SqliteConfigStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let identity = Arc::new(age::x25519::Identity::generate());
        SqliteConfigStore::new(pool, identity)
    }

    #[tokio::test]
    async fn save_then_get_round_trips_plaintext_and_format() {
        let store = setup().await;
        store.save("s", b"a=1", "toml", "first").await.unwrap();
        store.save("s", b"a=2", "toml", "second").await.unwrap();

        let (plaintext, format) = store.get("s", 1).await.unwrap();
        assert_eq!(plaintext, b"a=1");
        assert_eq!(format, "toml");

        let (latest, _) = store.get("s", 0).await.unwrap();
        assert_eq!(latest, b"a=2");
    }

    #[tokio::test]
    async fn list_versions_descending_by_created_at() {
        let store = setup().await;
        store.save("s", b"a=1", "toml", "first").await.unwrap();
        store.save("s", b"a=2", "toml", "second").await.unwrap();

        let versions = store.list_versions("s").await.unwrap();
        assert_eq!(versions.len(), 2);
        assert!(versions[0].created_at >= versions[1].created_at);
    }

    #[tokio::test]
    async fn rollback_creates_new_generation_with_prior_plaintext() {
        let store = setup().await;
        store.save("s", b"a=1", "toml", "first").await.unwrap();
        store.save("s", b"a=2", "toml", "second").await.unwrap();

        let new_gen = store.rollback("s", 1).await.unwrap();
        assert_eq!(new_gen, 3);

        let (plaintext, _) = store.get("s", 0).await.unwrap();
        assert_eq!(plaintext, b"a=1");

        let versions = store.list_versions("s").await.unwrap();
        assert_eq!(versions.len(), 3);
    }

    #[tokio::test]
    async fn rollback_to_zero_or_future_generation_fails() {
        let store = setup().await;
        store.save("s", b"a=1", "toml", "first").await.unwrap();

        assert!(matches!(
            store.rollback("s", 0).await,
            Err(AppError::State(StateError::InvalidGeneration(_)))
        ));
        assert!(matches!(
            store.rollback("s", 5).await,
            Err(AppError::State(StateError::InvalidGeneration(_)))
        ));
    }

    #[tokio::test]
    async fn diff_is_empty_between_a_generation_and_itself() {
        let store = setup().await;
        store.save("s", b"a = 1\n", "toml", "first").await.unwrap();

        let diff = store.diff("s", 1).await.unwrap();
        assert!(diff.is_empty(), "expected no diff, got: {diff}");
    }

    #[tokio::test]
    async fn get_of_missing_scope_fails() {
        let store = setup().await;
        assert!(store.get("missing", 0).await.is_err());
    }
}
