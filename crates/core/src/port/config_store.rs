// Secure config store port

use crate::error::Result;
use async_trait::async_trait;

/// Versioned, encrypted, append-only configuration store keyed by
/// `(scope, generation)`. Plaintext is never persisted; the implementation
/// owns encryption via a process-wide identity/recipient pair.
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait SecureConfigStore: Send + Sync {
    /// Returns `(plaintext, format)`. `generation = 0` means "latest".
    async fn get(&self, scope: &str, generation: i64) -> Result<(Vec<u8>, String)>;

    /// Encrypts `plaintext` and appends a new generation = `max(scope) + 1`.
    /// Returns the new generation number.
    async fn save(
        &self,
        scope: &str,
        plaintext: &[u8],
        format: &str,
        description: &str,
    ) -> Result<i64>;

    /// Metadata query: every known scope.
    async fn list_scopes(&self) -> Result<Vec<String>>;

    /// Metadata query: every generation of `scope`, descending `created_at`.
    async fn list_versions(&self, scope: &str) -> Result<Vec<crate::domain::ConfigRecord>>;

    /// Decrypts both `g` and the latest generation, canonicalises each
    /// plaintext by round-tripping it through its declared format, and
    /// returns a unified textual diff.
    async fn diff(&self, scope: &str, generation: i64) -> Result<String>;

    /// Strictly equivalent to
    /// `save(scope, get(scope, g).plaintext, get(scope, g).format, "Rollback to generation g")`.
    /// Returns the new generation number. History is never rewritten.
    async fn rollback(&self, scope: &str, generation: i64) -> Result<i64>;
}
