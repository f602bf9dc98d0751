//! Rustls certificate/key loading for `AxumHttpHandler::tls`.

use ripcore_core::error::{AppError, Result};
use std::path::Path;

/// Load a PEM certificate chain and private key from disk into a
/// `rustls` server config suitable for `axum_server::bind_rustls`.
pub async fn load_rustls_config(
    cert_path: &Path,
    key_path: &Path,
) -> Result<axum_server::tls_rustls::RustlsConfig> {
    axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| AppError::Internal(format!("failed to load tls cert/key: {e}")))
}
