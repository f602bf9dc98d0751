//! The trivial HTTPS-redirect listener: when TLS is
//! enabled, plain HTTP traffic is sent to the canonical HTTPS base URL
//! with path and query preserved, using a permanent redirect.

use axum::extract::OriginalUri;
use axum::http::Uri;
use axum::response::{IntoResponse, Redirect};
use axum::routing::any;
use axum::Router;

/// Build a fallback-only router that 308-redirects every request to
/// `https_base_url` plus the incoming path and query string.
pub fn redirect_router(https_base_url: String) -> Router {
    let base = https_base_url.trim_end_matches('/').to_string();
    Router::new().fallback(any(move |OriginalUri(uri): OriginalUri| {
        let base = base.clone();
        async move { redirect_to(&base, &uri) }
    }))
}

fn redirect_to(base: &str, uri: &Uri) -> impl IntoResponse {
    let suffix = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let target = format!("{base}{suffix}");
    Redirect::permanent(&target)
}
