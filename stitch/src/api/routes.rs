//! API routes for the concatenation server

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error};

use crate::bundle::extract;
use crate::config::ServerConfig;

use super::concat::concat;
use super::registry::Registry;

/// Response header for payloads made only of successfully produced bundles
pub const CACHE_IMMUTABLE: &str = "public, max-age=31536000, immutable";
/// Response header for payloads containing any diagnostic chunk
pub const CACHE_NONE: &str = "no-store";

/// Application state
pub struct AppState {
    pub registry: Registry,
    pub config: ServerConfig,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Fallback for everything outside the namespace
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// Concatenate the bundles addressed by `path`
pub async fn bundle_response(state: &AppState, path: &str, method: &Method) -> Response {
    let config = &state.config;
    let requests = extract(path, &config.namespace);

    let result = match concat(&state.registry, &requests, config.kind, config.wrap).await {
        Ok(result) => result,
        Err(e) => {
            error!("Failed to concatenate {}: {}", path, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    debug!(
        "Served {} bundles for {} (cacheable: {})",
        requests.len(),
        path,
        result.summary.all_cacheable
    );

    let cache_control = if result.summary.all_cacheable {
        CACHE_IMMUTABLE
    } else {
        CACHE_NONE
    };
    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static(config.kind.mime())),
        (header::CACHE_CONTROL, HeaderValue::from_static(cache_control)),
    ];

    if *method == Method::HEAD {
        return (StatusCode::OK, headers).into_response();
    }
    (StatusCode::OK, headers, result.payload).into_response()
}
