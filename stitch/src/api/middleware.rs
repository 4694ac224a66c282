//! Namespace interception middleware for Axum

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::bundle::matches;

use super::routes::{bundle_response, AppState};

/// Answer requests addressed to the bundle namespace; pass everything else on
pub async fn intercept_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if !matches(path, request.method(), &state.config.namespace) {
        return next.run(request).await;
    }

    bundle_response(&state, path, request.method()).await
}
