//! API server for the concatenation endpoint

use anyhow::Result;
use axum::{middleware::from_fn_with_state, routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::ServerConfig;

use super::middleware::intercept_middleware;
use super::registry::Registry;
use super::routes::{health_check, not_found, AppState};

/// API server
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    /// Create a new API server serving `registry`
    pub fn new(config: ServerConfig, registry: Registry) -> Self {
        Self {
            state: Arc::new(AppState { registry, config }),
        }
    }

    /// Create a new API server with default configuration
    pub fn with_defaults(registry: Registry) -> Self {
        Self::new(ServerConfig::default(), registry)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Build the router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .fallback(not_found)
            .layer(from_fn_with_state(self.state.clone(), intercept_middleware))
            .layer(CorsLayer::permissive())
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        info!(
            "Serving /{}/ ({}) on {}",
            self.state.config.namespace,
            self.state.config.kind,
            listener.local_addr()?
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }

    /// Start the API server on the configured address
    pub async fn start(self) -> Result<()> {
        let addr = self.state.config.addr();
        info!("Starting API server on {}", addr);

        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener, shutdown_signal()).await
    }
}

/// Resolves on ctrl-c
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
