//! Agent host: a local HTTP proxy that runs every request through the agent

use anyhow::Result;
use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

use super::{Agent, AgentMessage, AgentResponse, InterceptRequest, Keepalive, OriginRequest, MESSAGE_PATH};
use crate::api::server::shutdown_signal;

/// Largest request body forwarded to the origin
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
struct HostState {
    agent: Agent,
    keepalive: Keepalive,
    /// Browser origins allowed to talk to the agent: the upstream origin and
    /// the agent's own address
    trusted: Arc<Vec<String>>,
}

pub struct AgentHost {
    state: HostState,
}

impl AgentHost {
    pub fn new(agent: Agent) -> Self {
        let config = agent.config();
        let trusted = vec![
            config.origin.origin().ascii_serialization(),
            format!("http://{}", config.addr()),
        ];

        Self {
            state: HostState {
                agent,
                keepalive: Keepalive::new(),
                trusted: Arc::new(trusted),
            },
        }
    }

    pub fn agent(&self) -> &Agent {
        &self.state.agent
    }

    pub fn keepalive(&self) -> &Keepalive {
        &self.state.keepalive
    }

    /// Origins whose pages may post messages to the agent
    pub fn trusted_origins(&self) -> &[String] {
        &self.state.trusted
    }

    /// Build the router
    pub fn router(&self) -> Router {
        let origins: Vec<HeaderValue> = self
            .state
            .trusted
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();

        let cors = CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::HEAD, Method::POST])
            .allow_headers([header::CONTENT_TYPE]);

        Router::new()
            .route(MESSAGE_PATH, post(message))
            .fallback(forward)
            .with_state(self.state.clone())
            .layer(cors)
    }

    /// Install, activate, then serve until `shutdown` resolves.
    ///
    /// Outstanding background work is drained before returning.
    pub async fn serve(
        mut self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let local = listener.local_addr()?;
        let bound = format!("http://{}", local);
        if !self.state.trusted.contains(&bound) {
            Arc::make_mut(&mut self.state.trusted).push(bound);
        }

        let agent = &self.state.agent;
        agent.install();
        self.state.keepalive.wait_until(agent.activate()).await;

        info!("Agent proxying {} on {}", agent.config().origin, local);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Draining background cache work");
        self.state.keepalive.drain().await;
        info!("{}", self.state.agent.cache().stats().await);
        Ok(())
    }

    /// Start on the configured address, stopping on ctrl-c
    pub async fn start(self) -> Result<()> {
        let addr = self.state.agent.config().addr();
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener, shutdown_signal()).await
    }
}

async fn message(State(state): State<HostState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    if !is_trusted(&headers, &state.trusted) {
        warn!(
            "Rejecting agent message from untrusted origin {:?}",
            headers.get(header::ORIGIN)
        );
        return StatusCode::FORBIDDEN;
    }

    let message = AgentMessage::from_slice(&body);
    if let Some(settle) = state.agent.handle_message(message) {
        state.keepalive.wait_until(settle).await;
    }
    StatusCode::ACCEPTED
}

/// Browsers always send `Origin` on POST; requests without one come from
/// local non-browser clients.
fn is_trusted(headers: &HeaderMap, trusted: &[String]) -> bool {
    match headers.get(header::ORIGIN) {
        None => true,
        Some(origin) => origin
            .to_str()
            .map(|origin| trusted.iter().any(|t| t == origin))
            .unwrap_or(false),
    }
}

async fn forward(State(state): State<HostState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let mut url = state.agent.config().origin.clone();
    url.set_path(parts.uri.path());
    url.set_query(parts.uri.query());

    let intercept = InterceptRequest::new(parts.method.clone(), url.clone());
    if let Some(intercepted) = state.agent.respond(&intercept).await {
        if let Some(settle) = intercepted.settle {
            state.keepalive.wait_until(settle).await;
        }
        return intercepted.response.into_response();
    }

    debug!("Forwarding {} {}", parts.method, url);
    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response(),
    };

    let request = OriginRequest {
        method: parts.method,
        url,
        headers: parts.headers,
        body,
    };

    match state.agent.origin().fetch(request).await {
        Ok(response) => AgentResponse::from(response).into_response(),
        Err(e) => (StatusCode::BAD_GATEWAY, Body::from(e.to_string())).into_response(),
    }
}
