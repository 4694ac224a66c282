//! Reconciliation agent
//!
//! Sits between a page and the concatenation server. For every matched
//! request it serves what it can from the bundle cache, fetches only the
//! missing bundles, and reassembles the response in request order.
//!
//! Lifecycle:
//! - `install`: nothing to prepare, take over immediately
//! - `activate`: drop superseded generations and idle entries in the background
//! - `respond`: per intercepted request
//! - `handle_message`: out-of-band cache priming (see [`loader`])

pub mod keepalive;
pub mod loader;
pub mod origin;
pub mod proxy;
pub mod timing;

pub use keepalive::{Keepalive, Settle};
pub use loader::AgentMessage;
pub use origin::{HttpOrigin, Origin, OriginRequest, OriginResponse};
pub use proxy::AgentHost;
pub use timing::ServerTiming;

use crate::api::diagnostics;
use crate::bundle::{extract, format, matches, BundleRequest};
use crate::config::AgentConfig;
use crate::error::{Result, StitchError};
use crate::wire::{split, BundleChunk};
use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use reqwest::Url;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use stitch_cache::{BundleCache, CacheStorage};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Path the page posts [`AgentMessage`]s to
pub const MESSAGE_PATH: &str = "/__stitch/message";

/// Diagnostic header attached to reassembled responses
pub const SERVER_TIMING: &str = "server-timing";

/// Result of `install`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Take control without waiting for older agents to release
    SkipWaiting,
}

/// Outbound request as seen by the agent
#[derive(Debug, Clone)]
pub struct InterceptRequest {
    pub method: Method,
    /// Absolute URL on the origin
    pub url: Url,
}

impl InterceptRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url }
    }
}

/// Response handed back to the host
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl AgentResponse {
    fn error(status: StatusCode, message: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self {
            status,
            headers,
            body: Bytes::from(message.into()),
        }
    }
}

impl From<OriginResponse> for AgentResponse {
    fn from(response: OriginResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
        }
    }
}

impl IntoResponse for AgentResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

/// An intercepted request's response plus its background persistence
pub struct Intercepted {
    pub response: AgentResponse,
    /// Cache writes still running; the host must keep them alive
    pub settle: Option<Settle>,
}

/// Why a fetch could not be turned into chunks
#[derive(Debug)]
pub(crate) struct FetchFailure {
    pub(crate) error: StitchError,
    /// The origin's answer, when there was one
    pub(crate) response: Option<OriginResponse>,
}

#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

struct AgentInner {
    config: AgentConfig,
    cache: BundleCache,
    origin: Arc<dyn Origin>,
}

impl Agent {
    pub fn new(config: AgentConfig, storage: Arc<dyn CacheStorage>, origin: Arc<dyn Origin>) -> Result<Self> {
        config.validate()?;
        let cache = BundleCache::new(config.cache_config(), storage)?;
        Ok(Self::with_cache(config, cache, origin))
    }

    /// Use a prepared cache, e.g. one with a manual clock
    pub fn with_cache(config: AgentConfig, cache: BundleCache, origin: Arc<dyn Origin>) -> Self {
        Self {
            inner: Arc::new(AgentInner {
                config,
                cache,
                origin,
            }),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &BundleCache {
        &self.inner.cache
    }

    pub fn origin(&self) -> Arc<dyn Origin> {
        self.inner.origin.clone()
    }

    pub fn install(&self) -> InstallOutcome {
        info!("Agent installed for {}", self.inner.cache.generation());
        InstallOutcome::SkipWaiting
    }

    /// Claim control and schedule cache maintenance
    pub fn activate(&self) -> Settle {
        info!("Agent active on /{}/", self.inner.config.namespace);
        let agent = self.clone();

        Settle::spawn(async move {
            match agent.inner.cache.maintain().await {
                Ok(events) => {
                    for event in events {
                        info!("Cache maintenance: {} ({} keys)", event.reason, event.keys.len());
                    }
                }
                Err(e) => warn!("Cache maintenance failed: {}", e),
            }
        })
    }

    pub fn matches(&self, request: &InterceptRequest) -> bool {
        matches(request.url.as_str(), &request.method, &self.inner.config.namespace)
    }

    /// Handle an outbound request.
    ///
    /// `None` means the request is not for the bundle namespace and should
    /// go to the network untouched.
    pub async fn respond(&self, request: &InterceptRequest) -> Option<Intercepted> {
        if !self.matches(request) {
            return None;
        }

        let requests = extract(request.url.as_str(), &self.inner.config.namespace);
        if requests.is_empty() {
            return None;
        }

        let span = info_span!("intercept", request_id = %Uuid::new_v4());
        Some(self.reconcile(request, requests).instrument(span).await)
    }

    async fn reconcile(&self, request: &InterceptRequest, requests: Vec<BundleRequest>) -> Intercepted {
        let config = &self.inner.config;
        let kind = config.kind;
        let ids: Vec<String> = requests.iter().map(|r| r.id.clone()).collect();
        let mut timing = ServerTiming::new();

        let started = Instant::now();
        let cached = self.inner.cache.read(&ids).await;
        let lookup = started.elapsed();

        let missing: Vec<String> = unique(ids.iter().filter(|id| !cached.contains_key(*id)));

        let started = Instant::now();
        let mut fresh: HashMap<String, BundleChunk> = HashMap::new();
        if !missing.is_empty() {
            let reduced = format(&missing, &request.url, &config.namespace);
            debug!("Fetching {} of {} bundles from {}", missing.len(), ids.len(), reduced);

            let chunks = match self.fetch_chunks(&reduced, &missing).await {
                Ok(chunks) => chunks,
                Err(failure) if reduced != request.url => {
                    warn!("Reduced fetch failed ({}), retrying {}", failure.error, request.url);
                    let all = unique(ids.iter());
                    match self.fetch_chunks(&request.url, &all).await {
                        Ok(chunks) => chunks,
                        Err(failure) => return surface(failure),
                    }
                }
                Err(failure) => return surface(failure),
            };

            for chunk in chunks {
                fresh.insert(chunk.id.clone(), chunk);
            }
        }
        let fetch = started.elapsed();

        let started = Instant::now();
        let mut parts = Vec::with_capacity(requests.len());
        let mut fetched = Vec::new();
        let mut reused = Vec::new();

        for bundle in &requests {
            let chunk = if let Some(chunk) = fresh.get(&bundle.id) {
                fetched.push(bundle.id.clone());
                chunk.clone()
            } else if let Some(entry) = cached.get(&bundle.id) {
                reused.push(bundle.id.clone());
                BundleChunk::new(bundle, entry.body.clone(), true)
            } else {
                BundleChunk::new(bundle, diagnostics::missing(bundle, kind), false)
            };

            match chunk.framed(kind) {
                Ok(text) => parts.push(text),
                Err(e) => {
                    return Intercepted {
                        response: AgentResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
                        settle: None,
                    }
                }
            }
        }
        let body = parts.join("\n");
        let assemble = started.elapsed();

        let fetched = unique(fetched.iter());
        let reused = unique(reused.iter());
        timing
            .ids("requested", &ids)
            .ids("fetched", &fetched)
            .ids("cached", &reused)
            .duration("lookup", lookup)
            .duration("fetch", fetch)
            .duration("assemble", assemble);

        info!(
            "Reconciled {} bundles: {} cached, {} fetched",
            ids.len(),
            reused.len(),
            fetched.len()
        );

        let fills: Vec<BundleChunk> = fresh.into_values().filter(|c| c.cacheable).collect();
        let agent = self.clone();
        let settle = Settle::spawn(
            async move {
                agent.inner.cache.fill(&fills).await;
                agent.inner.cache.hit(&reused).await;
            }
            .in_current_span(),
        );

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(kind.mime()));
        if let Ok(value) = HeaderValue::from_str(&timing.header_value()) {
            headers.insert(SERVER_TIMING, value);
        }

        let body = if request.method == Method::HEAD {
            Bytes::new()
        } else {
            Bytes::from(body)
        };

        Intercepted {
            response: AgentResponse {
                status: StatusCode::OK,
                headers,
                body,
            },
            settle: Some(settle),
        }
    }

    /// Fetch `url` and split it, requiring a chunk for every id in `expected`
    pub(crate) async fn fetch_chunks(
        &self,
        url: &Url,
        expected: &[String],
    ) -> std::result::Result<Vec<BundleChunk>, FetchFailure> {
        let response = self
            .inner
            .origin
            .fetch(OriginRequest::get(url.clone()))
            .await
            .map_err(|error| FetchFailure {
                error,
                response: None,
            })?;

        if !response.status.is_success() {
            return Err(FetchFailure {
                error: StitchError::Network(format!("{} answered {}", url, response.status)),
                response: Some(response),
            });
        }

        let parsed = response
            .text()
            .and_then(|text| split(text, self.inner.config.kind));
        let chunks = match parsed {
            Ok(chunks) => chunks,
            Err(error) => {
                return Err(FetchFailure {
                    error,
                    response: Some(response),
                })
            }
        };

        let present: HashSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        if let Some(absent) = expected.iter().find(|id| !present.contains(id.as_str())) {
            return Err(FetchFailure {
                error: StitchError::Parse(format!("{} lacks bundle {}", url, absent)),
                response: Some(response),
            });
        }

        Ok(chunks)
    }
}

/// Deduplicate, keeping first occurrences in order
fn unique<'a>(ids: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Final failure: hand the origin's answer through, or a 502
fn surface(failure: FetchFailure) -> Intercepted {
    warn!("Serving unreconciled response: {}", failure.error);
    let response = match failure.response {
        Some(response) => AgentResponse::from(response),
        None => AgentResponse::error(StatusCode::BAD_GATEWAY, failure.error.to_string()),
    };
    Intercepted {
        response,
        settle: None,
    }
}
