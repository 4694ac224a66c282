//! Concatenator: produce every requested bundle and frame them into one payload

use crate::api::{diagnostics, registry::{BundleHandler, Registry}};
use crate::bundle::BundleRequest;
use crate::error::{Result, StitchError};
use crate::wire::{BundleChunk, ContentKind};
use futures::future::join_all;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-bundle cache safety of one concatenated response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleSummary {
    pub id: String,
    pub cacheable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConcatSummary {
    pub bundles: Vec<BundleSummary>,
    /// True when every bundle was produced successfully
    pub all_cacheable: bool,
}

#[derive(Debug, Clone)]
pub struct Concatenated {
    pub payload: String,
    pub chunks: Vec<BundleChunk>,
    pub summary: ConcatSummary,
}

enum Outcome {
    Content(String),
    Missing,
    Failed(String),
}

async fn run(handler: &Arc<dyn BundleHandler>, request: &BundleRequest) -> std::result::Result<Option<String>, String> {
    match AssertUnwindSafe(handler.produce(request)).catch_unwind().await {
        Ok(Ok(content)) => Ok(content.filter(|c| !c.is_empty())),
        Ok(Err(e)) => Err(format!("{:#}", e)),
        Err(_) => Err("bundle handler panicked".to_string()),
    }
}

async fn gather(registry: &Registry, request: &BundleRequest) -> Outcome {
    if let Some(handler) = registry.handler(&request.name) {
        return match run(handler, request).await {
            Ok(Some(content)) => Outcome::Content(content),
            Ok(None) => Outcome::Missing,
            Err(message) => Outcome::Failed(message),
        };
    }

    for handler in registry.catch_all() {
        match run(handler, request).await {
            Ok(Some(content)) => return Outcome::Content(content),
            Ok(None) => continue,
            Err(message) => return Outcome::Failed(message),
        }
    }

    Outcome::Missing
}

/// Produce a single bundle; never fails
pub async fn produce(registry: &Registry, request: &BundleRequest, kind: ContentKind) -> BundleChunk {
    match gather(registry, request).await {
        Outcome::Content(content) => BundleChunk::new(request, content, true),
        Outcome::Missing => {
            debug!("Bundle {} is missing", request.id);
            BundleChunk::new(request, diagnostics::missing(request, kind), false)
        }
        Outcome::Failed(message) => {
            let error = StitchError::HandlerFailure {
                id: request.id.clone(),
                message: message.clone(),
            };
            warn!("{}", error);
            BundleChunk::new(request, diagnostics::failure(request, &message, kind), false)
        }
    }
}

/// Produce all `requests` concurrently and join them in request order.
///
/// With `wrap` set the payload is wrapped with the kind's exec wrapper.
pub async fn concat(
    registry: &Registry,
    requests: &[BundleRequest],
    kind: ContentKind,
    wrap: bool,
) -> Result<Concatenated> {
    let chunks = join_all(requests.iter().map(|r| produce(registry, r, kind))).await;

    let framed = chunks
        .iter()
        .map(|chunk| chunk.framed(kind))
        .collect::<Result<Vec<_>>>()?
        .join("\n");
    let payload = if wrap { kind.wrap(&framed) } else { framed };

    let bundles: Vec<BundleSummary> = chunks
        .iter()
        .map(|chunk| BundleSummary {
            id: chunk.id.clone(),
            cacheable: chunk.cacheable,
        })
        .collect();
    let all_cacheable = !bundles.is_empty() && bundles.iter().all(|b| b.cacheable);

    Ok(Concatenated {
        payload,
        chunks,
        summary: ConcatSummary {
            bundles,
            all_cacheable,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::registry::handler_fn;
    use crate::bundle::extract;
    use crate::wire::split;
    use std::time::Duration;

    fn requests(path: &str) -> Vec<BundleRequest> {
        extract(path, "stitch")
    }

    fn registry_with_foo() -> Registry {
        let mut registry = Registry::new();
        registry
            .register("foo", handler_fn(|_| async { Ok(Some("bar".to_string())) }))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_registered_bundle() {
        let result = concat(&registry_with_foo(), &requests("/stitch/foo@1.2.9"), ContentKind::Script, false)
            .await
            .unwrap();

        assert!(result.payload.contains("bar"));
        assert!(result
            .payload
            .contains(r#"/*! Stitch meta({"name":"foo","version":"1.2.9","cache":true}) */"#));
        assert!(result.summary.all_cacheable);
    }

    #[tokio::test]
    async fn test_missing_bundle() {
        let result = concat(&Registry::new(), &requests("/stitch/foo@1.2.9"), ContentKind::Script, true)
            .await
            .unwrap();

        assert!(result.payload.contains("404: Could not find the requested bundle foo@1.2.9"));
        assert!(result.payload.contains(r#""cache":false"#));
        assert!(!result.summary.all_cacheable);
    }

    #[tokio::test]
    async fn test_mixed_keeps_request_order() {
        let result = concat(
            &registry_with_foo(),
            &requests("/stitch/foo@1.2.9/bar@2.2.9"),
            ContentKind::Script,
            true,
        )
        .await
        .unwrap();

        let chunks = split(&result.payload, ContentKind::Script).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "foo@1.2.9");
        assert_eq!(chunks[0].body, "bar");
        assert!(chunks[0].cacheable);
        assert_eq!(chunks[1].id, "bar@2.2.9");
        assert!(!chunks[1].cacheable);

        assert_eq!(
            result.summary.bundles,
            vec![
                BundleSummary { id: "foo@1.2.9".to_string(), cacheable: true },
                BundleSummary { id: "bar@2.2.9".to_string(), cacheable: false },
            ]
        );
    }

    #[tokio::test]
    async fn test_order_independent_of_completion_time() {
        let mut registry = Registry::new();
        registry
            .register(
                "slow",
                handler_fn(|_| async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(Some("slow()".to_string()))
                }),
            )
            .unwrap();
        registry
            .register("fast", handler_fn(|_| async { Ok(Some("fast()".to_string())) }))
            .unwrap();

        let result = concat(&registry, &requests("/stitch/slow/fast/slow"), ContentKind::Script, false)
            .await
            .unwrap();

        let ids: Vec<_> = result.chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["slow", "fast", "slow"]);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let mut registry = registry_with_foo();
        registry
            .register("boom", handler_fn(|_| async { Err(anyhow::anyhow!("disk on fire")) }))
            .unwrap();

        let result = concat(&registry, &requests("/stitch/boom@1/foo@1"), ContentKind::Script, false)
            .await
            .unwrap();

        assert!(!result.chunks[0].cacheable);
        assert!(result.chunks[0].body.contains("disk on fire"));
        assert!(result.chunks[1].cacheable);
        assert_eq!(result.chunks[1].body, "bar");
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_failure() {
        let mut registry = registry_with_foo();
        registry
            .register(
                "panics",
                handler_fn(|_| async {
                    if true {
                        panic!("handler bug");
                    }
                    Ok(None)
                }),
            )
            .unwrap();

        let result = concat(&registry, &requests("/stitch/panics/foo"), ContentKind::Script, false)
            .await
            .unwrap();

        assert!(!result.chunks[0].cacheable);
        assert!(result.chunks[0].body.contains("bundle handler panicked"));
        assert!(result.chunks[1].cacheable);
    }

    #[tokio::test]
    async fn test_catch_alls_tried_in_order() {
        let mut registry = Registry::new();
        registry.register_catch_all(handler_fn(|request: BundleRequest| async move {
            Ok((request.name == "a").then(|| "from first".to_string()))
        }));
        registry.register_catch_all(handler_fn(|_| async { Ok(Some(String::new())) }));
        registry.register_catch_all(handler_fn(|request: BundleRequest| async move {
            Ok(Some(format!("from third: {}", request.id)))
        }));

        let result = concat(&registry, &requests("/stitch/a/b@2"), ContentKind::Script, false)
            .await
            .unwrap();

        assert_eq!(result.chunks[0].body, "from first");
        assert_eq!(result.chunks[1].body, "from third: b@2");
        assert!(result.summary.all_cacheable);
    }

    #[tokio::test]
    async fn test_dedicated_handler_empty_is_missing() {
        let mut registry = Registry::new();
        registry
            .register("foo", handler_fn(|_| async { Ok(None) }))
            .unwrap();
        registry.register_catch_all(handler_fn(|_| async { Ok(Some("fallback".to_string())) }));

        let result = concat(&registry, &requests("/stitch/foo@1"), ContentKind::Script, false)
            .await
            .unwrap();

        assert!(!result.chunks[0].cacheable);
        assert!(result.chunks[0].body.contains("404"));
    }
}
