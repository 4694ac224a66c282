//! Canonical `name@version` bundle ids

use serde::{Deserialize, Serialize};
use std::fmt;

/// One requested bundle, in request order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BundleRequest {
    pub name: String,
    pub version: Option<String>,
    /// Wire token: `name@version`, or just `name` when unversioned
    pub id: String,
}

impl BundleRequest {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        let name = name.into();
        let version = version.filter(|v| !v.is_empty());
        let id = identifier(&name, version.as_deref());
        Self { name, version, id }
    }

    /// Parse a single wire token.
    ///
    /// The version starts after the last `@`, so names may contain `@`
    /// themselves (`@scope/pkg@1.0.0`). A leading `@` alone never starts a
    /// version.
    pub fn parse(token: &str) -> Self {
        match token.rfind('@') {
            Some(at) if at > 0 => Self::new(&token[..at], Some(token[at + 1..].to_string())),
            _ => Self::new(token, None),
        }
    }
}

impl fmt::Display for BundleRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Build the bundle id from a name and optional version
pub fn identifier(name: &str, version: Option<&str>) -> String {
    match version {
        Some(version) if !version.is_empty() => format!("{}@{}", name, version),
        _ => name.to_string(),
    }
}

/// Extract the requested bundles from a request path or URL.
///
/// Everything after the last `/<namespace>/` is treated as a list of
/// `/`-separated ids. Query string and fragment are ignored, empty segments
/// skipped, and a scoped name (`@scope/pkg@1.0.0`) spans two segments.
/// Duplicates are kept. Never fails: unrelated paths yield an empty list.
pub fn extract(path: &str, namespace: &str) -> Vec<BundleRequest> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let prefix = format!("/{}/", namespace);

    let Some(start) = path.rfind(&prefix) else {
        return Vec::new();
    };

    let mut segments = path[start + prefix.len()..]
        .split('/')
        .filter(|segment| !segment.is_empty());
    let mut requests = Vec::new();

    while let Some(segment) = segments.next() {
        let scoped = segment.starts_with('@') && !segment[1..].contains('@');
        let rest = if scoped { segments.next() } else { None };
        let request = match rest {
            Some(rest) => BundleRequest::parse(&format!("{}/{}", segment, rest)),
            None => BundleRequest::parse(segment),
        };
        requests.push(request);
    }

    requests
}
