//! Server and agent configuration
//!
//! Every setting resolves as defaults, then `STITCH_*` environment
//! variables, then explicit arguments (CLI flags or builder calls).

use crate::error::{Result, StitchError};
use crate::wire::ContentKind;
use reqwest::Url;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use stitch_cache::CacheConfig;

pub const ENV_NAMESPACE: &str = "STITCH_NAMESPACE";
pub const ENV_CONTENT_KIND: &str = "STITCH_CONTENT_KIND";
pub const ENV_VERSION: &str = "STITCH_VERSION";
pub const ENV_TTL_SECS: &str = "STITCH_TTL_SECS";
pub const ENV_ORIGIN: &str = "STITCH_ORIGIN";
pub const ENV_CACHE_DIR: &str = "STITCH_CACHE_DIR";
pub const ENV_HOST: &str = "STITCH_HOST";
pub const ENV_PORT: &str = "STITCH_PORT";
pub const ENV_WRAP: &str = "STITCH_WRAP";

const DEFAULT_NAMESPACE: &str = "stitch";
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8080/";
const DEFAULT_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn read<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e| StitchError::Config(format!("{}={:?}: {}", key, value, e))),
        None => Ok(None),
    }
}

fn read_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => Err(StitchError::Config(format!("{}={:?} is not a boolean", key, other))),
    }
}

fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() || namespace.contains(['/', '@', '?', '#']) {
        return Err(StitchError::Config(format!(
            "namespace must be a single path segment: {:?}",
            namespace
        )));
    }
    Ok(())
}

/// Default on-disk cache location for the agent
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stitch")
}

/// Concatenation server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub namespace: String,
    pub kind: ContentKind,
    /// Wrap payloads with the kind's exec wrapper
    pub wrap: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            namespace: DEFAULT_NAMESPACE.to_string(),
            kind: ContentKind::Script,
            wrap: true,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(process_env)
    }

    /// Apply overrides from `lookup`, keyed by `STITCH_*` variable name
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(host) = read(&lookup, ENV_HOST)? {
            self.host = host;
        }
        if let Some(port) = read(&lookup, ENV_PORT)? {
            self.port = port;
        }
        if let Some(namespace) = read(&lookup, ENV_NAMESPACE)? {
            self.namespace = namespace;
        }
        if let Some(kind) = read(&lookup, ENV_CONTENT_KIND)? {
            self.kind = kind;
        }
        if let Some(wrap) = read_flag(&lookup, ENV_WRAP)? {
            self.wrap = wrap;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        validate_namespace(&self.namespace)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reconciliation agent settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub namespace: String,
    pub kind: ContentKind,
    /// Cache generation version
    pub cache_version: String,
    pub ttl: Duration,
    /// Concatenation server the agent fetches from
    pub origin: Url,
    /// `None` keeps the cache in memory
    pub cache_dir: Option<PathBuf>,
    pub host: String,
    pub port: u16,
}

impl AgentConfig {
    /// Defaults for every setting except the origin
    pub fn new(origin: Url) -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            kind: ContentKind::Script,
            cache_version: "0.0.0".to_string(),
            ttl: DEFAULT_TTL,
            origin,
            cache_dir: Some(default_cache_dir()),
            host: "127.0.0.1".to_string(),
            port: 8081,
        }
    }

    pub fn builder(origin: Url) -> AgentConfigBuilder {
        AgentConfigBuilder {
            config: Self::new(origin),
        }
    }

    /// Defaults (origin [`DEFAULT_ORIGIN`]) overridden by the process environment
    pub fn from_env() -> Result<Self> {
        let origin = Url::parse(DEFAULT_ORIGIN)
            .map_err(|e| StitchError::Config(format!("default origin: {}", e)))?;
        Self::new(origin).with_overrides(process_env)
    }

    /// Apply overrides from `lookup`, keyed by `STITCH_*` variable name
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(namespace) = read(&lookup, ENV_NAMESPACE)? {
            self.namespace = namespace;
        }
        if let Some(kind) = read(&lookup, ENV_CONTENT_KIND)? {
            self.kind = kind;
        }
        if let Some(version) = read(&lookup, ENV_VERSION)? {
            self.cache_version = version;
        }
        if let Some(secs) = read::<u64>(&lookup, ENV_TTL_SECS)? {
            self.ttl = Duration::from_secs(secs);
        }
        if let Some(origin) = read(&lookup, ENV_ORIGIN)? {
            self.origin = origin;
        }
        if let Some(dir) = read::<PathBuf>(&lookup, ENV_CACHE_DIR)? {
            self.cache_dir = Some(dir);
        }
        if let Some(host) = read(&lookup, ENV_HOST)? {
            self.host = host;
        }
        if let Some(port) = read(&lookup, ENV_PORT)? {
            self.port = port;
        }
        self.validate()?;
        Ok(self)
    }

    /// Continue from this configuration with explicit overrides
    pub fn into_builder(self) -> AgentConfigBuilder {
        AgentConfigBuilder { config: self }
    }

    pub fn validate(&self) -> Result<()> {
        validate_namespace(&self.namespace)?;

        if !matches!(self.origin.scheme(), "http" | "https") {
            return Err(StitchError::Config(format!(
                "origin must be an http(s) URL: {}",
                self.origin
            )));
        }

        self.cache_config().validate()?;
        Ok(())
    }

    /// Cache settings derived from this agent configuration
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::builder()
            .namespace(&self.namespace)
            .content_kind(self.kind.mime())
            .version(&self.cache_version)
            .scope(self.origin.origin().ascii_serialization())
            .ttl(self.ttl)
            .build()
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`AgentConfig`]
#[derive(Debug, Clone)]
pub struct AgentConfigBuilder {
    config: AgentConfig,
}

impl AgentConfigBuilder {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    pub fn kind(mut self, kind: ContentKind) -> Self {
        self.config.kind = kind;
        self
    }

    pub fn cache_version(mut self, version: impl Into<String>) -> Self {
        self.config.cache_version = version.into();
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    pub fn origin(mut self, origin: Url) -> Self {
        self.config.origin = origin;
        self
    }

    pub fn cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.cache_dir = dir;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn build(self) -> Result<AgentConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
