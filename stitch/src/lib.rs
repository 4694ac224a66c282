pub mod agent;
pub mod api;
pub mod bundle;
pub mod config;
pub mod error;
pub mod wire;

pub use agent::{Agent, AgentHost, AgentMessage, HttpOrigin, InterceptRequest, Intercepted, Origin};
pub use api::{concat, handler_fn, ApiServer, BundleHandler, DirectoryBundles, Registry};
pub use bundle::{extract, format, identifier, matches, BundleRequest};
pub use config::{AgentConfig, AgentConfigBuilder, ServerConfig};
pub use error::{Result, StitchError};
pub use wire::{split, BundleChunk, ContentKind, Marker};
