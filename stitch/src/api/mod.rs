//! Concatenation server: handler registry, concatenator and HTTP endpoint

pub mod concat;
pub mod diagnostics;
pub mod directory;
pub mod middleware;
pub mod registry;
pub mod routes;
pub mod server;

pub use concat::{concat, produce, BundleSummary, ConcatSummary, Concatenated};
pub use directory::DirectoryBundles;
pub use registry::{handler_fn, BundleHandler, FnHandler, Registry};
pub use server::ApiServer;
