//! Bundle identifiers and request routing helpers
//!
//! Shared by the concatenation server and the reconciliation agent so both
//! sides agree on what a request for `/<namespace>/<id>/<id>` means.

pub mod format;
pub mod id;
pub mod matcher;

pub use format::format;
pub use id::{extract, identifier, BundleRequest};
pub use matcher::matches;
