//! Wire format of a concatenated payload
//!
//! ```text
//! <prefix>
//! <body of bundle 1>
//! /*! Stitch meta({"name":"foo","version":"1.2.9","cache":true}) */
//! <body of bundle 2>
//! /*! Stitch meta({"name":"bar","version":"2.2.9","cache":false}) */
//! <suffix>
//! ```
//!
//! The marker line trailing each body is the only framing. Prefix and
//! suffix come from the [`ContentKind`] and are optional.

pub mod chunk;
pub mod marker;
pub mod preset;
pub mod split;

pub use chunk::BundleChunk;
pub use marker::Marker;
pub use preset::ContentKind;
pub use split::split;
