//! # shelf-store — The "Engine" of SHELF
//!
//! Loads the product analytics CSV once into an immutable [`Snapshot`],
//! indexes it, and answers filtered, paginated queries and dataset statistics
//! through the capability-gated [`Catalog`].

pub mod catalog;
pub mod engine;
pub mod error;
pub mod index;
pub mod loader;
pub mod snapshot;

pub use catalog::Catalog;
pub use error::{DecodeWarning, LoadError, QueryError};
pub use index::{DatasetIndex, IndexOptions};
pub use snapshot::Snapshot;
