//! Cadence Asset Pipeline
//!
//! Shared, reference-counted resources keyed by [`HashKey`], and a file
//! loader that feeds them:
//! - [`ResourceCache`]: one loader call per key no matter how many threads
//!   ask for it at once; the entry is evicted when its last handle drops
//! - [`AssetLoader`]: reads files under an asset root into a cache

pub mod cache;
pub mod loader;

pub use cache::{CacheError, ResourceCache, ResourceHandle};
pub use cadence_core::HashKey;
pub use loader::{AssetError, AssetLoader};
