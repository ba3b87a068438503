//! In-memory caches backing the selection pipeline.
//!
//! Both caches are explicit instances shared through `Arc`; nothing here is a
//! process-wide singleton, so tests construct isolated copies freely.

pub mod batch;
pub mod key;
pub mod rendered;

pub use batch::{BatchCache, CacheCorruption, CacheSettings, TakeOutcome};
pub use key::{CacheKey, CanonicalQuery};
pub use rendered::{RenderedCache, RenderedCacheSettings};
