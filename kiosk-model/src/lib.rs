//! Core data model definitions shared across kiosk crates.
#![allow(missing_docs)]

pub use ::chrono;

pub mod asset;
pub mod error;
pub mod history;
pub mod ids;
pub mod source;
pub mod view;

// Intentionally curated re-exports for downstream consumers.
pub use asset::{Asset, AssetKind, Orientation};
pub use error::{ModelError, Result as ModelResult};
pub use history::{HistoryEntry, HistoryToken};
pub use ids::{AlbumId, AssetId, PersonId};
pub use source::{DateRange, Source, SourceKind, WeightedCandidate};
pub use view::{RenderedAsset, RenderedView};
