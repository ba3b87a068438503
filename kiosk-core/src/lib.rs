//! # Kiosk Core
//!
//! Asset selection, deduplication and prefetch pipeline for kiosk photo
//! displays.
//!
//! ## Overview
//!
//! Given a set of configured content sources, the pipeline decides which asset
//! a display shows next:
//!
//! - **Catalog**: counts each source on the provider and drops empty ones
//! - **Selector**: picks a source, optionally weighted by dampened size
//! - **Fetcher**: draws a displayable asset from a cached, shrinking batch
//! - **Orchestrator**: serves prefetched views, builds on a miss, refills in
//!   the background and keeps the "go back" history
//!
//! ## Feature Flags
//!
//! - `render` (default): the `image`-backed [`render::ImageRenderer`]
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kiosk_core::{
//!     cache::{CanonicalQuery, RenderedCache},
//!     fetcher::AssetBatches,
//!     history::HistoryLedger,
//!     orchestrator::{Orchestrator, OrchestratorSettings, ViewRequest, ViewSettings},
//!     provider::{HttpAssetProvider, HttpProviderConfig, ProviderSet},
//!     render::ImageRenderer,
//! };
//!
//! async fn show_next() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HttpProviderConfig::new("http://photos.local".parse()?, "api-key");
//!     let orchestrator = Orchestrator::new(
//!         ProviderSet::new(Arc::new(HttpAssetProvider::new(config)?)),
//!         Arc::new(ImageRenderer),
//!         Arc::new(AssetBatches::default()),
//!         Arc::new(RenderedCache::default()),
//!         OrchestratorSettings::default(),
//!     );
//!
//!     let request = ViewRequest {
//!         view_query: CanonicalQuery::default(),
//!         device: "kitchen".into(),
//!         user: String::new(),
//!         settings: ViewSettings::default(),
//!         prefetch: true,
//!     };
//!     let mut history = HistoryLedger::default();
//!     let view = orchestrator.next_view(&request, &mut history).await?;
//!     println!("showing {} asset(s)", view.assets.len());
//!     Ok(())
//! }
//! ```
#![allow(missing_docs)]

pub mod cache;
pub mod catalog;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod history;
pub mod orchestrator;
pub mod provider;
pub mod render;
pub mod selector;
pub mod webhook;

pub use error::{KioskError, ProviderError, Result};
pub use fetcher::AssetFetcher;
pub use filter::FilterPolicy;
pub use history::{HistoryLedger, Previous};
pub use orchestrator::{Layout, Orchestrator, ViewRequest, ViewSettings};
pub use provider::{AssetProvider, ProviderSet};

pub use kiosk_model;
