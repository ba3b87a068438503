use chrono::{DateTime, Utc};

use crate::asset::Asset;
use crate::history::{HistoryEntry, HistoryToken};

/// One asset of a screen, ready to be sent to a display client.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderedAsset {
    pub asset: Asset,
    /// Provider user the asset was fetched on behalf of.
    pub user: String,
    pub mime: String,
    pub image_base64: String,
    pub blurred_base64: String,
}

/// A full screen worth of rendered assets.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderedView {
    pub assets: Vec<RenderedAsset>,
    pub created_at: DateTime<Utc>,
}

impl RenderedView {
    pub fn new(assets: Vec<RenderedAsset>) -> Self {
        Self {
            assets,
            created_at: Utc::now(),
        }
    }

    /// History entry identifying every asset on this screen.
    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry::new(
            self.assets
                .iter()
                .map(|rendered| {
                    HistoryToken::new(
                        rendered.asset.id.clone(),
                        rendered.user.clone(),
                    )
                })
                .collect(),
        )
    }
}
