use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::ModelError;
use crate::ids::AssetId;

/// `assetID:userID` reference to a previously shown asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryToken {
    pub asset_id: AssetId,
    pub user: String,
}

impl HistoryToken {
    pub fn new(asset_id: AssetId, user: impl Into<String>) -> Self {
        Self {
            asset_id,
            user: user.into(),
        }
    }
}

impl Display for HistoryToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.asset_id, self.user)
    }
}

impl FromStr for HistoryToken {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (id, user) = raw.split_once(':').unwrap_or((raw, ""));
        if id.is_empty() || id.contains(',') {
            return Err(ModelError::InvalidHistoryToken(raw.to_string()));
        }
        Ok(Self::new(AssetId::new(id), user))
    }
}

/// All assets shown together on one screen, encoded as comma-separated
/// [`HistoryToken`]s.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistoryEntry(pub Vec<HistoryToken>);

impl HistoryEntry {
    pub fn new(tokens: Vec<HistoryToken>) -> Self {
        Self(tokens)
    }

    pub fn tokens(&self) -> &[HistoryToken] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for HistoryEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (idx, token) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{token}")?;
        }
        Ok(())
    }
}

impl FromStr for HistoryEntry {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(HistoryToken::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(HistoryEntry)
    }
}
