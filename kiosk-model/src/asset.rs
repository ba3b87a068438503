use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};

use crate::ids::{AssetId, PersonId};

/// Media kind as reported by the asset provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AssetKind {
    Image,
    Video,
    Other,
}

impl AssetKind {
    /// Maps the provider's upper-case type tag (`IMAGE`, `VIDEO`, ...).
    pub fn from_provider_tag(tag: &str) -> Self {
        match tag.to_ascii_uppercase().as_str() {
            "IMAGE" => AssetKind::Image,
            "VIDEO" => AssetKind::Video,
            _ => AssetKind::Other,
        }
    }

    pub fn as_provider_tag(&self) -> &'static str {
        match self {
            AssetKind::Image => "IMAGE",
            AssetKind::Video => "VIDEO",
            AssetKind::Other => "OTHER",
        }
    }
}

impl Display for AssetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Image => write!(f, "image"),
            AssetKind::Video => write!(f, "video"),
            AssetKind::Other => write!(f, "other"),
        }
    }
}

/// Displayed aspect of an asset after EXIF rotation is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Orientation {
    Portrait,
    Landscape,
    Square,
    #[default]
    Unknown,
}

impl Orientation {
    /// Derives the displayed orientation from raw pixel dimensions and the
    /// EXIF orientation tag. Tags 5 through 8 rotate the image by 90 degrees,
    /// which swaps width and height.
    pub fn from_dimensions(
        width: Option<u32>,
        height: Option<u32>,
        exif_orientation: Option<u8>,
    ) -> Self {
        let (Some(mut width), Some(mut height)) = (width, height) else {
            return Orientation::Unknown;
        };
        if width == 0 || height == 0 {
            return Orientation::Unknown;
        }
        if matches!(exif_orientation, Some(5..=8)) {
            std::mem::swap(&mut width, &mut height);
        }
        match width.cmp(&height) {
            std::cmp::Ordering::Greater => Orientation::Landscape,
            std::cmp::Ordering::Less => Orientation::Portrait,
            std::cmp::Ordering::Equal => Orientation::Square,
        }
    }
}

/// Reduced projection of a provider asset.
///
/// Only the fields the selection pipeline filters on are retained so cached
/// batches stay small. The provider owns the entity; the pipeline never
/// mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Asset {
    pub id: AssetId,
    pub kind: AssetKind,
    pub is_trashed: bool,
    pub is_archived: bool,
    pub is_favorite: bool,
    pub orientation: Orientation,
    pub tags: Vec<String>,
    pub people: Vec<PersonId>,
    pub original_file_name: Option<String>,
    pub taken_at: Option<DateTime<Utc>>,
}

impl Asset {
    /// Minimal visible image; handy as a base for builders and fixtures.
    pub fn image(id: impl Into<AssetId>) -> Self {
        Self {
            id: id.into(),
            kind: AssetKind::Image,
            is_trashed: false,
            is_archived: false,
            is_favorite: false,
            orientation: Orientation::Unknown,
            tags: Vec::new(),
            people: Vec::new(),
            original_file_name: None,
            taken_at: None,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn features_person(&self, person: &PersonId) -> bool {
        self.people.iter().any(|p| p == person)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_follows_exif_rotation() {
        assert_eq!(
            Orientation::from_dimensions(Some(4000), Some(3000), None),
            Orientation::Landscape
        );
        assert_eq!(
            Orientation::from_dimensions(Some(4000), Some(3000), Some(6)),
            Orientation::Portrait
        );
        assert_eq!(
            Orientation::from_dimensions(Some(10), Some(10), Some(1)),
            Orientation::Square
        );
        assert_eq!(
            Orientation::from_dimensions(None, Some(10), None),
            Orientation::Unknown
        );
    }

    #[test]
    fn tag_match_ignores_case() {
        let mut asset = Asset::image("a1");
        asset.tags.push("Kiosk-Skip".into());
        assert!(asset.has_tag("kiosk-skip"));
        assert!(!asset.has_tag("other"));
    }

    #[test]
    fn provider_tags_round_trip_known_kinds() {
        assert_eq!(AssetKind::from_provider_tag("IMAGE"), AssetKind::Image);
        assert_eq!(AssetKind::from_provider_tag("video"), AssetKind::Video);
        assert_eq!(AssetKind::from_provider_tag("AUDIO"), AssetKind::Other);
    }
}
