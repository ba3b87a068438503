use std::collections::HashSet;

use kiosk_model::{Asset, AssetId, AssetKind, Orientation, Source};

pub const DEFAULT_SKIP_TAG: &str = "kiosk-skip";

/// Why an asset was passed over during a batch scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Kind,
    Trashed,
    Archived,
    Orientation,
    SkipTag,
    MissingPerson,
    Excluded,
}

/// Rules an asset must satisfy before it can be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPolicy {
    pub kinds: Vec<AssetKind>,
    pub show_archived: bool,
    pub orientation: Option<Orientation>,
    pub skip_tag: Option<String>,
    /// Assets already placed on the screen being assembled.
    pub exclude: HashSet<AssetId>,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            kinds: vec![AssetKind::Image],
            show_archived: false,
            orientation: None,
            skip_tag: Some(DEFAULT_SKIP_TAG.to_string()),
            exclude: HashSet::new(),
        }
    }
}

impl FilterPolicy {
    pub fn with_kinds(show_videos: bool) -> Self {
        let mut policy = Self::default();
        if show_videos {
            policy.kinds.push(AssetKind::Video);
        }
        policy
    }

    pub fn check(&self, asset: &Asset, source: &Source) -> Result<(), Rejection> {
        if !self.kinds.contains(&asset.kind) {
            return Err(Rejection::Kind);
        }
        if asset.is_trashed {
            return Err(Rejection::Trashed);
        }
        if asset.is_archived && !self.show_archived {
            return Err(Rejection::Archived);
        }
        if let Some(wanted) = self.orientation
            && asset.orientation != wanted
        {
            return Err(Rejection::Orientation);
        }
        if let Some(tag) = self.skip_tag.as_deref()
            && asset.has_tag(tag)
        {
            return Err(Rejection::SkipTag);
        }
        if let Some(person) = source.person()
            && !asset.features_person(person)
        {
            return Err(Rejection::MissingPerson);
        }
        if self.exclude.contains(&asset.id) {
            return Err(Rejection::Excluded);
        }
        Ok(())
    }

    pub fn accepts(&self, asset: &Asset, source: &Source) -> bool {
        self.check(asset, source).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_model::PersonId;

    #[test]
    fn rejects_each_disallowed_shape() {
        let policy = FilterPolicy::default();
        let library = Source::Library;

        let mut video = Asset::image("v");
        video.kind = AssetKind::Video;
        assert_eq!(policy.check(&video, &library), Err(Rejection::Kind));

        let mut trashed = Asset::image("t");
        trashed.is_trashed = true;
        assert_eq!(policy.check(&trashed, &library), Err(Rejection::Trashed));

        let mut archived = Asset::image("a");
        archived.is_archived = true;
        assert_eq!(policy.check(&archived, &library), Err(Rejection::Archived));

        let mut skipped = Asset::image("s");
        skipped.tags.push("KIOSK-SKIP".into());
        assert_eq!(policy.check(&skipped, &library), Err(Rejection::SkipTag));

        assert!(policy.accepts(&Asset::image("ok"), &library));
    }

    #[test]
    fn archived_allowed_when_enabled() {
        let policy = FilterPolicy {
            show_archived: true,
            ..FilterPolicy::default()
        };
        let mut archived = Asset::image("a");
        archived.is_archived = true;
        assert!(policy.accepts(&archived, &Source::Library));
    }

    #[test]
    fn person_source_requires_the_person() {
        let policy = FilterPolicy::default();
        let source = Source::Person(PersonId::new("p1"));

        let mut tagged = Asset::image("a");
        tagged.people.push(PersonId::new("p1"));
        assert!(policy.accepts(&tagged, &source));
        assert_eq!(
            policy.check(&Asset::image("b"), &source),
            Err(Rejection::MissingPerson)
        );
    }

    #[test]
    fn orientation_constraint_is_exact() {
        let policy = FilterPolicy {
            orientation: Some(Orientation::Portrait),
            ..FilterPolicy::default()
        };
        let mut portrait = Asset::image("p");
        portrait.orientation = Orientation::Portrait;
        let mut landscape = Asset::image("l");
        landscape.orientation = Orientation::Landscape;

        assert!(policy.accepts(&portrait, &Source::Library));
        assert_eq!(
            policy.check(&landscape, &Source::Library),
            Err(Rejection::Orientation)
        );
    }

    #[test]
    fn videos_opt_in() {
        let mut video = Asset::image("v");
        video.kind = AssetKind::Video;
        assert!(FilterPolicy::with_kinds(true).accepts(&video, &Source::Library));
        assert!(!FilterPolicy::with_kinds(false).accepts(&video, &Source::Library));
    }
}
