use std::fmt::{self, Display, Formatter};

use chrono::{Days, NaiveDate};

use crate::error::{ModelError, Result};
use crate::ids::{AlbumId, PersonId};

/// Inclusive calendar range an asset's capture date must fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// Parses a configured date token relative to `today`.
    ///
    /// Accepted forms: `today`, `last-N-days`, and `A_to_B` where each side
    /// is either `YYYY-MM-DD` or `today`. Reversed bounds are swapped.
    pub fn parse(token: &str, today: NaiveDate) -> Result<Self> {
        let raw = token.trim().to_ascii_lowercase();
        let invalid = || ModelError::InvalidDateRange(token.to_string());

        if raw == "today" {
            return Ok(Self::new(today, today));
        }

        if let Some(days) = raw
            .strip_prefix("last-")
            .and_then(|rest| rest.strip_suffix("-days"))
        {
            let days: u64 = days.parse().map_err(|_| invalid())?;
            let start = today.checked_sub_days(Days::new(days)).ok_or_else(invalid)?;
            return Ok(Self::new(start, today));
        }

        let (from, to) = raw.split_once("_to_").ok_or_else(invalid)?;
        let parse_side = |side: &str| -> Result<NaiveDate> {
            if side == "today" {
                return Ok(today);
            }
            NaiveDate::parse_from_str(side, "%Y-%m-%d").map_err(|_| invalid())
        };

        Ok(Self::new(parse_side(from)?, parse_side(to)?))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_to_{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// A named selection criterion assets may be drawn from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "kind", content = "id", rename_all = "snake_case")
)]
pub enum Source {
    Person(PersonId),
    Album(AlbumId),
    DateRange(DateRange),
    Favourites,
    Memories,
    /// No constraint: any asset in the library.
    Library,
}

/// Discriminant of [`Source`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Person,
    Album,
    DateRange,
    Favourites,
    Memories,
    Library,
}

impl Source {
    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Person(_) => SourceKind::Person,
            Source::Album(_) => SourceKind::Album,
            Source::DateRange(_) => SourceKind::DateRange,
            Source::Favourites => SourceKind::Favourites,
            Source::Memories => SourceKind::Memories,
            Source::Library => SourceKind::Library,
        }
    }

    pub fn person(&self) -> Option<&PersonId> {
        match self {
            Source::Person(id) => Some(id),
            _ => None,
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Source::Person(id) => write!(f, "person:{id}"),
            Source::Album(id) => write!(f, "album:{id}"),
            Source::DateRange(range) => write!(f, "date:{range}"),
            Source::Favourites => write!(f, "favourites"),
            Source::Memories => write!(f, "memories"),
            Source::Library => write!(f, "library"),
        }
    }
}

/// A source paired with the number of assets it currently matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightedCandidate {
    pub source: Source,
    pub weight: u64,
}

impl WeightedCandidate {
    pub fn new(source: Source, weight: u64) -> Self {
        Self { source, weight }
    }

    /// Sentinel used when no source is configured or none survived counting.
    pub fn unconstrained() -> Self {
        Self {
            source: Source::Library,
            weight: 0,
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        matches!(self.source, Source::Library)
    }
}
