//! Per-request display overrides taken from the query string.
//!
//! Only keys listed in [`OVERRIDES`] are honoured. A list key replaces the
//! configured list on its first occurrence and appends on later ones, so
//! `?person=a&person=b` shows exactly people `a` and `b`.

use std::{collections::HashSet, fmt};

use kiosk_core::Layout;
use thiserror::Error;
use tracing::debug;

use crate::models::{DisplaySettings, parse_bool, parse_orientation};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value '{value}' for '{key}': {reason}")]
pub struct OverrideError {
    pub key: String,
    pub value: String,
    pub reason: String,
}

/// How an override key writes into [`DisplaySettings`].
#[derive(Clone, Copy)]
pub enum Setter {
    Flag(fn(&mut DisplaySettings, bool)),
    List(fn(&mut DisplaySettings) -> &mut Vec<String>),
    Value(fn(&mut DisplaySettings, &str) -> Result<(), String>),
}

impl fmt::Debug for Setter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Setter::Flag(_) => "Flag",
            Setter::List(_) => "List",
            Setter::Value(_) => "Value",
        })
    }
}

pub const OVERRIDES: &[(&str, Setter)] = &[
    ("person", Setter::List(|s| &mut s.people)),
    ("album", Setter::List(|s| &mut s.albums)),
    ("date", Setter::List(|s| &mut s.dates)),
    ("memories", Setter::Flag(|s, v| s.memories = v)),
    ("favourites", Setter::Flag(|s, v| s.favourites = v)),
    ("favorites", Setter::Flag(|s, v| s.favourites = v)),
    ("weighting", Setter::Flag(|s, v| s.weighting = v)),
    ("show_archived", Setter::Flag(|s, v| s.show_archived = v)),
    ("show_videos", Setter::Flag(|s, v| s.show_videos = v)),
    (
        "layout",
        Setter::Value(|s, v| {
            s.layout = v.parse::<Layout>()?;
            Ok(())
        }),
    ),
    (
        "orientation",
        Setter::Value(|s, v| {
            s.orientation = parse_orientation(v)?;
            Ok(())
        }),
    ),
    (
        "user",
        Setter::Value(|s, v| {
            s.user = v.trim().to_string();
            Ok(())
        }),
    ),
];

/// Whether `key` names a display setting that can be overridden per request.
pub fn is_override_key(key: &str) -> bool {
    setter(key).is_some()
}

fn setter(key: &str) -> Option<Setter> {
    OVERRIDES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, setter)| *setter)
}

/// Query keys consumed by the server itself, skipped without logging.
pub const RESERVED_KEYS: &[&str] = &["device", "history"];

impl DisplaySettings {
    /// Applies whitelisted query overrides in order.
    pub fn apply_overrides<'a, I>(&mut self, pairs: I) -> Result<(), OverrideError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut cleared: HashSet<&str> = HashSet::new();

        for (key, value) in pairs {
            if RESERVED_KEYS.contains(&key) {
                continue;
            }
            let Some(setter) = setter(key) else {
                debug!(key, "ignoring unknown override");
                continue;
            };
            let invalid = |reason: String| OverrideError {
                key: key.to_string(),
                value: value.to_string(),
                reason,
            };

            match setter {
                Setter::Flag(set) => {
                    // A bare `?memories` means on.
                    let flag = if value.trim().is_empty() {
                        true
                    } else {
                        parse_bool(value).ok_or_else(|| invalid("expected a boolean".into()))?
                    };
                    set(self, flag);
                }
                Setter::List(list) => {
                    let items = list(self);
                    if cleared.insert(key) {
                        items.clear();
                    }
                    let value = value.trim();
                    if !value.is_empty() {
                        items.push(value.to_string());
                    }
                }
                Setter::Value(set) => set(self, value).map_err(invalid)?,
            }
        }
        Ok(())
    }
}
