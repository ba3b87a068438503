use std::{collections::BTreeMap, fmt, path::PathBuf, time::Duration};

use chrono::NaiveDate;
use kiosk_core::{
    FilterPolicy, Layout, ViewSettings,
    cache::{CacheSettings, RenderedCacheSettings},
    provider::{HttpProviderConfig, RetryPolicy},
};
use kiosk_model::{AlbumId, DateRange, Orientation, PersonId, Source};
use tracing::warn;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub cache: CacheConfig,
    pub display: DisplaySettings,
    pub webhooks: WebhookConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct ProviderConfig {
    pub url: Url,
    pub api_key: String,
    pub timeout: Duration,
    pub retries: usize,
    pub page_size: u32,
    /// Additional provider accounts, user name to API key.
    pub users: BTreeMap<String, String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("url", &self.url.as_str())
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("page_size", &self.page_size)
            .field("users", &self.users.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderConfig {
    pub fn http_config(&self, api_key: &str) -> HttpProviderConfig {
        let mut config = HttpProviderConfig::new(self.url.clone(), api_key);
        config.timeout = self.timeout;
        config.retry = RetryPolicy {
            max_retries: self.retries,
            ..RetryPolicy::default()
        };
        config
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
    pub sweep_interval: Duration,
    pub prefetch_depth: usize,
    pub history_max: usize,
}

impl CacheConfig {
    pub fn batch_settings(&self) -> CacheSettings {
        CacheSettings {
            enabled: self.enabled,
            ttl: self.ttl,
            sweep_interval: self.sweep_interval,
        }
    }

    pub fn rendered_settings(&self) -> RenderedCacheSettings {
        RenderedCacheSettings {
            enabled: self.enabled,
            depth: self.prefetch_depth,
            max_age: self.ttl,
            sweep_interval: self.sweep_interval,
        }
    }
}

/// What a display shows by default. Every field can be overridden per
/// request through the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySettings {
    pub people: Vec<String>,
    /// Album ids; `favourites`/`favorites` selects favourite assets.
    pub albums: Vec<String>,
    /// Date range tokens such as `2023-01-01_to_today` or `last-30-days`.
    pub dates: Vec<String>,
    pub memories: bool,
    pub favourites: bool,
    pub weighting: bool,
    pub show_archived: bool,
    pub show_videos: bool,
    pub orientation: Option<Orientation>,
    pub layout: Layout,
    pub skip_tag: Option<String>,
    /// Provider account to draw from; empty selects the default account.
    pub user: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            people: Vec::new(),
            albums: Vec::new(),
            dates: Vec::new(),
            memories: false,
            favourites: false,
            weighting: false,
            show_archived: false,
            show_videos: false,
            orientation: None,
            layout: Layout::Single,
            skip_tag: Some(kiosk_core::filter::DEFAULT_SKIP_TAG.to_string()),
            user: String::new(),
        }
    }
}

fn is_favourites_token(album: &str) -> bool {
    album.eq_ignore_ascii_case("favourites") || album.eq_ignore_ascii_case("favorites")
}

impl DisplaySettings {
    /// Configured sources in declaration order: people, albums, dates,
    /// favourites, memories. Date tokens that fail to parse are logged and
    /// skipped.
    pub fn sources(&self, today: NaiveDate) -> Vec<Source> {
        let mut sources: Vec<Source> = Vec::new();
        let mut push = |source: Source| {
            if !sources.contains(&source) {
                sources.push(source);
            }
        };

        for person in self.people.iter().filter(|p| !p.trim().is_empty()) {
            push(Source::Person(PersonId::new(person.trim())));
        }
        for album in self.albums.iter().filter(|a| !a.trim().is_empty()) {
            if is_favourites_token(album.trim()) {
                push(Source::Favourites);
            } else {
                push(Source::Album(AlbumId::new(album.trim())));
            }
        }
        for token in &self.dates {
            match DateRange::parse(token, today) {
                Ok(range) => push(Source::DateRange(range)),
                Err(err) => warn!(token = %token, error = %err, "skipping date range"),
            }
        }
        if self.favourites {
            push(Source::Favourites);
        }
        if self.memories {
            push(Source::Memories);
        }
        sources
    }

    pub fn filter_policy(&self) -> FilterPolicy {
        FilterPolicy {
            show_archived: self.show_archived,
            orientation: self.orientation,
            skip_tag: self.skip_tag.clone(),
            ..FilterPolicy::with_kinds(self.show_videos)
        }
    }

    pub fn to_view_settings(&self, today: NaiveDate) -> ViewSettings {
        ViewSettings {
            sources: self.sources(today),
            weighting: self.weighting,
            policy: self.filter_policy(),
            layout: self.layout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    pub urls: Vec<Url>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

pub fn parse_orientation(raw: &str) -> Result<Option<Orientation>, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "any" | "none" => Ok(None),
        "portrait" => Ok(Some(Orientation::Portrait)),
        "landscape" => Ok(Some(Orientation::Landscape)),
        "square" => Ok(Some(Orientation::Square)),
        other => Err(format!("unknown orientation '{other}'")),
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
