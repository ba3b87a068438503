use std::{collections::BTreeMap, path::PathBuf, str::FromStr};

use serde::Deserialize;

use crate::models::parse_bool;

/// Raw configuration as written in a TOML file. Durations are humantime
/// strings (`"10m"`, `"30s"`).
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub provider: FileProviderConfig,
    #[serde(default)]
    pub cache: FileCacheConfig,
    #[serde(default)]
    pub display: FileDisplayConfig,
    #[serde(default)]
    pub webhooks: FileWebhookConfig,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FileServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FileProviderConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<String>,
    pub retries: Option<usize>,
    pub page_size: Option<u32>,
    #[serde(default)]
    pub users: BTreeMap<String, String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FileCacheConfig {
    pub enabled: Option<bool>,
    pub ttl: Option<String>,
    pub sweep_interval: Option<String>,
    pub prefetch_depth: Option<usize>,
    pub history_max: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FileDisplayConfig {
    pub people: Option<Vec<String>>,
    pub albums: Option<Vec<String>>,
    pub dates: Option<Vec<String>>,
    pub memories: Option<bool>,
    #[serde(alias = "favorites")]
    pub favourites: Option<bool>,
    pub weighting: Option<bool>,
    pub show_archived: Option<bool>,
    pub show_videos: Option<bool>,
    pub orientation: Option<String>,
    pub layout: Option<String>,
    pub skip_tag: Option<String>,
    pub user: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FileWebhookConfig {
    pub urls: Option<Vec<String>>,
    pub timeout: Option<String>,
}

/// Environment-derived configuration values (`KIOSK_*`).
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub provider_url: Option<String>,
    pub api_key: Option<String>,
    pub provider_timeout: Option<String>,
    pub provider_retries: Option<usize>,
    pub page_size: Option<u32>,
    pub cache_enabled: Option<bool>,
    pub cache_ttl: Option<String>,
    pub sweep_interval: Option<String>,
    pub prefetch_depth: Option<usize>,
    pub history_max: Option<usize>,
    pub people: Option<Vec<String>>,
    pub albums: Option<Vec<String>>,
    pub dates: Option<Vec<String>>,
    pub memories: Option<bool>,
    pub weighting: Option<bool>,
    pub show_archived: Option<bool>,
    pub show_videos: Option<bool>,
    pub layout: Option<String>,
    pub webhook_urls: Option<Vec<String>>,
}

/// `KIOSK_*` variables captured at load time.
struct Vars(BTreeMap<String, String>);

impl Vars {
    fn text(&self, name: &str) -> Option<String> {
        self.0
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T: FromStr>(&self, name: &str) -> Option<T> {
        self.text(name).and_then(|v| v.parse().ok())
    }

    fn flag(&self, name: &str) -> Option<bool> {
        self.text(name).and_then(|v| parse_bool(&v))
    }

    fn list(&self, name: &str) -> Option<Vec<String>> {
        self.text(name).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_vars(std::env::vars_os().filter_map(|(name, value)| {
            Some((name.into_string().ok()?, value.into_string().ok()?))
        }))
    }

    /// Builds the env layer from explicit `(name, value)` pairs. Unknown
    /// names are ignored; numeric or boolean values that fail to parse are
    /// treated as unset.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars = Vars(
            vars.into_iter()
                .filter(|(name, _)| name.starts_with("KIOSK_"))
                .collect(),
        );

        Self {
            config_path: vars.text("KIOSK_CONFIG").map(PathBuf::from),
            server_host: vars.text("KIOSK_SERVER_HOST"),
            server_port: vars.parsed("KIOSK_SERVER_PORT"),
            provider_url: vars.text("KIOSK_PROVIDER_URL"),
            api_key: vars.text("KIOSK_API_KEY"),
            provider_timeout: vars.text("KIOSK_PROVIDER_TIMEOUT"),
            provider_retries: vars.parsed("KIOSK_PROVIDER_RETRIES"),
            page_size: vars.parsed("KIOSK_PAGE_SIZE"),
            cache_enabled: vars.flag("KIOSK_CACHE_ENABLED"),
            cache_ttl: vars.text("KIOSK_CACHE_TTL"),
            sweep_interval: vars.text("KIOSK_CACHE_SWEEP_INTERVAL"),
            prefetch_depth: vars.parsed("KIOSK_PREFETCH_DEPTH"),
            history_max: vars.parsed("KIOSK_HISTORY_MAX"),
            people: vars.list("KIOSK_PEOPLE"),
            albums: vars.list("KIOSK_ALBUMS"),
            dates: vars.list("KIOSK_DATES"),
            memories: vars.flag("KIOSK_MEMORIES"),
            weighting: vars.flag("KIOSK_WEIGHTING"),
            show_archived: vars.flag("KIOSK_SHOW_ARCHIVED"),
            show_videos: vars.flag("KIOSK_SHOW_VIDEOS"),
            layout: vars.text("KIOSK_LAYOUT"),
            webhook_urls: vars.list("KIOSK_WEBHOOK_URLS"),
        }
    }
}
