use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use kiosk_core::{Layout, history::DEFAULT_HISTORY_MAX};
use thiserror::Error;
use url::Url;

use crate::{
    models::{
        CacheConfig, Config, ConfigMetadata, DisplaySettings, ProviderConfig,
        ServerConfig, WebhookConfig, parse_orientation,
    },
    sources::{EnvConfig, FileConfig},
    validation::{ConfigWarnings, apply_guard_rails},
};

const DEFAULT_CONFIG_LOCATIONS: &[&str] = &["kiosk.toml", "config/kiosk.toml"];
const DEFAULT_PROVIDER_URL: &str = "http://localhost:2283";

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Loads `.env`, then the TOML file, then `KIOSK_*` overrides.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Same as [`Self::load`] but with an explicit environment layer and no
    /// `.env` handling.
    pub fn load_with_env(&self, env: EnvConfig) -> Result<ConfigLoad, ConfigLoadError> {
        let (file, config_path) = self.load_file_config(&env)?;
        let mut warnings = ConfigWarnings::default();
        if config_path.is_none() {
            warnings.push_with_hint(
                "No kiosk.toml detected; using defaults and environment variables",
                "Create kiosk.toml or set KIOSK_CONFIG to point at one",
            );
        }

        let config = compose(file.unwrap_or_default(), env, config_path)?;
        warnings.extend(apply_guard_rails(&config));
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match explicit {
            Some(path) if path.exists() => path,
            Some(path) => return Err(ConfigLoadError::MissingConfig { path }),
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => path,
                None => return Ok((None, None)),
            },
        };

        let file = read_file_config(&path)?;
        Ok((Some(file), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn duration(
    field: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match raw {
        None => Ok(default),
        Some(value) => humantime::parse_duration(value.trim()).map_err(|source| {
            ConfigLoadError::InvalidDuration {
                field,
                value,
                source,
            }
        }),
    }
}

fn url(field: &'static str, raw: &str) -> Result<Url, ConfigLoadError> {
    Url::parse(raw.trim()).map_err(|source| ConfigLoadError::InvalidUrl {
        field,
        value: raw.to_string(),
        source,
    })
}

fn compose(
    file: FileConfig,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<Config, ConfigLoadError> {
    let FileConfig {
        server: file_server,
        provider: file_provider,
        cache: file_cache,
        display: file_display,
        webhooks: file_webhooks,
    } = file;

    let server = ServerConfig {
        host: env
            .server_host
            .or(file_server.host)
            .unwrap_or_else(|| "0.0.0.0".to_string()),
        port: env.server_port.or(file_server.port).unwrap_or(3000),
    };

    let provider = ProviderConfig {
        url: url(
            "provider.url",
            env.provider_url
                .as_deref()
                .or(file_provider.url.as_deref())
                .unwrap_or(DEFAULT_PROVIDER_URL),
        )?,
        api_key: env.api_key.or(file_provider.api_key).unwrap_or_default(),
        timeout: duration(
            "provider.timeout",
            env.provider_timeout.or(file_provider.timeout),
            Duration::from_secs(10),
        )?,
        retries: env.provider_retries.or(file_provider.retries).unwrap_or(3),
        page_size: env.page_size.or(file_provider.page_size).unwrap_or(100),
        users: file_provider.users,
    };

    let cache = CacheConfig {
        enabled: env.cache_enabled.or(file_cache.enabled).unwrap_or(true),
        ttl: duration(
            "cache.ttl",
            env.cache_ttl.or(file_cache.ttl),
            Duration::from_secs(10 * 60),
        )?,
        sweep_interval: duration(
            "cache.sweep_interval",
            env.sweep_interval.or(file_cache.sweep_interval),
            Duration::from_secs(5 * 60),
        )?,
        prefetch_depth: env
            .prefetch_depth
            .or(file_cache.prefetch_depth)
            .unwrap_or(1),
        history_max: env
            .history_max
            .or(file_cache.history_max)
            .unwrap_or(DEFAULT_HISTORY_MAX),
    };

    let defaults = DisplaySettings::default();
    let layout = match env.layout.or(file_display.layout) {
        Some(raw) => raw
            .parse::<Layout>()
            .map_err(|reason| ConfigLoadError::InvalidValue {
                field: "display.layout",
                value: raw,
                reason,
            })?,
        None => defaults.layout,
    };
    let orientation = match file_display.orientation {
        Some(raw) => {
            parse_orientation(&raw).map_err(|reason| ConfigLoadError::InvalidValue {
                field: "display.orientation",
                value: raw,
                reason,
            })?
        }
        None => defaults.orientation,
    };
    let display = DisplaySettings {
        people: env.people.or(file_display.people).unwrap_or_default(),
        albums: env.albums.or(file_display.albums).unwrap_or_default(),
        dates: env.dates.or(file_display.dates).unwrap_or_default(),
        memories: env.memories.or(file_display.memories).unwrap_or(false),
        favourites: file_display.favourites.unwrap_or(false),
        weighting: env.weighting.or(file_display.weighting).unwrap_or(false),
        show_archived: env
            .show_archived
            .or(file_display.show_archived)
            .unwrap_or(false),
        show_videos: env
            .show_videos
            .or(file_display.show_videos)
            .unwrap_or(false),
        orientation,
        layout,
        skip_tag: match file_display.skip_tag {
            Some(tag) if tag.trim().is_empty() => None,
            Some(tag) => Some(tag.trim().to_string()),
            None => defaults.skip_tag,
        },
        user: file_display.user.unwrap_or_default(),
    };

    let webhooks = WebhookConfig {
        urls: env
            .webhook_urls
            .or(file_webhooks.urls)
            .unwrap_or_default()
            .iter()
            .map(|raw| url("webhooks.urls", raw))
            .collect::<Result<_, _>>()?,
        timeout: duration(
            "webhooks.timeout",
            file_webhooks.timeout,
            Duration::from_secs(5),
        )?,
    };

    Ok(Config {
        server,
        provider,
        cache,
        display,
        webhooks,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
        },
    })
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid duration for {field}: '{value}'")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("invalid URL for {field}: '{value}'")]
    InvalidUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_model::Orientation;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn env(pairs: &[(&str, &str)]) -> EnvConfig {
        EnvConfig::from_vars(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    #[test]
    fn reads_every_section_from_toml() {
        let file = write_config(
            r#"
            [server]
            port = 8123

            [provider]
            url = "http://photos.lan:2283"
            api_key = "secret"
            timeout = "30s"

            [provider.users]
            alice = "alice-key"

            [cache]
            ttl = "15m"
            prefetch_depth = 2

            [display]
            people = ["p1"]
            albums = ["favourites"]
            weighting = true
            orientation = "portrait"
            layout = "split"

            [webhooks]
            urls = ["http://hooks.lan/kiosk"]
            "#,
        );

        let load = ConfigLoader::new()
            .with_config_path(file.path())
            .load_with_env(EnvConfig::default())
            .unwrap();
        let config = load.config;

        assert_eq!(config.server.port, 8123);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.provider.url.as_str(), "http://photos.lan:2283/");
        assert_eq!(config.provider.timeout, Duration::from_secs(30));
        assert_eq!(config.provider.users.get("alice").map(String::as_str), Some("alice-key"));
        assert_eq!(config.cache.ttl, Duration::from_secs(15 * 60));
        assert_eq!(config.cache.sweep_interval, Duration::from_secs(5 * 60));
        assert_eq!(config.cache.prefetch_depth, 2);
        assert_eq!(config.cache.history_max, 20);
        assert_eq!(config.display.layout, Layout::Split);
        assert_eq!(config.display.orientation, Some(Orientation::Portrait));
        assert!(config.display.weighting);
        assert_eq!(config.webhooks.urls.len(), 1);
        assert_eq!(config.metadata.config_path.as_deref(), Some(file.path()));
        assert!(load.warnings.is_empty(), "{:?}", load.warnings);
    }

    #[test]
    fn environment_wins_over_file() {
        let file = write_config(
            r#"
            [server]
            port = 8123
            [provider]
            api_key = "from-file"
            "#,
        );

        let config = ConfigLoader::new()
            .with_config_path(file.path())
            .load_with_env(env(&[
                ("KIOSK_SERVER_PORT", "9000"),
                ("KIOSK_API_KEY", "from-env"),
                ("KIOSK_CACHE_TTL", "2m"),
            ]))
            .unwrap()
            .config;

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.provider.api_key, "from-env");
        assert_eq!(config.cache.ttl, Duration::from_secs(120));
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = ConfigLoader::new()
            .with_config_path("/definitely/not/here/kiosk.toml")
            .load_with_env(EnvConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
    }

    #[test]
    fn bad_values_are_rejected() {
        let file = write_config("[cache]\nttl = \"soon\"\n");
        let err = ConfigLoader::new()
            .with_config_path(file.path())
            .load_with_env(EnvConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::InvalidDuration { field: "cache.ttl", .. }
        ));

        let file = write_config("[display]\nlayout = \"mosaic\"\n");
        let err = ConfigLoader::new()
            .with_config_path(file.path())
            .load_with_env(EnvConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::InvalidValue { field: "display.layout", .. }
        ));
    }

    #[test]
    fn malformed_toml_reports_the_path() {
        let file = write_config("[server\nport = 1");
        let err = ConfigLoader::new()
            .with_config_path(file.path())
            .load_with_env(EnvConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse { .. }));
    }
}
