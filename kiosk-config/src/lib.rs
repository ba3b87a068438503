//! Configuration for the kiosk server.
//!
//! Values are layered: built-in defaults, then `kiosk.toml`, then `KIOSK_*`
//! environment variables (a `.env` file is honoured). Per-request display
//! overrides are applied on top through [`DisplaySettings::apply_overrides`].
#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod overrides;
pub mod sources;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    CacheConfig, Config, ConfigMetadata, DisplaySettings, ProviderConfig,
    ServerConfig, WebhookConfig,
};
pub use overrides::{OverrideError, RESERVED_KEYS, is_override_key};
pub use validation::{ConfigWarning, ConfigWarnings};
