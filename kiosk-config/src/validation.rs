use std::fmt;

use crate::models::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hint {
            Some(hint) => write!(f, "{} (hint: {hint})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

/// Settings that load fine but will probably not behave as intended.
pub fn apply_guard_rails(config: &Config) -> ConfigWarnings {
    let mut warnings = ConfigWarnings::default();

    if config.provider.api_key.trim().is_empty() {
        warnings.push_with_hint(
            "No provider API key configured; every provider call will be rejected",
            "Set provider.api_key or KIOSK_API_KEY",
        );
    }
    for (user, key) in &config.provider.users {
        if key.trim().is_empty() {
            warnings.push(format!("Provider user '{user}' has an empty API key"));
        }
    }
    if config.cache.enabled && config.cache.ttl.is_zero() {
        warnings.push_with_hint(
            "cache.ttl is zero; cached batches expire immediately",
            "Disable the cache with cache.enabled = false instead",
        );
    }
    if config.cache.enabled && config.cache.prefetch_depth == 0 {
        warnings.push("cache.prefetch_depth is zero; views are never prefetched");
    }
    if config.cache.history_max < 2 {
        warnings.push("cache.history_max below 2 disables going back");
    }
    if config.provider.page_size == 0 {
        warnings.push("provider.page_size is zero; one asset is requested per batch");
    }

    warnings
}
