use std::sync::Arc;

use anyhow::Context;
use kiosk_config::Config;
use kiosk_core::{
    Orchestrator, ProviderSet,
    cache::{BatchCache, RenderedCache},
    orchestrator::OrchestratorSettings,
    provider::HttpAssetProvider,
    render::{ImageRenderer, Renderer},
    webhook::{HttpWebhookNotifier, WebhookNotifier},
};
use tracing::info;

use super::app_state::AppState;

/// Builds one HTTP provider per configured account. The top-level API key
/// backs the default (empty) user.
pub fn build_providers(config: &Config) -> anyhow::Result<ProviderSet> {
    let provider = &config.provider;
    let default = HttpAssetProvider::new(provider.http_config(&provider.api_key))
        .context("failed to build default provider client")?;

    let mut providers = ProviderSet::new(Arc::new(default));
    for (user, api_key) in &provider.users {
        let client = HttpAssetProvider::new(provider.http_config(api_key))
            .with_context(|| format!("failed to build provider client for '{user}'"))?;
        providers = providers.with_user(user.clone(), Arc::new(client));
    }
    Ok(providers)
}

pub fn build_notifier(
    config: &Config,
) -> anyhow::Result<Option<Arc<dyn WebhookNotifier>>> {
    if config.webhooks.urls.is_empty() {
        return Ok(None);
    }
    let notifier: Arc<dyn WebhookNotifier> = Arc::new(
        HttpWebhookNotifier::new(config.webhooks.urls.clone(), config.webhooks.timeout)
            .context("failed to build webhook client")?,
    );
    Ok(Some(notifier))
}

/// Wires providers, caches, renderer and notifier into an orchestrator.
pub fn build_orchestrator(
    config: &Config,
    providers: ProviderSet,
    renderer: Arc<dyn Renderer>,
) -> anyhow::Result<Orchestrator> {
    let notifier = build_notifier(config)?;
    let batches = Arc::new(BatchCache::new(config.cache.batch_settings()));
    let rendered = Arc::new(RenderedCache::new(config.cache.rendered_settings()));
    let settings = OrchestratorSettings {
        page_size: config.provider.page_size,
        ..OrchestratorSettings::default()
    };

    info!(
        provider = %config.provider.url,
        users = config.provider.users.len(),
        cache_enabled = config.cache.enabled,
        cache_ttl = ?config.cache.ttl,
        prefetch_depth = config.cache.prefetch_depth,
        webhooks = config.webhooks.urls.len(),
        "pipeline configured"
    );

    Ok(Orchestrator::with_notifier(
        providers, renderer, notifier, batches, rendered, settings,
    ))
}

pub fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let providers = build_providers(config)?;
    let orchestrator = build_orchestrator(config, providers, Arc::new(ImageRenderer))?;
    Ok(AppState::new(
        orchestrator,
        config.display.clone(),
        config.cache.history_max,
    ))
}
