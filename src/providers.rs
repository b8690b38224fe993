//! Builds the LLM transport named by the stored settings.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use webrefactor_config::{ProviderKind, Settings};
use webrefactor_protocols::{LLMProvider, ProviderError};
use webrefactor_provider_anthropic::AnthropicProvider;
use webrefactor_provider_openai::OpenAIProvider;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Provider for `settings`, routed through the configured proxy.
pub(crate) fn build_provider(settings: &Settings) -> Result<Arc<dyn LLMProvider>, ProviderError> {
    let client = http_client(settings)?;
    let api_key = settings.api_key.clone();
    let api_url = settings.api_url.clone();

    debug!(provider = %settings.provider, %api_url, proxy = settings.proxy().is_some(), "Building provider");
    let provider: Arc<dyn LLMProvider> = match settings.provider {
        ProviderKind::OpenAI => Arc::new(OpenAIProvider::with_url(api_key, api_url).with_client(client)),
        ProviderKind::Anthropic => {
            Arc::new(AnthropicProvider::with_url(api_key, api_url).with_client(client))
        }
        ProviderKind::Custom => Arc::new(
            OpenAIProvider::with_url(api_key, api_url)
                .with_id("custom")
                .with_client(client),
        ),
    };
    Ok(provider)
}

fn http_client(settings: &Settings) -> Result<reqwest::Client, ProviderError> {
    let mut builder = reqwest::Client::builder().timeout(HTTP_TIMEOUT);
    if let Some(proxy) = settings.proxy() {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| ProviderError::InvalidRequest(format!("invalid proxy url '{proxy}': {e}")))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| ProviderError::Network(format!("failed to build HTTP client: {e}")))
}
