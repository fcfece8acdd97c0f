//! # AlgoPulse Providers
//!
//! Generation backends for AlgoPulse.
//!
//! Every provider is handled by a single `OpenAiCompatibleProvider`; the
//! `GenerationGateway` chains a primary and an optional fallback behind one
//! `generate(prompt, expect_json)` call.

pub mod gateway;
pub mod json;
pub mod openai_compatible;
pub mod provider_registry;

pub use gateway::{Generated, GenerationGateway};

use openai_compatible::OpenAiCompatibleProvider;
use pulse_core::config::{GenerationConfig, ProviderSettings};
use pulse_core::error::{PulseError, Result};

/// Create a provider from one settings slot.
pub fn create_provider(
    settings: &ProviderSettings,
    timeout_secs: u64,
) -> Result<OpenAiCompatibleProvider> {
    let name = settings.provider.as_str();
    if name.starts_with("custom:") {
        return OpenAiCompatibleProvider::custom(settings, timeout_secs);
    }
    let registry = provider_registry::get_provider_config(name)
        .ok_or_else(|| PulseError::Config(format!("unknown provider '{name}'")))?;
    OpenAiCompatibleProvider::from_registry(registry, settings, timeout_secs)
}

/// Build the gateway from config.
///
/// The primary is always in the chain (a missing key surfaces as a failed
/// attempt). A fallback without credentials counts as not configured.
pub fn build_gateway(config: &GenerationConfig) -> Result<GenerationGateway> {
    let primary = create_provider(&config.primary, config.timeout_secs)?;

    let fallback = match &config.fallback {
        Some(settings) => {
            let provider = create_provider(settings, config.timeout_secs)?;
            if provider.has_credentials() {
                Some(provider)
            } else {
                tracing::info!(
                    "ℹ️ Fallback provider '{}' has no API key, running without fallback",
                    settings.provider
                );
                None
            }
        }
        None => None,
    };

    let gateway = GenerationGateway::with_fallback(
        Box::new(primary),
        fallback.map(|p| Box::new(p) as Box<dyn pulse_core::Provider>),
    )
    .system_prompt(config.system_prompt.clone());

    tracing::debug!("🧠 Generation chain: {:?}", gateway.provider_names());
    Ok(gateway)
}
