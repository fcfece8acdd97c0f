//! Generation gateway: primary provider with ordered fallbacks.
//!
//! Try primary → fallback, first success wins. A response that must be JSON
//! but does not parse counts as a failure of that provider. No retries beyond
//! the chain and no backoff: every run is a discrete scheduled invocation.

use pulse_core::error::{PulseError, Result};
use pulse_core::traits::provider::{CompletionRequest, Provider};
use serde_json::Value;

use crate::json::parse_json;

/// Content returned by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum Generated {
    Json(Value),
    Text(String),
}

impl Generated {
    pub fn into_json(self) -> Option<Value> {
        match self {
            Generated::Json(v) => Some(v),
            Generated::Text(_) => None,
        }
    }
}

/// Ordered chain of providers behind one `generate` call.
pub struct GenerationGateway {
    providers: Vec<Box<dyn Provider>>,
    system_prompt: Option<String>,
}

impl GenerationGateway {
    /// Create a chain. First provider is primary, rest are fallbacks.
    pub fn new(providers: Vec<Box<dyn Provider>>) -> Self {
        Self {
            providers,
            system_prompt: None,
        }
    }

    /// Create from a primary + optional fallback.
    pub fn with_fallback(primary: Box<dyn Provider>, fallback: Option<Box<dyn Provider>>) -> Self {
        let mut providers = vec![primary];
        providers.extend(fallback);
        Self::new(providers)
    }

    /// System prompt sent with every request.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = (!prompt.is_empty()).then_some(prompt);
        self
    }

    /// Number of providers in the chain.
    pub fn chain_len(&self) -> usize {
        self.providers.len()
    }

    /// Provider names in attempt order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Run `prompt` through the chain. With `expect_json`, the first response
    /// that parses as JSON wins; otherwise the first non-error text does.
    pub async fn generate(&self, prompt: &str, expect_json: bool) -> Result<Generated> {
        let mut request = CompletionRequest::new(prompt).json(expect_json);
        if let Some(system) = &self.system_prompt {
            request = request.with_system(system.clone());
        }

        let mut errors = Vec::new();
        for (idx, provider) in self.providers.iter().enumerate() {
            tracing::debug!("🤖 Attempting {} (slot {})", provider.name(), idx);

            let outcome = match provider.complete(&request).await {
                Ok(text) if expect_json => parse_json(&text).map(Generated::Json),
                Ok(text) => Ok(Generated::Text(text)),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(generated) => {
                    if idx > 0 {
                        tracing::info!(
                            "🔄 Failover: {} → {} (success)",
                            self.providers[0].name(),
                            provider.name()
                        );
                    }
                    return Ok(generated);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Provider {} failed: {}", provider.name(), e);
                    errors.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        if errors.is_empty() {
            return Err(PulseError::GenerationUnavailable(
                "no generation providers configured".into(),
            ));
        }
        Err(PulseError::GenerationUnavailable(errors.join("; ")))
    }
}
