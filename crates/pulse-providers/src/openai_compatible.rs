//! Unified OpenAI-compatible provider.
//!
//! A single struct that handles chat completions for every backend in the
//! registry (Gemini's OpenAI endpoint, Groq, OpenAI, Ollama, ...).
//! Different providers are distinguished only by endpoint URL, auth style, and API key.

use async_trait::async_trait;
use pulse_core::config::ProviderSettings;
use pulse_core::error::{PulseError, Result};
use pulse_core::traits::provider::{CompletionRequest, Provider};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use crate::provider_registry::{AuthStyle, ProviderConfig};

const CHAT_PATH: &str = "/chat/completions";

/// A unified provider that works with any OpenAI-compatible API.
pub struct OpenAiCompatibleProvider {
    /// Provider name (e.g., "gemini", "groq").
    name: String,
    /// API key for authentication.
    api_key: String,
    /// Base URL for the API (e.g., "https://api.groq.com/openai/v1").
    base_url: String,
    auth_style: AuthStyle,
    model: String,
    temperature: f32,
    /// Whether the backend accepts `response_format`.
    json_mode: bool,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    /// Create from a known provider config + provider settings.
    ///
    /// Resolution order:
    /// - API key: `settings.api_key` > registry env vars > empty
    /// - Base URL: `settings.endpoint` > env override > registry default
    pub fn from_registry(
        registry: &ProviderConfig,
        settings: &ProviderSettings,
        timeout_secs: u64,
    ) -> Result<Self> {
        let api_key = if !settings.api_key.is_empty() {
            settings.api_key.clone()
        } else {
            registry
                .env_keys
                .iter()
                .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
                .unwrap_or_default()
        };

        let base_url = if !settings.endpoint.is_empty() {
            settings.endpoint.trim_end_matches('/').to_string()
        } else {
            registry
                .base_url_env
                .and_then(|env_key| {
                    let val = std::env::var(env_key).ok()?;
                    // OLLAMA_HOST is given without the /v1 suffix
                    if val.ends_with("/v1") {
                        Some(val)
                    } else {
                        Some(format!("{}/v1", val.trim_end_matches('/')))
                    }
                })
                .unwrap_or_else(|| registry.base_url.to_string())
        };

        let model = if settings.model.is_empty() {
            registry.default_model.to_string()
        } else {
            settings.model.clone()
        };

        Ok(Self {
            name: registry.name.to_string(),
            api_key,
            base_url,
            auth_style: registry.auth_style,
            model,
            temperature: settings.temperature,
            json_mode: registry.json_mode,
            client: build_client(timeout_secs)?,
        })
    }

    /// Create for a custom endpoint (e.g., "custom:https://my-server.com/v1").
    pub fn custom(settings: &ProviderSettings, timeout_secs: u64) -> Result<Self> {
        let base_url = settings
            .provider
            .strip_prefix("custom:")
            .unwrap_or(&settings.provider)
            .trim_end_matches('/')
            .to_string();

        let api_key = if !settings.api_key.is_empty() {
            settings.api_key.clone()
        } else {
            std::env::var("CUSTOM_API_KEY").unwrap_or_default()
        };

        let auth_style = if api_key.is_empty() {
            AuthStyle::None
        } else {
            AuthStyle::Bearer
        };

        Ok(Self {
            name: "custom".to_string(),
            api_key,
            base_url,
            auth_style,
            model: settings.model.clone(),
            temperature: settings.temperature,
            json_mode: true,
            client: build_client(timeout_secs)?,
        })
    }

    /// False when the provider needs a key and none was resolved.
    pub fn has_credentials(&self) -> bool {
        self.auth_style == AuthStyle::None || !self.api_key.is_empty()
    }

    /// Build the auth header for the request.
    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_style {
            AuthStyle::Bearer if !self.api_key.is_empty() => {
                req.header("Authorization", format!("Bearer {}", self.api_key))
            }
            _ => req,
        }
    }

    /// Request body in the OpenAI chat completions format.
    fn build_body(&self, request: &CompletionRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages,
        });
        if request.json_mode && self.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PulseError::Http(format!("HTTP client: {e}")))
}

/// Chat completions response; only the fields we read.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pull the first choice's message text out of a completions response.
fn extract_content(name: &str, response: ChatResponse) -> Result<String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| PulseError::Provider(format!("{name}: no choices in response")))?;
    choice
        .message
        .content
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| PulseError::Provider(format!("{name}: empty completion")))
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if !self.has_credentials() {
            return Err(PulseError::ApiKeyMissing(self.name.clone()));
        }

        let body = self.build_body(request);
        let url = format!("{}{CHAT_PATH}", self.base_url);
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        let req = self.apply_auth(req);

        let resp = req.send().await.map_err(|e| {
            PulseError::Http(format!("{} connection failed ({}): {}", self.name, url, e))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            return Err(PulseError::Provider(format!(
                "{} API error {}: {}",
                self.name, status, snippet
            )));
        }

        let response: ChatResponse = resp
            .json()
            .await
            .map_err(|e| PulseError::Http(format!("{}: {e}", self.name)))?;

        extract_content(&self.name, response)
    }
}
