//! Provider registry: maps provider names to endpoint configurations.
//!
//! Every generation backend AlgoPulse talks to speaks the OpenAI chat
//! completions dialect, so a provider is fully described by its endpoint,
//! auth style and where to find its key.

/// How to attach auth credentials to requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// No authentication required (local servers).
    None,
}

/// Configuration for a single provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider identifier.
    pub name: &'static str,
    /// Base URL for the API.
    pub base_url: &'static str,
    /// Environment variable names to try for the API key (in order).
    pub env_keys: &'static [&'static str],
    /// How to send auth credentials.
    pub auth_style: AuthStyle,
    /// Environment variable to override the base URL (e.g., OLLAMA_HOST).
    pub base_url_env: Option<&'static str>,
    /// Model used when the config leaves `model` empty.
    pub default_model: &'static str,
    /// Whether `response_format: json_object` is accepted.
    pub json_mode: bool,
}

/// Every provider the generation config may name. `custom:<url>` covers
/// anything else.
static PROVIDERS: &[ProviderConfig] = &[
    ProviderConfig {
        name: "gemini",
        base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
        env_keys: &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        auth_style: AuthStyle::Bearer,
        base_url_env: None,
        default_model: "gemini-2.5-flash",
        json_mode: true,
    },
    ProviderConfig {
        name: "groq",
        base_url: "https://api.groq.com/openai/v1",
        env_keys: &["GROQ_API_KEY"],
        auth_style: AuthStyle::Bearer,
        base_url_env: None,
        default_model: "llama-3.3-70b-versatile",
        json_mode: true,
    },
    ProviderConfig {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        env_keys: &["OPENAI_API_KEY"],
        auth_style: AuthStyle::Bearer,
        base_url_env: None,
        default_model: "gpt-4o-mini",
        json_mode: true,
    },
    ProviderConfig {
        name: "openrouter",
        base_url: "https://openrouter.ai/api/v1",
        env_keys: &["OPENROUTER_API_KEY", "OPENAI_API_KEY"],
        auth_style: AuthStyle::Bearer,
        base_url_env: None,
        default_model: "openai/gpt-4o-mini",
        json_mode: true,
    },
    ProviderConfig {
        name: "ollama",
        base_url: "http://localhost:11434/v1",
        env_keys: &[],
        auth_style: AuthStyle::None,
        base_url_env: Some("OLLAMA_HOST"),
        default_model: "llama3.2",
        json_mode: true,
    },
];

/// Look up a provider config by name.
pub fn get_provider_config(name: &str) -> Option<&'static ProviderConfig> {
    let lookup = if name == "google" { "gemini" } else { name };
    PROVIDERS.iter().find(|p| p.name == lookup)
}
