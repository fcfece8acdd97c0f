//! AlgoPulse configuration system.
//!
//! Built once at process entry and handed to every component constructor.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PulseError, Result};
use crate::types::{Difficulty, SubscriberDefaults};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_dashboard_url")]
    pub dashboard_url: String,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub bank: BankConfig,
    #[serde(default)]
    pub subscribers: SubscribersConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

fn default_app_name() -> String { "AlgoPulse".into() }
fn default_dashboard_url() -> String { "https://algopulse.dev".into() }

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            dashboard_url: default_dashboard_url(),
            generation: GenerationConfig::default(),
            bank: BankConfig::default(),
            subscribers: SubscribersConfig::default(),
            email: EmailConfig::default(),
            store: StoreConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl PulseConfig {
    /// Load config from the default path (~/.algopulse/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PulseError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| PulseError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Fill empty email credentials from `EMAIL_SENDER` / `EMAIL_PASSWORD`.
    /// Provider API keys are resolved by the provider constructors.
    pub fn resolve_env(&mut self) {
        if self.email.sender.is_empty()
            && let Ok(sender) = std::env::var("EMAIL_SENDER") {
                self.email.sender = sender;
            }
        if self.email.password.is_empty()
            && let Ok(password) = std::env::var("EMAIL_PASSWORD") {
                self.email.password = password;
            }
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the AlgoPulse home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".algopulse")
    }
}

/// One generation provider slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Registry name ("gemini", "groq", "openai", ...) or "custom:<url>".
    pub provider: String,
    pub model: String,
    /// Empty = resolve from the registry's env vars.
    #[serde(default)]
    pub api_key: String,
    /// Empty = registry default base URL.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_temperature() -> f32 { 0.7 }

/// Generation gateway configuration: primary first, optional fallback second.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_primary")]
    pub primary: ProviderSettings,
    #[serde(default = "default_fallback")]
    pub fallback: Option<ProviderSettings>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_primary() -> ProviderSettings {
    ProviderSettings {
        provider: "gemini".into(),
        model: "gemini-2.5-flash".into(),
        api_key: String::new(),
        endpoint: String::new(),
        temperature: 0.7,
    }
}
fn default_fallback() -> Option<ProviderSettings> {
    Some(ProviderSettings {
        provider: "groq".into(),
        model: "llama-3.3-70b-versatile".into(),
        api_key: String::new(),
        endpoint: String::new(),
        temperature: 0.5,
    })
}
fn default_timeout_secs() -> u64 { 30 }
fn default_system_prompt() -> String { "You are a DSA expert. Return valid JSON only.".into() }

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            fallback: default_fallback(),
            timeout_secs: default_timeout_secs(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// Question bank configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankConfig {
    /// Items requested per refill.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Candidate items fetched per claim query.
    #[serde(default = "default_claim_window")]
    pub claim_window: usize,
    #[serde(default = "default_bank_collection")]
    pub collection: String,
}

fn default_batch_size() -> usize { 10 }
fn default_claim_window() -> usize { 5 }
fn default_bank_collection() -> String { "question_bank".into() }

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            claim_window: default_claim_window(),
            collection: default_bank_collection(),
        }
    }
}

/// Subscriber collection and preference defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribersConfig {
    #[serde(default = "default_subscriber_collection")]
    pub collection: String,
    #[serde(default = "default_topic")]
    pub default_topic: String,
    #[serde(default = "default_difficulty")]
    pub default_difficulty: Difficulty,
    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_subscriber_collection() -> String { "subscribers".into() }
fn default_topic() -> String { "Arrays".into() }
fn default_difficulty() -> Difficulty { Difficulty::Medium }
fn default_language() -> String { "Python".into() }

impl Default for SubscribersConfig {
    fn default() -> Self {
        Self {
            collection: default_subscriber_collection(),
            default_topic: default_topic(),
            default_difficulty: default_difficulty(),
            default_language: default_language(),
        }
    }
}

impl SubscribersConfig {
    pub fn defaults(&self) -> SubscriberDefaults {
        SubscriberDefaults {
            topic: self.default_topic.clone(),
            difficulty: self.default_difficulty,
            language: self.default_language.clone(),
        }
    }
}

/// SMTP delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTPS on connect (port 465) instead of STARTTLS.
    #[serde(default = "bool_true")]
    pub implicit_tls: bool,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_display_name")]
    pub display_name: String,
}

fn bool_true() -> bool { true }
fn default_smtp_host() -> String { "smtp.gmail.com".into() }
fn default_smtp_port() -> u16 { 465 }
fn default_display_name() -> String { "AlgoPulse".into() }

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            implicit_tls: true,
            sender: String::new(),
            password: String::new(),
            display_name: default_display_name(),
        }
    }
}

/// Document store backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "memory".
    #[serde(default = "default_store_backend")]
    pub backend: String,
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_backend() -> String { "sqlite".into() }
fn default_store_path() -> String { "~/.algopulse/algopulse.db".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

impl StoreConfig {
    /// Store path with `~` expanded.
    pub fn expanded_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

/// Dispatch coordinator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Groups processed concurrently (1 = sequential).
    #[serde(default = "default_max_parallel_groups")]
    pub max_parallel_groups: usize,
}

fn default_max_parallel_groups() -> usize { 1 }

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_parallel_groups: default_max_parallel_groups(),
        }
    }
}
