//! AlgoPulse error taxonomy.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PulseError>;

#[derive(Debug, Error)]
pub enum PulseError {
    /// A bucket still had no unused item after a refill.
    #[error("Question bank exhausted for {0}")]
    BankExhausted(String),

    /// The generation gateway errored or returned an unusable batch during refill.
    #[error("Refill failed for {bucket}: {reason}")]
    RefillFailed { bucket: String, reason: String },

    /// Every provider in the generation chain failed.
    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// The transport rejected a single send.
    #[error("Delivery to {to} failed: {reason}")]
    DeliveryFailed { to: String, reason: String },

    /// The document store could not be reached or refused an operation.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API key missing for provider: {0}")]
    ApiKeyMissing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PulseError {
    /// Failures that make the whole run meaningless.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PulseError::StoreUnavailable(_))
    }

    /// Short machine-friendly name, used in run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            PulseError::BankExhausted(_) => "bank_exhausted",
            PulseError::RefillFailed { .. } => "refill_failed",
            PulseError::GenerationUnavailable(_) => "generation_unavailable",
            PulseError::DeliveryFailed { .. } => "delivery_failed",
            PulseError::StoreUnavailable(_) => "store_unavailable",
            PulseError::InvalidRecord(_) => "invalid_record",
            PulseError::Provider(_) => "provider",
            PulseError::Http(_) => "http",
            PulseError::ApiKeyMissing(_) => "api_key_missing",
            PulseError::Config(_) => "config",
            PulseError::Io(_) => "io",
            PulseError::Json(_) => "json",
        }
    }
}
