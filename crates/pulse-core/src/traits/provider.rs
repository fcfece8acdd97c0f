//! Content-generation provider.

use async_trait::async_trait;

use crate::error::Result;

/// One prompt for a provider. Model and temperature belong to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    /// Ask the provider for a JSON-only response.
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            json_mode: false,
        }
    }

    pub fn with_system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn json(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Return the raw text of the first completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
