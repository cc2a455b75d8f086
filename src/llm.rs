//! # Language Model Module
//!
//! - [`Message`]/[`Role`]: provider-agnostic chat messages
//! - [`LanguageModelProvider`]: free-text and schema-constrained completion
//! - [`RigLanguageModel`]: the rig-core backed implementation (OpenAI or Ollama)

use std::sync::Arc;

use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::{ollama, openai};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Config, LlmBackend};
use crate::error::LlmError;

// =============================================================================
// MESSAGES
// =============================================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Join every system message into a single preamble.
pub fn system_preamble(messages: &[Message]) -> Option<String> {
    let parts: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// The last user message, which is what gets sent as the prompt.
pub fn last_user_prompt(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rfind(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================
/// Types a model can be asked to produce directly.
pub trait StructuredOutput:
    JsonSchema + DeserializeOwned + Serialize + Send + Sync + 'static
{
}

impl<T> StructuredOutput for T where
    T: JsonSchema + DeserializeOwned + Serialize + Send + Sync + 'static
{
}

/// Chat-style language model access.
#[async_trait]
pub trait LanguageModelProvider: Send + Sync {
    /// Free-text completion.
    async fn complete_text(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// Completion constrained to the JSON schema of `T`.
    async fn complete_structured<T>(&self, messages: &[Message]) -> Result<T, LlmError>
    where
        T: StructuredOutput;
}

#[async_trait]
impl<P> LanguageModelProvider for Arc<P>
where
    P: LanguageModelProvider,
{
    async fn complete_text(&self, messages: &[Message]) -> Result<String, LlmError> {
        (**self).complete_text(messages).await
    }

    async fn complete_structured<T>(&self, messages: &[Message]) -> Result<T, LlmError>
    where
        T: StructuredOutput,
    {
        (**self).complete_structured::<T>(messages).await
    }
}

// =============================================================================
// RIG IMPLEMENTATION
// =============================================================================
enum RigClient {
    OpenAI(openai::Client),
    Ollama(ollama::Client),
}

/// Language model backed by rig-core.
///
/// System messages become the agent preamble and the last user message is
/// the prompt; the pipeline never sends multi-turn histories.
pub struct RigLanguageModel {
    client: RigClient,
    model: String,
    temperature: f64,
}

impl RigLanguageModel {
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let client = match config.backend {
            LlmBackend::OpenAI => {
                let api_key = config.openai_api_key.clone().ok_or_else(|| {
                    LlmError::Configuration("OPENAI_API_KEY is not set".to_string())
                })?;
                RigClient::OpenAI(openai::Client::from_val(api_key.into()))
            }
            LlmBackend::Ollama => {
                // rig's Ollama client reads its base URL from the environment
                std::env::set_var("OLLAMA_API_BASE_URL", &config.ollama_host);
                RigClient::Ollama(ollama::Client::from_env())
            }
        };

        debug!(
            backend = %config.backend,
            model = %config.model,
            "Language model client created"
        );

        Ok(Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LanguageModelProvider for RigLanguageModel {
    async fn complete_text(&self, messages: &[Message]) -> Result<String, LlmError> {
        let preamble = system_preamble(messages).unwrap_or_default();
        let prompt = last_user_prompt(messages).ok_or(LlmError::MissingPrompt)?;

        let result = match &self.client {
            RigClient::OpenAI(client) => {
                let agent = client
                    .agent(&self.model)
                    .preamble(&preamble)
                    .temperature(self.temperature)
                    .build();
                agent.prompt(prompt).await
            }
            RigClient::Ollama(client) => {
                let agent = client
                    .agent(&self.model)
                    .preamble(&preamble)
                    .temperature(self.temperature)
                    .build();
                agent.prompt(prompt).await
            }
        };

        result.map_err(|e| LlmError::Completion(e.to_string()))
    }

    async fn complete_structured<T>(&self, messages: &[Message]) -> Result<T, LlmError>
    where
        T: StructuredOutput,
    {
        let preamble = system_preamble(messages).unwrap_or_default();
        let prompt = last_user_prompt(messages).ok_or(LlmError::MissingPrompt)?;

        let result = match &self.client {
            RigClient::OpenAI(client) => {
                let extractor = client
                    .extractor::<T>(&self.model)
                    .preamble(&preamble)
                    .build();
                extractor.extract(prompt).await
            }
            RigClient::Ollama(client) => {
                let extractor = client
                    .extractor::<T>(&self.model)
                    .preamble(&preamble)
                    .build();
                extractor.extract(prompt).await
            }
        };

        result.map_err(|e| LlmError::Structured(e.to_string()))
    }
}
