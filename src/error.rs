//! # Error Types
//!
//! Typed failures for the two provider seams and for the pipeline itself.
//! Provider errors are mostly absorbed by the pipeline; only a failed
//! recommendation step reaches the caller as a [`ResearchError`].

use thiserror::Error;

use crate::pipeline::Stage;

// =============================================================================
// SEARCH / SCRAPE PROVIDER ERRORS
// =============================================================================
/// Failures raised by a [`SearchScrapeProvider`](crate::search::SearchScrapeProvider).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized - check FIRECRAWL_API_KEY")]
    Unauthorized,

    #[error("Rate limited by search provider, please wait")]
    RateLimited,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("HTTP error ({0}): {1}")]
    HttpError(u16, String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Provider reported an unsuccessful request: {0}")]
    Unsuccessful(String),

    #[error("No markdown content returned for {0}")]
    MissingContent(String),
}

impl ProviderError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout
                | ProviderError::Connection(_)
                | ProviderError::RateLimited
                | ProviderError::ServerError(_, _)
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_connect() {
            ProviderError::Connection(e.to_string())
        } else if e.is_decode() {
            ProviderError::Parse(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

// =============================================================================
// LANGUAGE MODEL ERRORS
// =============================================================================
/// Failures raised by a [`LanguageModelProvider`](crate::llm::LanguageModelProvider).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("Completion failed: {0}")]
    Completion(String),

    #[error("Structured output failed: {0}")]
    Structured(String),

    #[error("No user message to prompt the model with")]
    MissingPrompt,

    #[error("LLM configuration error: {0}")]
    Configuration(String),
}

// =============================================================================
// PIPELINE ERRORS
// =============================================================================
/// The only failure that escapes [`ResearchPipeline::run`](crate::pipeline::ResearchPipeline::run).
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: LlmError,
    },
}

impl ResearchError {
    /// The stage whose failure aborted the run.
    pub fn stage(&self) -> Stage {
        match self {
            ResearchError::Stage { stage, .. } => *stage,
        }
    }
}
