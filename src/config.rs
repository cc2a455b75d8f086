//! # Configuration Module
//!
//! Loads the agent configuration from environment variables (and a `.env`
//! file when present), on top of sensible defaults.

use std::env;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::pipeline::PipelineLimits;
use crate::search::DEFAULT_API_URL;

// =============================================================================
// LLM BACKEND
// =============================================================================
/// Which rig provider answers completion requests.
///
/// # Rust Concept: Derive Macros from Other Crates
///
/// `clap::ValueEnum` generates the parsing for `--backend openai|ollama`,
/// so the CLI rejects unknown backends before `main` runs. The hand-written
/// [`FromStr`] below covers the `LLM_BACKEND` environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LlmBackend {
    #[default]
    #[value(name = "openai")]
    OpenAI,
    Ollama,
}

impl LlmBackend {
    /// Model used when none is configured explicitly.
    pub fn default_model(self) -> &'static str {
        match self {
            LlmBackend::OpenAI => "gpt-5-mini",
            LlmBackend::Ollama => "llama3.2",
        }
    }
}

impl fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmBackend::OpenAI => f.write_str("openai"),
            LlmBackend::Ollama => f.write_str("ollama"),
        }
    }
}

impl FromStr for LlmBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmBackend::OpenAI),
            "ollama" => Ok(LlmBackend::Ollama),
            other => anyhow::bail!("unknown LLM backend '{other}' (expected openai or ollama)"),
        }
    }
}

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Main configuration for the research agent.
///
/// # Rust Concept: Option for Optional Values
///
/// The API keys are `Option<String>` rather than empty strings: `None`
/// means "not configured", and [`Config::validate`] decides which backend
/// needs which key.
#[derive(Debug, Clone)]
pub struct Config {
    /// LLM provider backend
    pub backend: LlmBackend,

    /// Model name passed to the backend (e.g. "gpt-5-mini", "llama3.2")
    pub model: String,

    /// OpenAI API key, required for the openai backend
    pub openai_api_key: Option<String>,

    /// Ollama server URL (default: http://localhost:11434)
    pub ollama_host: String,

    /// Sampling temperature. Lower values give more focused, factual answers
    pub temperature: f64,

    /// Firecrawl API key
    pub firecrawl_api_key: Option<String>,

    /// Firecrawl base URL, overridable for self-hosted instances
    pub firecrawl_api_url: String,

    /// Fan-out and excerpt bounds for the pipeline
    pub limits: PipelineLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: LlmBackend::OpenAI,
            model: LlmBackend::OpenAI.default_model().to_string(),
            openai_api_key: None,
            ollama_host: "http://localhost:11434".to_string(),

            // Research answers should stay close to the scraped facts
            temperature: 0.3,

            firecrawl_api_key: None,
            firecrawl_api_url: DEFAULT_API_URL.to_string(),
            limits: PipelineLimits::default(),
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is read first when present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        Config::default().with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from any key/value source.
    ///
    /// # Rust Concept: Closures as Parameters
    ///
    /// Taking `impl Fn(&str) -> Option<String>` instead of calling
    /// `env::var` directly lets tests feed a plain map without touching
    /// the real process environment.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(val) = lookup("LLM_BACKEND") {
            self.set_backend(val.parse()?, lookup("LLM_MODEL").is_some());
        }

        if let Some(val) = lookup("LLM_MODEL") {
            self.model = val;
        }

        if let Some(val) = lookup("OPENAI_API_KEY") {
            self.openai_api_key = Some(val);
        }

        if let Some(val) = lookup("OLLAMA_API_BASE_URL") {
            self.ollama_host = val;
        }

        if let Some(val) = lookup("TEMPERATURE") {
            self.temperature = val
                .parse()
                .context("TEMPERATURE must be a valid floating-point number (e.g., 0.3)")?;
        }

        if let Some(val) = lookup("FIRECRAWL_API_KEY") {
            self.firecrawl_api_key = Some(val);
        }

        if let Some(val) = lookup("FIRECRAWL_API_URL") {
            self.firecrawl_api_url = val;
        }

        let limits = &mut self.limits;
        for (key, slot) in [
            ("ARTICLE_RESULTS", &mut limits.article_results),
            ("MAX_TOOLS", &mut limits.max_tools),
            ("FALLBACK_RESULTS", &mut limits.fallback_results),
            ("ARTICLE_EXCERPT_CHARS", &mut limits.article_excerpt_chars),
            ("PAGE_EXCERPT_CHARS", &mut limits.page_excerpt_chars),
        ] {
            if let Some(val) = lookup(key) {
                *slot = val
                    .parse()
                    .with_context(|| format!("{key} must be a valid positive integer"))?;
            }
        }

        Ok(self)
    }

    /// Switch to `backend`.
    ///
    /// Unless a model is about to be set explicitly, a model that is still the
    /// previous backend's default follows the switch to the new backend's
    /// default. A customised model is kept.
    pub fn set_backend(&mut self, backend: LlmBackend, explicit_model: bool) {
        if !explicit_model && self.model == self.backend.default_model() {
            self.model = backend.default_model().to_string();
        }
        self.backend = backend;
    }

    /// Validate the configuration before any provider is contacted.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!(
                "Temperature must be between 0.0 and 2.0, got: {}",
                self.temperature
            );
        }

        if self.model.trim().is_empty() {
            anyhow::bail!("LLM_MODEL cannot be empty");
        }

        if self.backend == LlmBackend::OpenAI && self.openai_api_key.is_none() {
            anyhow::bail!("OPENAI_API_KEY must be set when using the openai backend");
        }

        if self.firecrawl_api_key.is_none() {
            anyhow::bail!("FIRECRAWL_API_KEY must be set");
        }

        let limits = &self.limits;
        if limits.article_results == 0 || limits.fallback_results == 0 || limits.max_tools == 0 {
            anyhow::bail!("ARTICLE_RESULTS, FALLBACK_RESULTS and MAX_TOOLS must be at least 1");
        }

        if limits.article_excerpt_chars == 0 || limits.page_excerpt_chars == 0 {
            anyhow::bail!("ARTICLE_EXCERPT_CHARS and PAGE_EXCERPT_CHARS must be at least 1");
        }

        Ok(())
    }
}
