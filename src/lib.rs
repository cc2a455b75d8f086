//! # Developer Tools Research Agent
//!
//! Answers questions like "vector databases" with a three-stage pipeline:
//! discover candidate tools from comparison articles, enrich each with
//! structured facts from its website, and produce a short recommendation.
//!
//! ```ignore
//! use devtools_research::{Config, FirecrawlClient, ResearchPipeline, RigLanguageModel};
//!
//! let config = Config::from_env()?;
//! let search = FirecrawlClient::new(config.firecrawl_api_key.clone().unwrap_or_default());
//! let llm = RigLanguageModel::from_config(&config)?;
//! let state = ResearchPipeline::new(search, llm).run("vector databases").await?;
//! println!("{}", state.analysis().unwrap_or_default());
//! ```

pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod search;

pub use config::{Config, LlmBackend};
pub use error::{LlmError, ProviderError, ResearchError};
pub use llm::{LanguageModelProvider, Message, RigLanguageModel, Role, StructuredOutput};
pub use models::{CompanyAnalysis, CompanyInfo, ResearchState, ResearchUpdate, UNKNOWN};
pub use pipeline::{parse_tool_names, PipelineLimits, ResearchPipeline, Stage};
pub use search::{FirecrawlClient, ScrapedPage, SearchHit, SearchMetadata, SearchScrapeProvider};
