//! # Research Data Model
//!
//! The records threaded through the pipeline:
//! - [`ResearchState`]: the single context each run owns
//! - [`ResearchUpdate`]: the delta a stage returns, merged into the state
//! - [`CompanyInfo`]: one researched tool
//! - [`CompanyAnalysis`]: the structured shape requested from the model

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Placeholder for an enrichment value nobody could determine.
pub const UNKNOWN: &str = "Unknown";

/// Description carried by the analysis sentinel.
pub const FAILED_DESCRIPTION: &str = "Failed";

// =============================================================================
// COMPANY ANALYSIS (structured output)
// =============================================================================
/// Developer-facing facts extracted from a tool's website.
///
/// The doc comments on the fields end up in the JSON schema the model sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CompanyAnalysis {
    /// One of "Free", "Freemium", "Paid", "Enterprise" or "Unknown".
    pub pricing_model: String,

    /// true if open source, false if proprietary, null if unclear.
    #[serde(default)]
    pub is_open_source: Option<bool>,

    /// Languages, frameworks, databases and services the tool uses or supports.
    #[serde(default)]
    pub tech_stack: Vec<String>,

    /// One sentence on what the tool does for developers.
    #[serde(default)]
    pub description: String,

    /// true if a REST/GraphQL API or SDK is offered, null if unclear.
    #[serde(default)]
    pub api_available: Option<bool>,

    /// Programming languages with explicit client support.
    #[serde(default)]
    pub language_support: Vec<String>,

    /// Platforms and tools it integrates with (GitHub, Docker, AWS, ...).
    #[serde(default)]
    pub integration_capabilities: Vec<String>,
}

impl CompanyAnalysis {
    /// The sentinel substituted when structured analysis fails.
    pub fn failed() -> Self {
        Self {
            pricing_model: UNKNOWN.to_string(),
            is_open_source: None,
            tech_stack: Vec::new(),
            description: FAILED_DESCRIPTION.to_string(),
            api_available: None,
            language_support: Vec::new(),
            integration_capabilities: Vec::new(),
        }
    }
}

// =============================================================================
// COMPANY INFO
// =============================================================================
/// One researched developer tool.
///
/// Every enrichment field starts at a defined default ("Unknown", `None`
/// or an empty list) so consumers never have to handle a missing value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub name: String,
    pub description: String,
    pub website: String,
    pub pricing_model: String,
    pub is_open_source: Option<bool>,
    pub tech_stack: Vec<String>,
    pub competitors: Vec<String>,
    pub api_available: Option<bool>,
    pub language_support: Vec<String>,
    pub integration_capabilities: Vec<String>,
}

impl CompanyInfo {
    /// A provisional record seeded from the tool's site search result.
    pub fn new(
        name: impl Into<String>,
        website: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            website: website.into(),
            pricing_model: UNKNOWN.to_string(),
            is_open_source: None,
            tech_stack: Vec::new(),
            competitors: Vec::new(),
            api_available: None,
            language_support: Vec::new(),
            integration_capabilities: Vec::new(),
        }
    }

    /// Overwrite the enrichment fields with an analysis result.
    ///
    /// `name`, `website` and `competitors` are left untouched.
    pub fn apply_analysis(&mut self, analysis: CompanyAnalysis) {
        self.pricing_model = analysis.pricing_model;
        self.is_open_source = analysis.is_open_source;
        self.tech_stack = analysis.tech_stack;
        self.description = analysis.description;
        self.api_available = analysis.api_available;
        self.language_support = analysis.language_support;
        self.integration_capabilities = analysis.integration_capabilities;
    }

    /// Whether the last applied analysis was the [`CompanyAnalysis::failed`]
    /// sentinel.
    pub fn analysis_failed(&self) -> bool {
        self.description == FAILED_DESCRIPTION && !self.is_enriched()
    }

    /// Whether any enrichment beyond the provisional defaults is present.
    pub fn is_enriched(&self) -> bool {
        self.pricing_model != UNKNOWN
            || self.is_open_source.is_some()
            || self.api_available.is_some()
            || !self.tech_stack.is_empty()
            || !self.language_support.is_empty()
            || !self.integration_capabilities.is_empty()
    }
}

// =============================================================================
// RESEARCH STATE
// =============================================================================
/// The context a single pipeline run threads through its three stages.
///
/// The query is fixed at construction. The remaining fields only change
/// through [`ResearchState::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchState {
    query: String,
    extracted_tools: Vec<String>,
    companies: Vec<CompanyInfo>,
    analysis: Option<String>,
}

impl ResearchState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn extracted_tools(&self) -> &[String] {
        &self.extracted_tools
    }

    pub fn companies(&self) -> &[CompanyInfo] {
        &self.companies
    }

    pub fn analysis(&self) -> Option<&str> {
        self.analysis.as_deref()
    }

    /// Merge a stage's output. Fields absent from the update are kept.
    pub fn apply(&mut self, update: ResearchUpdate) {
        if let Some(tools) = update.extracted_tools {
            self.extracted_tools = tools;
        }
        if let Some(companies) = update.companies {
            self.companies = companies;
        }
        if let Some(analysis) = update.analysis {
            self.analysis = Some(analysis);
        }
    }
}

/// Partial output of one pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResearchUpdate {
    pub extracted_tools: Option<Vec<String>>,
    pub companies: Option<Vec<CompanyInfo>>,
    pub analysis: Option<String>,
}

impl ResearchUpdate {
    pub fn with_extracted_tools(mut self, tools: Vec<String>) -> Self {
        self.extracted_tools = Some(tools);
        self
    }

    pub fn with_companies(mut self, companies: Vec<CompanyInfo>) -> Self {
        self.companies = Some(companies);
        self
    }

    pub fn with_analysis(mut self, analysis: impl Into<String>) -> Self {
        self.analysis = Some(analysis.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.extracted_tools.is_none() && self.companies.is_none() && self.analysis.is_none()
    }
}
