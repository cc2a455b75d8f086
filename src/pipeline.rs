//! # Research Pipeline
//!
//! A fixed, strictly linear state machine:
//!
//! ```text
//! Extract ──▶ Research ──▶ Analyse ──▶ Done
//! ```
//!
//! - **Extract**: search for comparison articles, scrape them, ask the model
//!   for candidate tool names
//! - **Research**: find each tool's official site, scrape it, ask the model
//!   for a structured [`CompanyAnalysis`]
//! - **Analyse**: turn the researched tools into a recommendation
//!
//! Each stage reads the current [`ResearchState`] and returns a
//! [`ResearchUpdate`] that the driver merges in. Whether a stage's failure is
//! absorbed or aborts the run is decided by [`Stage::contains_failures`].

use std::fmt;

use tracing::{debug, info, instrument, warn};

use crate::error::{LlmError, ResearchError};
use crate::llm::LanguageModelProvider;
use crate::models::{CompanyAnalysis, CompanyInfo, ResearchState, ResearchUpdate, UNKNOWN};
use crate::prompts;
use crate::search::{ScrapedPage, SearchHit, SearchScrapeProvider};

/// Appended to the user's query when looking for comparison articles.
const ARTICLE_QUERY_SUFFIX: &str = "tools comparison best alternatives";

/// Appended to a tool name when looking for its website.
const OFFICIAL_SITE_SUFFIX: &str = "official site";

// =============================================================================
// STAGES
// =============================================================================
/// The pipeline's position in its fixed sequence.
///
/// # Rust Concept: Enums as State Machines
///
/// Each variant is one state and [`Stage::next`] is the only transition.
/// Because `match` must be exhaustive, adding a stage forces every table
/// below (`next`, `contains_failures`, `fallback_update`) to say what the
/// new stage does; the compiler will not let one be forgotten.
///
/// # Rust Concept: Copy Types
///
/// `Stage` is `Copy`, so methods take `self` by value and the driver loop can
/// keep using its `stage` after calling them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Research,
    Analyse,
    Done,
}

impl Stage {
    pub fn next(self) -> Self {
        match self {
            Stage::Extract => Stage::Research,
            Stage::Research => Stage::Analyse,
            Stage::Analyse | Stage::Done => Stage::Done,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done)
    }

    /// Whether a failure in this stage is replaced by [`Stage::fallback_update`]
    /// instead of ending the run.
    ///
    /// # Rust Concept: Policy as Data
    ///
    /// Instead of a `match` on errors inside every stage, the driver asks this
    /// table once. A stage just returns `Result`; whether `Err` degrades or
    /// aborts is decided here.
    ///
    /// Research has no stage-level error: search, scrape and analysis
    /// failures are absorbed per tool, so its entry never fires.
    pub fn contains_failures(self) -> bool {
        match self {
            Stage::Extract => true,
            Stage::Research => true,
            Stage::Analyse => false,
            Stage::Done => false,
        }
    }

    /// The output substituted when a containing stage fails.
    pub fn fallback_update(self) -> ResearchUpdate {
        match self {
            Stage::Extract => ResearchUpdate::default().with_extracted_tools(Vec::new()),
            Stage::Research => ResearchUpdate::default().with_companies(Vec::new()),
            Stage::Analyse | Stage::Done => ResearchUpdate::default(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Research => "research",
            Stage::Analyse => "analyse",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// LIMITS
// =============================================================================
/// Bounds on fan-out and on how much scraped text reaches the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineLimits {
    /// Articles searched for during Extract
    pub article_results: usize,

    /// Extracted tool names researched
    pub max_tools: usize,

    /// Direct query results used when extraction found nothing
    pub fallback_results: usize,

    /// Characters kept from each article
    pub article_excerpt_chars: usize,

    /// Characters of a tool's website sent for analysis
    pub page_excerpt_chars: usize,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            article_results: 3,
            max_tools: 4,
            fallback_results: 3,
            article_excerpt_chars: 1000,
            page_excerpt_chars: 2500,
        }
    }
}

// =============================================================================
// PURE HELPERS
// =============================================================================
/// Split a model reply into tool names: one per non-blank line, trimmed,
/// order and duplicates kept.
pub fn parse_tool_names(response: &str) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// One JSON object per company, joined with `", "`.
///
/// A company that fails to serialize is logged and left out.
pub fn company_data(companies: &[CompanyInfo]) -> String {
    companies
        .iter()
        .filter_map(|company| match serde_json::to_string(company) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!(
                    company = %company.name,
                    error = %e,
                    "Could not serialize company, leaving it out"
                );
                None
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// The first `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

// =============================================================================
// PIPELINE
// =============================================================================
/// The developer-tools research pipeline.
///
/// Owns its two providers; each [`run`](Self::run) owns an independent
/// [`ResearchState`], so a single pipeline can serve any number of runs.
///
/// # Rust Concept: Generics vs Trait Objects
///
/// `S` and `L` are type parameters rather than `Box<dyn ...>` because
/// [`LanguageModelProvider::complete_structured`] is generic over its output
/// type, and generic methods cannot be called through a trait object. Tests
/// plug in scripted providers the same way production plugs in Firecrawl and
/// rig.
pub struct ResearchPipeline<S, L> {
    search: S,
    llm: L,
    limits: PipelineLimits,
}

impl<S, L> ResearchPipeline<S, L>
where
    S: SearchScrapeProvider,
    L: LanguageModelProvider,
{
    pub fn new(search: S, llm: L) -> Self {
        Self {
            search,
            llm,
            limits: PipelineLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: PipelineLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Research `query` end to end.
    ///
    /// Returns the fully populated state, or the error of the one stage that
    /// is not allowed to degrade (Analyse). No partial state is returned.
    ///
    /// # Rust Concept: Match Guards
    ///
    /// `Err(e) if stage.contains_failures()` only matches when the guard is
    /// true; any other `Err` falls through to the next arm and leaves the
    /// function with `return Err(...)`.
    #[instrument(name = "pipeline.run", skip(self))]
    pub async fn run(&self, query: &str) -> Result<ResearchState, ResearchError> {
        let mut state = ResearchState::new(query);
        let mut stage = Stage::Extract;

        while !stage.is_terminal() {
            debug!(stage = %stage, "Entering stage");

            let update = match self.run_stage(stage, &state).await {
                Ok(update) => update,
                Err(e) if stage.contains_failures() => {
                    warn!(stage = %stage, error = %e, "Stage failed, continuing with empty output");
                    stage.fallback_update()
                }
                Err(source) => return Err(ResearchError::Stage { stage, source }),
            };

            state.apply(update);
            stage = stage.next();
        }

        info!(
            tools = state.extracted_tools().len(),
            companies = state.companies().len(),
            "Research completed"
        );

        Ok(state)
    }

    async fn run_stage(
        &self,
        stage: Stage,
        state: &ResearchState,
    ) -> Result<ResearchUpdate, LlmError> {
        match stage {
            Stage::Extract => self.extract_tools(state).await,
            // Infallible: failures are absorbed per tool
            Stage::Research => Ok(self.research_tools(state).await),
            Stage::Analyse => self.analyse(state).await,
            // `run` stops before dispatching the terminal stage
            Stage::Done => Ok(ResearchUpdate::default()),
        }
    }

    // -------------------------------------------------------------------------
    // Extract
    // -------------------------------------------------------------------------
    async fn extract_tools(&self, state: &ResearchState) -> Result<ResearchUpdate, LlmError> {
        info!(query = %state.query(), "Finding articles");

        let article_query = format!("{} {}", state.query(), ARTICLE_QUERY_SUFFIX);
        let articles = self
            .search_or_empty(&article_query, self.limits.article_results)
            .await;

        if articles.is_empty() {
            info!("No articles found, skipping extraction");
            return Ok(ResearchUpdate::default().with_extracted_tools(Vec::new()));
        }

        let mut all_content = String::new();
        for article in &articles {
            if let Some(page) = self.scrape_or_skip(&article.url).await {
                all_content.push_str(truncate_chars(
                    &page.markdown,
                    self.limits.article_excerpt_chars,
                ));
                all_content.push_str("\n\n");
            }
        }

        let messages = prompts::tool_extraction(state.query(), &all_content);
        let response = self.llm.complete_text(&messages).await?;
        let tool_names = parse_tool_names(&response);

        info!(
            tools = %tool_names.iter().take(5).cloned().collect::<Vec<_>>().join(", "),
            count = tool_names.len(),
            "Extracted tools"
        );

        Ok(ResearchUpdate::default().with_extracted_tools(tool_names))
    }

    // -------------------------------------------------------------------------
    // Research
    // -------------------------------------------------------------------------
    async fn research_tools(&self, state: &ResearchState) -> ResearchUpdate {
        let tool_names: Vec<String> = if state.extracted_tools().is_empty() {
            warn!("No extracted tools found, falling back to a direct query search");
            self.search_or_empty(state.query(), self.limits.fallback_results)
                .await
                .iter()
                .map(|hit| hit.title().unwrap_or(UNKNOWN).to_string())
                .collect()
        } else {
            state
                .extracted_tools()
                .iter()
                .take(self.limits.max_tools)
                .cloned()
                .collect()
        };

        info!(tools = %tool_names.join(", "), "Researching specific tools");

        let mut companies = Vec::with_capacity(tool_names.len());
        for tool_name in &tool_names {
            match self.research_tool(tool_name).await {
                Some(company) => companies.push(company),
                None => debug!(tool = %tool_name, "No site found, dropping tool"),
            }
        }

        let enriched = companies.iter().filter(|c| c.is_enriched()).count();
        info!(companies = companies.len(), enriched, "Researched tools");

        ResearchUpdate::default().with_companies(companies)
    }

    /// Research one tool. `None` when its site search finds nothing.
    async fn research_tool(&self, tool_name: &str) -> Option<CompanyInfo> {
        let site_query = format!("{tool_name} {OFFICIAL_SITE_SUFFIX}");
        let hit = self
            .search_or_empty(&site_query, 1)
            .await
            .into_iter()
            .next()?;

        let mut company = CompanyInfo::new(
            tool_name,
            hit.url.clone(),
            hit.markdown.clone().unwrap_or_default(),
        );

        if let Some(page) = self.scrape_or_skip(&hit.url).await {
            let content = truncate_chars(&page.markdown, self.limits.page_excerpt_chars);
            let analysis = self.analyse_company_content(tool_name, content).await;
            company.apply_analysis(analysis);
        }

        Some(company)
    }

    async fn analyse_company_content(&self, tool_name: &str, content: &str) -> CompanyAnalysis {
        let messages = prompts::tool_analysis(tool_name, content);

        match self.llm.complete_structured::<CompanyAnalysis>(&messages).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(tool = %tool_name, error = %e, "Error analysing tool, using placeholder");
                CompanyAnalysis::failed()
            }
        }
    }

    // -------------------------------------------------------------------------
    // Analyse
    // -------------------------------------------------------------------------
    async fn analyse(&self, state: &ResearchState) -> Result<ResearchUpdate, LlmError> {
        info!(companies = state.companies().len(), "Generating recommendations");

        let company_data = company_data(state.companies());
        let messages = prompts::recommendations(state.query(), &company_data);
        let recommendation = self.llm.complete_text(&messages).await?;

        Ok(ResearchUpdate::default().with_analysis(recommendation))
    }

    // -------------------------------------------------------------------------
    // Provider call sites
    // -------------------------------------------------------------------------
    /// Search, treating a provider error like an empty result.
    async fn search_or_empty(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        match self.search.search(query, limit).await {
            Ok(mut hits) => {
                hits.truncate(limit);
                hits
            }
            Err(e) => {
                warn!(query = %query, error = %e, "Search failed, treating as no results");
                Vec::new()
            }
        }
    }

    /// Scrape, turning a failure into "skip this source".
    async fn scrape_or_skip(&self, url: &str) -> Option<ScrapedPage> {
        match self.search.scrape(url).await {
            Ok(page) => Some(page),
            Err(e) => {
                warn!(url = %url, error = %e, "Scrape failed, skipping source");
                None
            }
        }
    }
}
