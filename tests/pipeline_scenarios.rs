//! End-to-end pipeline scenarios against scripted providers.
//!
//! The doubles answer from fixed tables and record every call, so each test
//! can check both the resulting state and which external calls were made.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use devtools_research::prompts::{
    RECOMMENDATIONS_SYSTEM, TOOL_ANALYSIS_SYSTEM, TOOL_EXTRACTION_SYSTEM,
};
use devtools_research::{
    LanguageModelProvider, LlmError, Message, PipelineLimits, ProviderError, ResearchError,
    ResearchPipeline, ScrapedPage, SearchHit, SearchScrapeProvider, Stage, StructuredOutput,
    UNKNOWN,
};

const QUERY: &str = "vector databases";
const ARTICLE_QUERY: &str = "vector databases tools comparison best alternatives";

// =============================================================================
// SCRIPTED SEARCH / SCRAPE
// =============================================================================
#[derive(Default)]
struct ScriptedWeb {
    results: HashMap<String, Vec<SearchHit>>,
    failing_queries: HashSet<String>,
    pages: HashMap<String, String>,
    searches: Mutex<Vec<String>>,
    scrapes: Mutex<Vec<String>>,
}

impl ScriptedWeb {
    fn with_results(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.results.insert(query.to_string(), hits);
        self
    }

    fn with_failing_search(mut self, query: &str) -> Self {
        self.failing_queries.insert(query.to_string());
        self
    }

    fn with_page(mut self, url: &str, markdown: &str) -> Self {
        self.pages.insert(url.to_string(), markdown.to_string());
        self
    }

    /// A tool whose site search and page both resolve.
    fn with_tool(self, name: &str, url: &str) -> Self {
        self.with_results(
            &format!("{name} official site"),
            vec![SearchHit::new(url).with_markdown(format!("{name} search snippet"))],
        )
        .with_page(url, &format!("{name} homepage content"))
    }

    fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }

    fn scrapes(&self) -> Vec<String> {
        self.scrapes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchScrapeProvider for ScriptedWeb {
    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<SearchHit>, ProviderError> {
        self.searches.lock().unwrap().push(query.to_string());
        if self.failing_queries.contains(query) {
            return Err(ProviderError::ServerError(502, "bad gateway".to_string()));
        }
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }

    async fn scrape(&self, url: &str) -> Result<ScrapedPage, ProviderError> {
        self.scrapes.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(markdown) => Ok(ScrapedPage {
                url: url.to_string(),
                markdown: markdown.clone(),
                title: None,
            }),
            None => Err(ProviderError::MissingContent(url.to_string())),
        }
    }
}

// =============================================================================
// SCRIPTED LANGUAGE MODEL
// =============================================================================
#[derive(Default)]
struct ScriptedModel {
    /// `None` makes the extraction call fail
    extraction_reply: Option<String>,
    recommendation_fails: bool,
    /// Tool name -> analysis JSON; tools not listed fail structured output
    analyses: HashMap<String, serde_json::Value>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    fn extracting(reply: &str) -> Self {
        Self {
            extraction_reply: Some(reply.to_string()),
            ..Default::default()
        }
    }

    fn with_analysis(mut self, tool: &str, pricing: &str) -> Self {
        self.analyses.insert(
            tool.to_string(),
            json!({
                "pricing_model": pricing,
                "is_open_source": true,
                "tech_stack": ["Rust"],
                "description": format!("{tool} stores embeddings"),
                "api_available": true,
                "language_support": ["Python", "TypeScript"],
                "integration_capabilities": ["LangChain"]
            }),
        );
        self
    }

    fn failing_recommendation(mut self) -> Self {
        self.recommendation_fails = true;
        self
    }

    fn calls_with_system(&self, system: &str) -> Vec<Vec<Message>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|messages| messages[0].content == system)
            .cloned()
            .collect()
    }
}

fn user_content(messages: &[Message]) -> &str {
    &messages[1].content
}

#[async_trait]
impl LanguageModelProvider for ScriptedModel {
    async fn complete_text(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());

        if messages[0].content == TOOL_EXTRACTION_SYSTEM {
            return self
                .extraction_reply
                .clone()
                .ok_or_else(|| {
                    LlmError::Completion("extraction model unavailable".to_string())
                });
        }

        if messages[0].content == RECOMMENDATIONS_SYSTEM {
            if self.recommendation_fails {
                return Err(LlmError::Completion("connection refused".to_string()));
            }
            return Ok(format!("Recommendation based on: {}", user_content(messages)));
        }

        Err(LlmError::Completion("unexpected prompt".to_string()))
    }

    async fn complete_structured<T>(&self, messages: &[Message]) -> Result<T, LlmError>
    where
        T: StructuredOutput,
    {
        self.calls.lock().unwrap().push(messages.to_vec());
        assert_eq!(messages[0].content, TOOL_ANALYSIS_SYSTEM);

        let prompt = user_content(messages);
        let value = self
            .analyses
            .iter()
            .find(|(tool, _)| prompt.starts_with(&format!("Company/Tool: {tool}\n")))
            .map(|(_, value)| value.clone())
            .ok_or_else(|| LlmError::Structured("schema validation failed".to_string()))?;

        serde_json::from_value(value).map_err(|e| LlmError::Structured(e.to_string()))
    }
}

fn pipeline(
    web: &Arc<ScriptedWeb>,
    model: &Arc<ScriptedModel>,
) -> ResearchPipeline<Arc<ScriptedWeb>, Arc<ScriptedModel>> {
    ResearchPipeline::new(Arc::clone(web), Arc::clone(model))
}

fn three_articles(web: ScriptedWeb) -> ScriptedWeb {
    web.with_results(
        ARTICLE_QUERY,
        vec![
            SearchHit::new("https://blog.dev/a"),
            SearchHit::new("https://blog.dev/b"),
            SearchHit::new("https://blog.dev/c"),
        ],
    )
    .with_page("https://blog.dev/a", "Pinecone is managed")
    .with_page("https://blog.dev/b", "Weaviate is open source")
    .with_page("https://blog.dev/c", "Qdrant is written in Rust")
}

// =============================================================================
// SCENARIOS
// =============================================================================
#[tokio::test]
async fn scenario_a_full_run_in_order() {
    let web = Arc::new(
        three_articles(ScriptedWeb::default())
            .with_tool("Pinecone", "https://pinecone.io")
            .with_tool("Weaviate", "https://weaviate.io")
            .with_tool("Qdrant", "https://qdrant.tech"),
    );
    let model = Arc::new(
        ScriptedModel::extracting("Pinecone\nWeaviate\nQdrant\n")
            .with_analysis("Pinecone", "Paid")
            .with_analysis("Weaviate", "Freemium")
            .with_analysis("Qdrant", "Free"),
    );

    let state = pipeline(&web, &model).run(QUERY).await.unwrap();

    assert_eq!(state.query(), QUERY);
    assert_eq!(state.extracted_tools(), ["Pinecone", "Weaviate", "Qdrant"]);

    let names: Vec<&str> = state.companies().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Pinecone", "Weaviate", "Qdrant"]);

    let qdrant = &state.companies()[2];
    assert_eq!(qdrant.website, "https://qdrant.tech");
    assert_eq!(qdrant.pricing_model, "Free");
    assert_eq!(qdrant.description, "Qdrant stores embeddings");
    assert_eq!(qdrant.is_open_source, Some(true));
    assert_eq!(qdrant.language_support, ["Python", "TypeScript"]);
    assert!(qdrant.competitors.is_empty());

    let analysis = state.analysis().unwrap();
    assert!(analysis.contains(QUERY));
    assert!(analysis.contains("\"name\":\"Pinecone\""));

    // 1 article search + 3 site searches, 3 article scrapes + 3 site scrapes
    assert_eq!(web.searches().len(), 4);
    assert_eq!(web.scrapes().len(), 6);
}

#[tokio::test]
async fn extraction_prompt_gets_bounded_excerpts() {
    let long_page = format!("{}TRUNCATED_TAIL", "x".repeat(1000));
    let web = Arc::new(
        ScriptedWeb::default()
            .with_results(
                ARTICLE_QUERY,
                vec![
                    SearchHit::new("https://blog.dev/long"),
                    SearchHit::new("https://blog.dev/broken"),
                    SearchHit::new("https://blog.dev/short"),
                ],
            )
            .with_page("https://blog.dev/long", &long_page)
            .with_page("https://blog.dev/short", "Milvus and Chroma"),
    );
    let model = Arc::new(ScriptedModel::extracting(""));

    pipeline(&web, &model).run(QUERY).await.unwrap();

    let extraction = model.calls_with_system(TOOL_EXTRACTION_SYSTEM);
    assert_eq!(extraction.len(), 1);
    let prompt = user_content(&extraction[0]);
    assert!(prompt.contains(&format!("{}\n\nMilvus and Chroma\n\n", "x".repeat(1000))));
    assert!(!prompt.contains("TRUNCATED_TAIL"));
}

#[tokio::test]
async fn scenario_b_nothing_found_still_recommends() {
    let web = Arc::new(ScriptedWeb::default());
    let model = Arc::new(ScriptedModel::extracting(""));

    let state = pipeline(&web, &model).run(QUERY).await.unwrap();

    assert!(state.extracted_tools().is_empty());
    assert!(state.companies().is_empty());
    assert!(state.analysis().is_some());
    assert_eq!(web.searches(), [ARTICLE_QUERY, QUERY]);
    assert!(web.scrapes().is_empty());
    assert!(model.calls_with_system(TOOL_EXTRACTION_SYSTEM).is_empty());
}

#[tokio::test]
async fn empty_article_search_never_asks_for_tool_names() {
    let web = Arc::new(ScriptedWeb::default());
    let model = Arc::new(ScriptedModel::extracting("Hallucinated DB"));

    let state = pipeline(&web, &model).run(QUERY).await.unwrap();

    assert!(state.extracted_tools().is_empty());
    assert!(model.calls_with_system(TOOL_EXTRACTION_SYSTEM).is_empty());
}

#[tokio::test]
async fn failed_article_search_behaves_like_no_results() {
    let web = Arc::new(ScriptedWeb::default().with_failing_search(ARTICLE_QUERY));
    let model = Arc::new(ScriptedModel::extracting(""));

    let state = pipeline(&web, &model).run(QUERY).await.unwrap();

    assert!(state.extracted_tools().is_empty());
    assert_eq!(web.searches(), [ARTICLE_QUERY, QUERY]);
    assert!(state.analysis().is_some());
}

#[tokio::test]
async fn scenario_c_extraction_failure_uses_fallback() {
    let web = Arc::new(
        three_articles(ScriptedWeb::default())
            .with_results(
                QUERY,
                vec![
                    SearchHit::new("https://chroma.dev").with_title("Chroma"),
                    SearchHit::new("https://untitled.dev"),
                    SearchHit::new("https://milvus.io").with_title("Milvus"),
                ],
            )
            .with_tool("Chroma", "https://trychroma.com")
            .with_tool("Milvus", "https://milvus.io"),
    );
    let model = Arc::new(
        ScriptedModel {
            extraction_reply: None,
            ..Default::default()
        }
        .with_analysis("Chroma", "Free")
        .with_analysis("Milvus", "Free"),
    );

    let state = pipeline(&web, &model).run(QUERY).await.unwrap();

    assert!(state.extracted_tools().is_empty());
    assert!(web.searches().contains(&format!("{UNKNOWN} official site")));

    // "Unknown" has no site result and is dropped
    let names: Vec<&str> = state.companies().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Chroma", "Milvus"]);
    assert!(state.analysis().is_some());
}

#[tokio::test]
async fn scenario_d_structured_failure_is_isolated() {
    let web = Arc::new(
        three_articles(ScriptedWeb::default())
            .with_tool("Pinecone", "https://pinecone.io")
            .with_tool("Weaviate", "https://weaviate.io")
            .with_tool("Qdrant", "https://qdrant.tech"),
    );
    let model = Arc::new(
        ScriptedModel::extracting("Pinecone\nWeaviate\nQdrant")
            .with_analysis("Pinecone", "Paid")
            .with_analysis("Qdrant", "Free"),
    );

    let state = pipeline(&web, &model).run(QUERY).await.unwrap();
    let companies = state.companies();
    assert_eq!(companies.len(), 3);

    let weaviate = &companies[1];
    assert_eq!(weaviate.name, "Weaviate");
    assert_eq!(weaviate.website, "https://weaviate.io");
    assert_eq!(weaviate.description, "Failed");
    assert_eq!(weaviate.pricing_model, UNKNOWN);
    assert_eq!(weaviate.is_open_source, None);
    assert_eq!(weaviate.api_available, None);
    assert!(weaviate.tech_stack.is_empty());

    assert_eq!(companies[0].pricing_model, "Paid");
    assert_eq!(companies[2].pricing_model, "Free");
}

#[tokio::test]
async fn scenario_e_recommendation_failure_propagates() {
    let web = Arc::new(
        three_articles(ScriptedWeb::default()).with_tool("Qdrant", "https://qdrant.tech"),
    );
    let model = Arc::new(
        ScriptedModel::extracting("Qdrant")
            .with_analysis("Qdrant", "Free")
            .failing_recommendation(),
    );

    let err = pipeline(&web, &model).run(QUERY).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Analyse);
    assert!(matches!(
        err,
        ResearchError::Stage {
            source: LlmError::Completion(_),
            ..
        }
    ));
}

// =============================================================================
// FAN-OUT AND DEFAULTS
// =============================================================================
#[tokio::test]
async fn extracted_path_researches_at_most_four_tools() {
    let names = ["A", "B", "C", "D", "E", "F"];
    let mut web = three_articles(ScriptedWeb::default());
    for name in names {
        web = web.with_tool(name, &format!("https://{}.dev", name.to_lowercase()));
    }
    let web = Arc::new(web);
    let model = Arc::new(ScriptedModel::extracting(&names.join("\n")));

    let state = pipeline(&web, &model).run(QUERY).await.unwrap();

    assert_eq!(state.extracted_tools().len(), 6);
    let researched: Vec<&str> = state.companies().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(researched, ["A", "B", "C", "D"]);
    assert!(!web.searches().contains(&"E official site".to_string()));
    assert_eq!(model.calls_with_system(TOOL_ANALYSIS_SYSTEM).len(), 4);
}

#[tokio::test]
async fn fallback_path_researches_at_most_three_tools() {
    let hits: Vec<SearchHit> = (1..=5)
        .map(|i| SearchHit::new(format!("https://t{i}.dev")).with_title(format!("T{i}")))
        .collect();
    let mut web = ScriptedWeb::default().with_results(QUERY, hits);
    for i in 1..=5 {
        web = web.with_tool(&format!("T{i}"), &format!("https://t{i}.dev"));
    }
    let web = Arc::new(web);
    let model = Arc::new(ScriptedModel::extracting("\n\n"));

    let state = pipeline(&web, &model).run(QUERY).await.unwrap();

    let researched: Vec<&str> = state.companies().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(researched, ["T1", "T2", "T3"]);
}

#[tokio::test]
async fn custom_limits_are_honoured() {
    let web = Arc::new(
        three_articles(ScriptedWeb::default())
            .with_tool("Pinecone", "https://pinecone.io")
            .with_tool("Weaviate", "https://weaviate.io"),
    );
    let model = Arc::new(
        ScriptedModel::extracting("Pinecone\nWeaviate").with_analysis("Pinecone", "Paid"),
    );

    let limits = PipelineLimits {
        article_results: 1,
        max_tools: 1,
        page_excerpt_chars: 8,
        ..PipelineLimits::default()
    };
    let state = pipeline(&web, &model)
        .with_limits(limits)
        .run(QUERY)
        .await
        .unwrap();

    assert_eq!(state.companies().len(), 1);
    assert_eq!(web.scrapes()[0], "https://blog.dev/a");
    assert!(!web.scrapes().contains(&"https://blog.dev/b".to_string()));

    let analysis_calls = model.calls_with_system(TOOL_ANALYSIS_SYSTEM);
    assert!(user_content(&analysis_calls[0]).contains("Website Content: Pinecone\n"));
}

#[tokio::test]
async fn scrape_failure_keeps_provisional_record() {
    let web = Arc::new(
        three_articles(ScriptedWeb::default()).with_results(
            "Turbopuffer official site",
            vec![SearchHit::new("https://turbopuffer.com")
                .with_markdown("Serverless vector DB")],
        ),
    );
    let model = Arc::new(
        ScriptedModel::extracting("Turbopuffer").with_analysis("Turbopuffer", "Paid"),
    );

    let state = pipeline(&web, &model).run(QUERY).await.unwrap();
    let company = &state.companies()[0];

    assert_eq!(company.name, "Turbopuffer");
    assert_eq!(company.website, "https://turbopuffer.com");
    assert_eq!(company.description, "Serverless vector DB");
    assert_eq!(company.pricing_model, UNKNOWN);
    assert_eq!(company.is_open_source, None);
    assert_eq!(company.api_available, None);
    assert!(company.tech_stack.is_empty());
    assert!(company.language_support.is_empty());
    assert!(company.integration_capabilities.is_empty());
    assert!(model.calls_with_system(TOOL_ANALYSIS_SYSTEM).is_empty());
}

#[tokio::test]
async fn tools_without_site_result_are_dropped_in_order() {
    let web = Arc::new(
        three_articles(ScriptedWeb::default())
            .with_tool("Pinecone", "https://pinecone.io")
            .with_failing_search("Vaporware official site")
            .with_tool("Qdrant", "https://qdrant.tech"),
    );
    let model = Arc::new(
        ScriptedModel::extracting("Pinecone\nVaporware\nGhost\nQdrant")
            .with_analysis("Pinecone", "Paid")
            .with_analysis("Qdrant", "Free"),
    );

    let state = pipeline(&web, &model).run(QUERY).await.unwrap();

    let names: Vec<&str> = state.companies().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Pinecone", "Qdrant"]);
    assert!(state.companies().iter().all(|c| !c.name.is_empty()));
}

#[tokio::test]
async fn pipeline_serves_repeated_runs_independently() {
    let web = Arc::new(
        three_articles(ScriptedWeb::default()).with_tool("Qdrant", "https://qdrant.tech"),
    );
    let model = Arc::new(ScriptedModel::extracting("Qdrant").with_analysis("Qdrant", "Free"));
    let pipeline = pipeline(&web, &model);

    let first = pipeline.run(QUERY).await.unwrap();
    let second = pipeline.run("message queues").await.unwrap();

    assert_eq!(first.query(), QUERY);
    assert_eq!(second.query(), "message queues");
    assert_eq!(first.companies().len(), 1);
    assert!(second.companies().is_empty());
}
