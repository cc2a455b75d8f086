//! # Search & Scrape Module
//!
//! The web-facing collaborator of the pipeline:
//! - [`SearchScrapeProvider`]: the trait the pipeline depends on
//! - [`FirecrawlClient`]: the production implementation over Firecrawl's REST API
//!
//! Transport failures surface as [`ProviderError`]; deciding what a failure
//! means for the research is the pipeline's job, not the provider's.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ProviderError;

/// Public Firecrawl endpoint
pub const DEFAULT_API_URL: &str = "https://api.firecrawl.dev";

/// Scraping a JS-heavy page can take a while
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Maximum retry attempts for transient failures
const MAX_RETRIES: u32 = 2;

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 500;

// =============================================================================
// RESULT TYPES
// =============================================================================
/// Page metadata attached to a search hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// One ranked search result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,

    /// Markdown snippet of the page, when the provider scraped it inline
    pub markdown: Option<String>,

    pub metadata: SearchMetadata,
}

impl SearchHit {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }

    pub fn with_markdown(mut self, markdown: impl Into<String>) -> Self {
        self.markdown = Some(markdown.into());
        self
    }

    /// The page title, if one was reported and it is not blank.
    pub fn title(&self) -> Option<&str> {
        self.metadata
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
    }
}

/// Successfully scraped page content.
///
/// Empty `markdown` is still a success; a failed scrape is an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub url: String,
    pub markdown: String,
    pub title: Option<String>,
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================
/// Web search plus single-page scraping.
#[async_trait]
pub trait SearchScrapeProvider: Send + Sync {
    /// Search the web, returning at most `limit` ranked hits.
    ///
    /// Finding nothing is `Ok(vec![])`, not an error.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ProviderError>;

    /// Fetch one page as markdown.
    async fn scrape(&self, url: &str) -> Result<ScrapedPage, ProviderError>;
}

#[async_trait]
impl<P> SearchScrapeProvider for Arc<P>
where
    P: SearchScrapeProvider + ?Sized,
{
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ProviderError> {
        (**self).search(query, limit).await
    }

    async fn scrape(&self, url: &str) -> Result<ScrapedPage, ProviderError> {
        (**self).scrape(url).await
    }
}

// =============================================================================
// FIRECRAWL WIRE FORMAT
// =============================================================================
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
    scrape_options: ScrapeOptions,
}

#[derive(Debug, Serialize)]
struct ScrapeOptions {
    formats: Vec<&'static str>,
}

impl ScrapeOptions {
    fn markdown() -> Self {
        Self {
            formats: vec!["markdown"],
        }
    }
}

#[derive(Debug, Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T, ProviderError> {
        if !self.success {
            return Err(ProviderError::Unsuccessful(
                self.error.unwrap_or_else(|| "no error message".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| ProviderError::Parse("response carried no data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct FirecrawlSearchItem {
    #[serde(default)]
    url: String,
    title: Option<String>,
    description: Option<String>,
    markdown: Option<String>,
    metadata: Option<FirecrawlMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct FirecrawlMetadata {
    title: Option<String>,
    description: Option<String>,
}

impl From<FirecrawlSearchItem> for SearchHit {
    fn from(item: FirecrawlSearchItem) -> Self {
        let metadata = item.metadata.unwrap_or_default();
        SearchHit {
            url: item.url,
            markdown: item.markdown,
            metadata: SearchMetadata {
                title: metadata.title.or(item.title),
                description: metadata.description.or(item.description),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct FirecrawlDocument {
    markdown: Option<String>,
    metadata: Option<FirecrawlMetadata>,
}

// =============================================================================
// FIRECRAWL CLIENT
// =============================================================================
/// Firecrawl-backed search and scrape.
///
/// # Example
/// ```ignore
/// let client = FirecrawlClient::new("fc-...");
/// let hits = client.search("vector databases", 3).await?;
/// let page = client.scrape(&hits[0].url).await?;
/// ```
#[derive(Debug, Clone)]
pub struct FirecrawlClient {
    api_key: String,
    base_url: String,
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl FirecrawlClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_URL.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
        }
    }

    /// Point the client at a self-hosted Firecrawl (or a test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST with retry and exponential backoff on transient errors.
    async fn post_with_retry<B, R>(&self, endpoint: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * 2u64.pow(attempt - 1));
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    endpoint,
                    "Retrying Firecrawl request"
                );
                tokio::time::sleep(delay).await;
            }

            match self.post_once(endpoint, body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    warn!(attempt, endpoint, error = %e, "Firecrawl request failed, will retry");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_once<B, R>(&self, endpoint: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<R>()
                .await
                .map_err(|e| ProviderError::Parse(e.to_string()));
        }

        let error_text = response.text().await.unwrap_or_default();
        match status.as_u16() {
            400 => Err(ProviderError::BadRequest(error_text)),
            401 | 403 => Err(ProviderError::Unauthorized),
            429 => Err(ProviderError::RateLimited),
            code @ 500..=599 => Err(ProviderError::ServerError(code, error_text)),
            code => Err(ProviderError::HttpError(code, error_text)),
        }
    }
}

#[async_trait]
impl SearchScrapeProvider for FirecrawlClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ProviderError> {
        info!(query = %query, limit, "Performing web search");

        let request = SearchRequest {
            query,
            limit,
            scrape_options: ScrapeOptions::markdown(),
        };
        let envelope: Envelope<Vec<FirecrawlSearchItem>> =
            self.post_with_retry("/v1/search", &request).await?;

        let hits: Vec<SearchHit> = envelope
            .into_data()?
            .into_iter()
            .map(SearchHit::from)
            .take(limit)
            .collect();

        if hits.is_empty() {
            warn!(query = %query, "No search results found");
        } else {
            debug!(query = %query, count = hits.len(), "Search completed");
        }

        Ok(hits)
    }

    async fn scrape(&self, url: &str) -> Result<ScrapedPage, ProviderError> {
        debug!(url = %url, "Scraping page");

        let request = ScrapeRequest {
            url,
            formats: vec!["markdown"],
        };
        let envelope: Envelope<FirecrawlDocument> =
            self.post_with_retry("/v1/scrape", &request).await?;
        let document = envelope.into_data()?;

        let markdown = document
            .markdown
            .ok_or_else(|| ProviderError::MissingContent(url.to_string()))?;

        Ok(ScrapedPage {
            url: url.to_string(),
            markdown,
            title: document.metadata.and_then(|m| m.title),
        })
    }
}
