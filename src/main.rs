//! # Developer Tools Research Agent (CLI)
//!
//! Researches developer tools for a query and prints a structured report.
//!
//! ## Quick Start
//! ```bash
//! cargo run -- "vector databases"
//! cargo run                        # interactive mode
//! ```

use std::io::Write as _;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use devtools_research::{
    CompanyInfo, Config, FirecrawlClient, LlmBackend, ResearchPipeline, ResearchState,
    RigLanguageModel,
};

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "devtools-research",
    version,
    about = "Research developer tools: discover candidates, analyse each, recommend one",
    long_about = r#"
Developer Tools Research Agent

For a query such as "vector databases" it will:
  1. Search for comparison articles and extract candidate tool names
  2. Visit each tool's official site and analyse pricing, license, tech stack and API
  3. Recommend the best fit

REQUIRED ENVIRONMENT:
  FIRECRAWL_API_KEY   Firecrawl search/scrape API key
  OPENAI_API_KEY      when using the openai backend (default)

EXAMPLES:
  devtools-research "vector databases"
  devtools-research --backend ollama --model llama3.2 "message queues"
  devtools-research --json "feature flag services"
  devtools-research                 # interactive mode
"#
)]
struct Args {
    /// The developer-tools question to research. Omit for interactive mode
    #[arg(value_name = "QUERY")]
    query: Option<String>,

    /// Model to use (overrides LLM_MODEL)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// LLM backend (overrides LLM_BACKEND)
    #[arg(short = 'b', long = "backend", value_enum)]
    backend: Option<LlmBackend>,

    /// Print the full research state as JSON instead of a report
    #[arg(long = "json", default_value = "false")]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    verbose: bool,
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    let mut config = Config::from_env()?;
    apply_cli_overrides(&mut config, &args);
    config.validate()?;

    info!(
        backend = %config.backend,
        model = %config.model,
        firecrawl = %config.firecrawl_api_url,
        "Configuration loaded"
    );

    let search = FirecrawlClient::new(config.firecrawl_api_key.clone().unwrap_or_default())
        .with_base_url(config.firecrawl_api_url.clone());
    let llm = RigLanguageModel::from_config(&config).context("Failed to create LLM client")?;
    let pipeline = ResearchPipeline::new(search, llm).with_limits(config.limits);

    match args.query.as_deref() {
        Some(query) => {
            let state = pipeline.run(query).await.map_err(|e| {
                error!(error = %e, "Research failed");
                print_hint(&e.to_string());
                anyhow::Error::new(e)
            })?;
            print_state(&state, args.json)?;
        }
        None => interactive(&pipeline, args.json).await?,
    }

    info!("Research agent finished");
    Ok(())
}

/// Command-line flags win over the environment.
fn apply_cli_overrides(config: &mut Config, args: &Args) {
    if let Some(backend) = args.backend {
        info!(backend = %backend, "Using backend from command line");
        config.set_backend(backend, args.model.is_some());
    }
    if let Some(model) = args.model.clone() {
        info!(model = %model, "Using model from command line");
        config.model = model;
    }
}

/// Read queries from stdin until `quit`, `exit` or end of input.
async fn interactive<S, L>(pipeline: &ResearchPipeline<S, L>, json: bool) -> Result<()>
where
    S: devtools_research::SearchScrapeProvider,
    L: devtools_research::LanguageModelProvider,
{
    println!("Developer Tools Research Agent (type 'quit' to exit)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\nDeveloper Tools Query: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();

        if matches!(query.to_lowercase().as_str(), "quit" | "exit") {
            break;
        }
        if query.is_empty() {
            continue;
        }

        match pipeline.run(query).await {
            Ok(state) => print_state(&state, json)?,
            Err(e) => {
                error!(error = %e, "Research failed");
                eprintln!("\nResearch failed: {e}");
                print_hint(&e.to_string());
            }
        }
    }

    Ok(())
}

// =============================================================================
// OUTPUT
// =============================================================================
fn print_state(state: &ResearchState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
    } else {
        println!("{}", format_report(state));
    }
    Ok(())
}

/// Human-readable report for one research run.
fn format_report(state: &ResearchState) -> String {
    let mut out = format!("\nResults for: {}\n{}\n", state.query(), "=".repeat(60));

    if state.companies().is_empty() {
        out.push_str("\nNo tools could be researched.\n");
    }

    for (i, company) in state.companies().iter().enumerate() {
        out.push_str(&format_company(i + 1, company));
    }

    if let Some(analysis) = state.analysis() {
        out.push_str(&format!(
            "\nDeveloper Recommendations\n{}\n{}\n",
            "-".repeat(40),
            analysis
        ));
    }

    out
}

fn format_company(index: usize, company: &CompanyInfo) -> String {
    let mut out = format!("\n{}. {}\n", index, company.name);

    if !company.website.is_empty() {
        out.push_str(&format!("   Website: {}\n", company.website));
    }
    out.push_str(&format!("   Pricing: {}\n", company.pricing_model));
    out.push_str(&format!(
        "   Open Source: {}\n",
        tri_state(company.is_open_source)
    ));
    if !company.tech_stack.is_empty() {
        out.push_str(&format!(
            "   Tech Stack: {}\n",
            first_n(&company.tech_stack, 5)
        ));
    }
    if !company.language_support.is_empty() {
        out.push_str(&format!(
            "   Language Support: {}\n",
            first_n(&company.language_support, 5)
        ));
    }
    out.push_str(&format!(
        "   API: {}\n",
        match company.api_available {
            Some(true) => "Available",
            Some(false) => "Not available",
            None => "Unknown",
        }
    ));
    if !company.integration_capabilities.is_empty() {
        out.push_str(&format!(
            "   Integrations: {}\n",
            first_n(&company.integration_capabilities, 4)
        ));
    }
    if !company.description.is_empty() && !company.analysis_failed() {
        out.push_str(&format!("   Description: {}\n", company.description));
    }

    out
}

fn tri_state(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "Yes",
        Some(false) => "No",
        None => "Unknown",
    }
}

fn first_n(items: &[String], n: usize) -> String {
    items.iter().take(n).cloned().collect::<Vec<_>>().join(", ")
}

const OLLAMA_HINT: &str =
    "Tip: if you use the ollama backend, make sure Ollama is running:\n   ollama serve";

const CREDENTIALS_HINT: &str = "Tip: check OPENAI_API_KEY / FIRECRAWL_API_KEY";

/// Point at the usual culprits for common failures.
fn print_hint(message: &str) {
    if let Some(hint) = hint_for(message) {
        eprintln!("\n{hint}");
    }
}

fn hint_for(message: &str) -> Option<&'static str> {
    let message = message.to_lowercase();
    // reqwest reports an unreachable host as "error sending request for url (...)"
    if message.contains("connection refused") || message.contains("error sending request") {
        Some(OLLAMA_HINT)
    } else if message.contains("401") || message.contains("unauthorized") {
        Some(CREDENTIALS_HINT)
    } else {
        None
    }
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// Install the global tracing subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
