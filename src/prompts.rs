//! Prompt templates for the three pipeline stages.

use crate::llm::Message;

pub const TOOL_EXTRACTION_SYSTEM: &str = "You are a tech researcher. Extract specific tool, \
library, platform, or service names from articles. Focus on actual products developers can \
use, not general concepts or features.";

pub const TOOL_ANALYSIS_SYSTEM: &str = "You are analyzing developer tools and programming \
technologies. Focus on information relevant to programmers and software developers. Pay \
special attention to programming languages, frameworks, APIs, SDKs, and development workflows.";

pub const RECOMMENDATIONS_SYSTEM: &str = "You are a senior software engineer giving quick, \
concise tech recommendations. Keep responses brief and actionable: at most 3-4 sentences.";

/// Messages asking the model to list tool names found in scraped articles.
pub fn tool_extraction(query: &str, content: &str) -> Vec<Message> {
    let user = format!(
        "Query: {query}\n\
         Article Content: {content}\n\n\
         Extract a list of specific tool/service names mentioned in this content that are \
         relevant to \"{query}\".\n\n\
         Rules:\n\
         - Only include actual product names, not generic terms\n\
         - Focus on tools developers can directly use or integrate\n\
         - Include both open source and commercial options\n\
         - Limit to the 5 most relevant tools\n\
         - Return just the tool names, one per line, no descriptions\n\n\
         Example format:\n\
         Supabase\n\
         PlanetScale\n\
         Railway\n\
         Appwrite\n\
         Nhost"
    );

    vec![Message::system(TOOL_EXTRACTION_SYSTEM), Message::user(user)]
}

/// Messages asking for a structured analysis of one tool's website.
pub fn tool_analysis(company_name: &str, content: &str) -> Vec<Message> {
    let user = format!(
        "Company/Tool: {company_name}\n\
         Website Content: {content}\n\n\
         Analyze this content from a developer's perspective and provide:\n\
         - pricing_model: One of \"Free\", \"Freemium\", \"Paid\", \"Enterprise\", or \"Unknown\"\n\
         - is_open_source: true if open source, false if proprietary, null if unclear\n\
         - tech_stack: Programming languages, frameworks, databases, APIs, or technologies \
         supported/used\n\
         - description: One sentence on what this tool does for developers\n\
         - api_available: true if a REST API, GraphQL, SDK, or other programmatic access is \
         mentioned\n\
         - language_support: Programming languages explicitly supported \
         (e.g. Python, JavaScript, Go)\n\
         - integration_capabilities: Tools/platforms it integrates with \
         (e.g. GitHub, VS Code, Docker, AWS)\n\n\
         Focus on developer-relevant features like APIs, SDKs, language support, integrations, and \
         development workflows."
    );

    vec![Message::system(TOOL_ANALYSIS_SYSTEM), Message::user(user)]
}

/// Messages asking for the final recommendation over the researched tools.
pub fn recommendations(query: &str, company_data: &str) -> Vec<Message> {
    let user = format!(
        "Developer Query: {query}\n\
         Tools/Technologies Analyzed: {company_data}\n\n\
         Provide a brief recommendation (3-4 sentences max) covering:\n\
         - Which tool is best and why\n\
         - Key cost/pricing consideration\n\
         - Main technical advantage\n\n\
         Be concise and direct."
    );

    vec![Message::system(RECOMMENDATIONS_SYSTEM), Message::user(user)]
}
