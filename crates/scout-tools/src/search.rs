//! Search providers exposed to the enrichment agent as tools.
//!
//! Three interchangeable providers, registered in preference order:
//! Tavily (AI-native search API), DuckDuckGo (HTML results page), and
//! SerpAPI (Google results API). Each exposes `run(query) -> text`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use scout_core::{Error, PropertySchema, Tool, ToolDefinition, ToolOutput, ToolParameters, ToolRegistry};

use crate::web::{build_client, BROWSER_USER_AGENT};

const TAVILY_URL: &str = "https://api.tavily.com/search";
const DUCKDUCKGO_URL: &str = "https://html.duckduckgo.com/html/";
const SERPAPI_URL: &str = "https://serpapi.com/search.json";

/// Number of hits rendered into a tool result.
const MAX_HITS: usize = 5;

/// A single search-engine hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .take(MAX_HITS)
        .map(|h| format!("{}\n  {}\n  {}", h.title, h.url, h.snippet))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn status_error(tool: &str, status: StatusCode, body: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!("{}: {}", tool, body)),
        429 => Error::rate_limit(format!("{}: {}", tool, body)),
        code => Error::tool(tool, format!("API error {}: {}", code, body)),
    }
}

/// A search backend callable with a free-text query.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Tool name offered to the model.
    fn name(&self) -> &str;

    /// Natural-language description; carries the preference order.
    fn description(&self) -> &str;

    /// Run a query. An empty string means the provider found nothing.
    async fn run(&self, query: &str) -> Result<String, Error>;
}

// =============================================================================
// Tavily
// =============================================================================

pub struct TavilySearch {
    client: Client,
    api_key: String,
}

impl TavilySearch {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    content: String,
}

fn format_tavily(response: TavilyResponse) -> String {
    let hits: Vec<SearchHit> = response
        .results
        .into_iter()
        .map(|r| SearchHit {
            title: r.title,
            url: r.url,
            snippet: r.content,
        })
        .collect();

    match response.answer.filter(|a| !a.trim().is_empty()) {
        Some(answer) if hits.is_empty() => answer,
        Some(answer) => format!("{}\n\n{}", answer, format_hits(&hits)),
        None => format_hits(&hits),
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily_search"
    }

    fn description(&self) -> &str {
        "FAST and ACCURATE. Use this first for company ERP systems, SAP jobs, funding updates, \
         leadership changes, SWOT, or financials."
    }

    async fn run(&self, query: &str) -> Result<String, Error> {
        let request = TavilyRequest {
            query,
            search_depth: "basic",
            max_results: MAX_HITS,
            include_answer: true,
        };

        let response = self
            .client
            .post(TAVILY_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::tool(self.name(), format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(self.name(), status, &body));
        }

        let result: TavilyResponse = response
            .json()
            .await
            .map_err(|e| Error::tool(self.name(), format!("Failed to parse response: {}", e)))?;

        Ok(format_tavily(result))
    }
}

// =============================================================================
// DuckDuckGo
// =============================================================================

pub struct DuckDuckGoSearch {
    client: Client,
}

impl DuckDuckGoSearch {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// DuckDuckGo wraps result links in a redirect such as
/// `//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com&rut=..`.
fn unwrap_ddg_redirect(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    Url::parse(&absolute)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, target)| target.into_owned())
        })
        .unwrap_or(absolute)
}

fn parse_selector(tool: &str, css: &str) -> Result<Selector, Error> {
    Selector::parse(css).map_err(|e| Error::tool(tool, format!("Invalid selector '{}': {}", css, e)))
}

/// Parse the DuckDuckGo HTML results page.
pub fn parse_duckduckgo(html: &str) -> Result<Vec<SearchHit>, Error> {
    let result_sel = parse_selector("duckduckgo_search", ".result")?;
    let link_sel = parse_selector("duckduckgo_search", "a.result__a")?;
    let snippet_sel = parse_selector("duckduckgo_search", ".result__snippet")?;

    let document = Html::parse_document(html);
    let hits = document
        .select(&result_sel)
        .filter_map(|result| {
            let link = result.select(&link_sel).next()?;
            let title = link.text().collect::<String>().trim().to_string();
            if title.is_empty() {
                return None;
            }
            let url = unwrap_ddg_redirect(link.value().attr("href").unwrap_or_default());
            let snippet = result
                .select(&snippet_sel)
                .next()
                .map(|s| s.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            Some(SearchHit { title, url, snippet })
        })
        .collect();

    Ok(hits)
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo_search"
    }

    fn description(&self) -> &str {
        "Basic web search. Use ONLY if tavily_search fails or returns nothing."
    }

    async fn run(&self, query: &str) -> Result<String, Error> {
        let response = self
            .client
            .post(DUCKDUCKGO_URL)
            .form(&[("q", query)])
            .header("Accept", "text/html")
            .send()
            .await
            .map_err(|e| Error::tool(self.name(), format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(self.name(), status, &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::tool(self.name(), format!("Failed to read response: {}", e)))?;

        let hits = parse_duckduckgo(&body)?;
        debug!(query, hits = hits.len(), "DuckDuckGo search");
        Ok(format_hits(&hits))
    }
}

// =============================================================================
// SerpAPI
// =============================================================================

pub struct SerpApiSearch {
    client: Client,
    api_key: String,
}

impl SerpApiSearch {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }

    /// Raw Google results JSON for a query.
    pub async fn search_json(&self, query: &str) -> Result<Value, Error> {
        let response = self
            .client
            .get(SERPAPI_URL)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::tool("serpapi_search", format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("serpapi_search", status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| Error::tool("serpapi_search", format!("Failed to parse response: {}", e)))
    }
}

/// Link of the first organic result, if any.
pub fn first_organic_link(results: &Value) -> Option<String> {
    results["organic_results"]
        .as_array()?
        .iter()
        .find_map(|r| r["link"].as_str())
        .map(str::to_string)
}

/// Reduce a SerpAPI response to text: the direct answer when Google has one,
/// then the knowledge-graph description, then organic snippets.
pub fn format_serpapi(results: &Value) -> String {
    let mut parts = Vec::new();

    let answer_box = &results["answer_box"];
    if let Some(answer) = answer_box["answer"]
        .as_str()
        .or_else(|| answer_box["snippet"].as_str())
    {
        parts.push(answer.to_string());
    }

    if let Some(description) = results["knowledge_graph"]["description"].as_str() {
        parts.push(description.to_string());
    }

    let hits: Vec<SearchHit> = results["organic_results"]
        .as_array()
        .map(|organic| {
            organic
                .iter()
                .map(|r| SearchHit {
                    title: r["title"].as_str().unwrap_or_default().to_string(),
                    url: r["link"].as_str().unwrap_or_default().to_string(),
                    snippet: r["snippet"].as_str().unwrap_or_default().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    if !hits.is_empty() {
        parts.push(format_hits(&hits));
    }

    parts.join("\n\n")
}

#[async_trait]
impl SearchProvider for SerpApiSearch {
    fn name(&self) -> &str {
        "serpapi_search"
    }

    fn description(&self) -> &str {
        "Google search via SerpAPI. Last resort: only use if tavily_search and \
         duckduckgo_search both return nothing."
    }

    async fn run(&self, query: &str) -> Result<String, Error> {
        let results = self.search_json(query).await?;
        if let Some(error) = results["error"].as_str() {
            return Err(Error::tool(self.name(), error.to_string()));
        }
        Ok(format_serpapi(&results))
    }
}

// =============================================================================
// Tool adapter and factory
// =============================================================================

/// Exposes a [`SearchProvider`] as an agent tool taking `{"query": ..}`.
pub struct SearchTool {
    provider: Arc<dyn SearchProvider>,
}

impl SearchTool {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn description(&self) -> &str {
        self.provider.description()
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description()).with_parameters(
            ToolParameters::new().add_property("query", PropertySchema::string("The search query"), true),
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, Error> {
        let args: SearchArgs = serde_json::from_value(arguments)
            .map_err(|e| Error::tool(self.name(), format!("Invalid arguments: {}", e)))?;

        let text = self.provider.run(&args.query).await?;
        Ok(ToolOutput::success(text))
    }
}

/// Credentials and limits for the search providers.
#[derive(Debug, Clone)]
pub struct SearchToolsConfig {
    pub tavily_api_key: Option<String>,
    pub serpapi_api_key: Option<String>,
    pub enable_duckduckgo: bool,
    pub timeout: Duration,
}

impl Default for SearchToolsConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: None,
            serpapi_api_key: None,
            enable_duckduckgo: true,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Build the search tools in preference order. Providers without
/// credentials are left out.
pub fn create_search_tools(config: &SearchToolsConfig) -> Result<ToolRegistry, Error> {
    let client = build_client(BROWSER_USER_AGENT, Some(config.timeout))?;
    let mut registry = ToolRegistry::new();

    match &config.tavily_api_key {
        Some(key) => registry.register(Arc::new(SearchTool::new(Arc::new(TavilySearch::new(
            client.clone(),
            key,
        ))))),
        None => debug!("TAVILY_API_KEY not set, tavily_search disabled"),
    }

    if config.enable_duckduckgo {
        registry.register(Arc::new(SearchTool::new(Arc::new(DuckDuckGoSearch::new(
            client.clone(),
        )))));
    }

    match &config.serpapi_api_key {
        Some(key) => registry.register(Arc::new(SearchTool::new(Arc::new(SerpApiSearch::new(
            client, key,
        ))))),
        None => debug!("SERPAPI_API_KEY not set, serpapi_search disabled"),
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_duckduckgo() {
        let html = r#"
            <div class="result">
                <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Facme.example%2Fabout&rut=abc">Acme Corp - About</a>
                <a class="result__snippet">Acme Corp employs 250 people.</a>
            </div>
            <div class="result">
                <a class="result__a" href="https://news.example/acme">Acme raises $5 million</a>
            </div>
            <div class="result"><span>ad</span></div>
        "#;
        let hits = parse_duckduckgo(html).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Acme Corp - About");
        assert_eq!(hits[0].url, "https://acme.example/about");
        assert_eq!(hits[0].snippet, "Acme Corp employs 250 people.");
        assert_eq!(hits[1].url, "https://news.example/acme");
        assert!(hits[1].snippet.is_empty());
    }

    #[test]
    fn test_parse_duckduckgo_empty_page() {
        assert!(parse_duckduckgo("<html><body>No results.</body></html>").unwrap().is_empty());
    }

    #[test]
    fn test_format_tavily_prefers_answer() {
        let response: TavilyResponse = serde_json::from_value(json!({
            "answer": "Acme uses SAP S/4HANA.",
            "results": [{"title": "Acme ERP", "url": "https://a.example", "content": "SAP rollout"}]
        }))
        .unwrap();
        let text = format_tavily(response);
        assert!(text.starts_with("Acme uses SAP S/4HANA."));
        assert!(text.contains("https://a.example"));
    }

    #[test]
    fn test_format_tavily_no_results_is_empty() {
        let response: TavilyResponse = serde_json::from_value(json!({"results": []})).unwrap();
        assert!(format_tavily(response).is_empty());
    }

    #[test]
    fn test_format_serpapi() {
        let results = json!({
            "answer_box": {"snippet": "Acme Corp has 1,200 employees."},
            "organic_results": [
                {"title": "Acme", "link": "https://acme.example", "snippet": "Official site"}
            ]
        });
        let text = format_serpapi(&results);
        assert!(text.starts_with("Acme Corp has 1,200 employees."));
        assert!(text.contains("Official site"));
        assert_eq!(first_organic_link(&results).as_deref(), Some("https://acme.example"));
    }

    #[test]
    fn test_first_organic_link_missing() {
        assert_eq!(first_organic_link(&json!({"search_metadata": {}})), None);
    }

    #[test]
    fn test_create_search_tools_order_and_credentials() {
        let config = SearchToolsConfig {
            tavily_api_key: Some("tvly-test".to_string()),
            serpapi_api_key: Some("serp-test".to_string()),
            ..Default::default()
        };
        let registry = create_search_tools(&config).unwrap();
        assert_eq!(
            registry.names(),
            vec!["tavily_search", "duckduckgo_search", "serpapi_search"]
        );

        let keyless = create_search_tools(&SearchToolsConfig::default()).unwrap();
        assert_eq!(keyless.names(), vec!["duckduckgo_search"]);
    }

    #[tokio::test]
    async fn test_search_tool_rejects_bad_arguments() {
        let tool = SearchTool::new(Arc::new(DuckDuckGoSearch::new(Client::new())));
        let err = tool.execute(json!("not an object")).await.unwrap_err();
        assert!(err.to_string().contains("Invalid arguments"));
    }
}
