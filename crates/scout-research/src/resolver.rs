//! Official-website resolution.
//!
//! Resolution never fails loudly: a blocked search page, a layout change,
//! or a network error all yield `None` and the pipeline carries on with an
//! all-sentinel record.

use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use tracing::{debug, warn};

use scout_core::Error;
use scout_tools::search::first_organic_link as serpapi_first_link;
use scout_tools::{fetch_html, SerpApiSearch};

/// Google results page queried by [`ScrapingResolver`].
pub const GOOGLE_SEARCH_URL: &str = "https://www.google.com/search";

/// Container of one organic result on the Google results page.
pub const DEFAULT_RESULT_SELECTOR: &str = "div.tF2Cxc";

/// Finds the official website of a company.
#[async_trait]
pub trait SiteResolver: Send + Sync {
    fn name(&self) -> &str;

    /// URL of the first organic result for "<company> official site".
    async fn resolve(&self, company_name: &str) -> Option<String>;
}

/// Search query for a company's official site.
pub fn site_query(company_name: &str) -> String {
    format!("{} official site", company_name)
}

/// The `href` of the first anchor inside the first element matching
/// `container`. Google wraps some result links as `/url?q=<target>`; those
/// are unwrapped. Anything that is not an absolute http(s) URL is rejected;
/// accepted links are returned as written.
pub fn first_organic_link(html: &str, container: &Selector) -> Option<String> {
    let anchor = Selector::parse("a").ok()?;
    let document = Html::parse_document(html);

    let href = document
        .select(container)
        .next()?
        .select(&anchor)
        .next()?
        .value()
        .attr("href")?;

    normalize_href(href)
}

fn normalize_href(href: &str) -> Option<String> {
    let href = href.trim();

    if href.starts_with("/url?") {
        let wrapped = Url::parse("https://www.google.com").ok()?.join(href).ok()?;
        let target = wrapped
            .query_pairs()
            .find(|(key, _)| key == "q" || key == "url")
            .map(|(_, value)| value.into_owned())?;
        return normalize_href(&target);
    }

    let url = Url::parse(href).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| href.to_string())
}

// =============================================================================
// Scraping resolver
// =============================================================================

/// Scrapes the Google results page with a browser user agent.
pub struct ScrapingResolver {
    client: Client,
    search_url: String,
    container: Selector,
}

impl ScrapingResolver {
    /// `result_selector` is the CSS selector of one organic result container.
    pub fn new(client: Client, result_selector: &str) -> Result<Self, Error> {
        let container = Selector::parse(result_selector).map_err(|e| {
            Error::config(format!(
                "Invalid result selector '{}': {:?}",
                result_selector, e
            ))
        })?;

        Ok(Self {
            client,
            search_url: GOOGLE_SEARCH_URL.to_string(),
            container,
        })
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    fn search_url_for(&self, company_name: &str) -> Option<String> {
        let query = site_query(company_name);
        let url = Url::parse_with_params(&self.search_url, &[("q", query.as_str())]).ok()?;
        Some(url.to_string())
    }
}

#[async_trait]
impl SiteResolver for ScrapingResolver {
    fn name(&self) -> &str {
        "scrape"
    }

    async fn resolve(&self, company_name: &str) -> Option<String> {
        let url = self.search_url_for(company_name)?;

        let html = match fetch_html(&self.client, &url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(company = company_name, error = %e, "Search page fetch failed");
                return None;
            }
        };

        let link = first_organic_link(&html, &self.container);
        debug!(company = company_name, link = ?link, "Resolved official site");
        link
    }
}

// =============================================================================
// SerpAPI resolver
// =============================================================================

/// Resolves through SerpAPI's Google engine. Immune to results-page layout
/// changes and bot challenges, at the cost of an API key.
pub struct SerpApiResolver {
    search: SerpApiSearch,
}

impl SerpApiResolver {
    pub fn new(search: SerpApiSearch) -> Self {
        Self { search }
    }
}

#[async_trait]
impl SiteResolver for SerpApiResolver {
    fn name(&self) -> &str {
        "serpapi"
    }

    async fn resolve(&self, company_name: &str) -> Option<String> {
        match self.search.search_json(&site_query(company_name)).await {
            Ok(results) => {
                let link = serpapi_first_link(&results).and_then(|href| normalize_href(&href));
                debug!(company = company_name, link = ?link, "Resolved official site");
                link
            }
            Err(e) => {
                warn!(company = company_name, error = %e, "SerpAPI resolution failed");
                None
            }
        }
    }
}
