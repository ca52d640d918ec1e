//! Field extraction from a company's official website.

mod rules;

pub use rules::{current_erp, sap_job_postings, sentences, PatternRules, ERP_SYSTEMS};

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use scout_core::Error;
use scout_tools::{fetch_html, visible_text};

use crate::record::CompanyRecord;
use crate::resolver::SiteResolver;

/// Source of page bodies.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, Error>;
}

/// Fetches pages over HTTP.
pub struct HttpPageSource {
    client: Client,
}

impl HttpPageSource {
    /// `client` should carry the fetch timeout.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str) -> Result<String, Error> {
        fetch_html(&self.client, url).await
    }
}

/// Resolves a company's website, fetches it, and runs the pattern rules
/// over the page.
pub struct FieldExtractor {
    resolver: Arc<dyn SiteResolver>,
    pages: Arc<dyn PageSource>,
    rules: PatternRules,
}

impl FieldExtractor {
    pub fn new(resolver: Arc<dyn SiteResolver>, pages: Arc<dyn PageSource>) -> Result<Self, Error> {
        Ok(Self {
            resolver,
            pages,
            rules: PatternRules::new()?,
        })
    }

    /// Extract a record for `company_name`.
    ///
    /// Never fails. With no resolvable site, or a site that cannot be
    /// fetched, every field (including the name and website) is the
    /// sentinel.
    pub async fn extract(&self, company_name: &str) -> CompanyRecord {
        let Some(url) = self.resolver.resolve(company_name).await else {
            info!(
                company = company_name,
                resolver = self.resolver.name(),
                "No official site found"
            );
            return CompanyRecord::unavailable();
        };

        match self.pages.fetch(&url).await {
            Ok(html) => self.extract_fields(company_name, &url, &html),
            Err(e) => {
                warn!(company = company_name, url = %url, error = %e, "Site fetch failed");
                CompanyRecord::unavailable()
            }
        }
    }

    /// Run the pattern rules over an already-fetched page.
    pub fn extract_fields(&self, company_name: &str, url: &str, html: &str) -> CompanyRecord {
        let document = Html::parse_document(html);
        let text = visible_text(&document);
        let anchors = anchor_texts(&document);

        let mut record = CompanyRecord::unavailable();
        record.company_name = company_name.to_string();
        record.company_official_website = url.to_string();
        self.rules.apply(&mut record, &text, &anchors);

        debug!(
            company = company_name,
            missing = record.missing_fields().len(),
            "Extracted company fields"
        );
        record
    }
}

/// Text of every anchor element, whitespace-collapsed, empties dropped.
fn anchor_texts(document: &Html) -> Vec<String> {
    let Ok(anchor) = Selector::parse("a") else {
        return Vec::new();
    };

    document
        .select(&anchor)
        .map(|a| a.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .collect()
}
