//! HTTP clients and page text extraction.

use std::time::Duration;

use reqwest::Client;
use scraper::Html;
use tracing::debug;

use scout_core::Error;

/// Browser-identifying user agent. Search engines serve an empty or
/// challenge page to obvious bots.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0";

/// Elements whose text is never shown to a reader.
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Build an HTTP client with the given user agent. `timeout` of `None` keeps
/// the client default.
pub fn build_client(user_agent: &str, timeout: Option<Duration>) -> Result<Client, Error> {
    let mut builder = Client::builder().user_agent(user_agent);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))
}

/// GET a page and return its body as text.
pub async fn fetch_html(client: &Client, url: &str) -> Result<String, Error> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Error::Timeout(format!("{}: {}", url, e))
        } else {
            Error::network(format!("Failed to fetch '{}': {}", url, e))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::api(status.as_u16(), format!("HTTP error fetching {}", url)));
    }

    let body = response
        .text()
        .await
        .map_err(|e| Error::network(format!("Failed to read response from '{}': {}", url, e)))?;

    debug!(url, bytes = body.len(), "Fetched page");
    Ok(body)
}

/// All visible text of a document, text nodes joined by single spaces.
pub fn visible_text(document: &Html) -> String {
    let mut text = String::new();

    for node in document.root_element().descendants() {
        let Some(t) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| INVISIBLE_TAGS.contains(&el.name()))
        });
        if hidden {
            continue;
        }

        let trimmed = t.trim();
        if !trimmed.is_empty() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(trimmed);
        }
    }

    collapse_whitespace(&text)
}

/// Collapse every whitespace run (including newlines) into one space.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
