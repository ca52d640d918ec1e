//! scout-tools: Outbound web plumbing and storage for scout
//!
//! - Web: HTTP clients, page fetching, and visible-text extraction
//! - Search: Tavily, DuckDuckGo, and SerpAPI search providers exposed as tools
//! - Store: session store for generated reports and search history

pub mod search;
pub mod store;
pub mod web;

pub use search::{
    create_search_tools, DuckDuckGoSearch, SearchProvider, SearchTool, SearchToolsConfig,
    SerpApiSearch, TavilySearch,
};
pub use store::{MemorySessionStore, SessionStore, SqliteSessionStore};
pub use web::{build_client, fetch_html, visible_text, BROWSER_USER_AGENT};
