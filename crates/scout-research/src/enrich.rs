//! Web-search enrichment for fields the website did not yield.
//!
//! Enrichment never fails the run. A provider that errors or returns
//! nothing is "no result"; a run that ends without findings is a
//! [`Enrichment::Failed`] the synthesizer simply ignores.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use scout_core::{Agent, AgentConfig, ChatModel, Error, ToolRegistry};

use crate::record::{field_label, is_sentinel, CompanyRecord};

/// Degraded marker shown when enrichment produced nothing usable.
pub const ENRICHMENT_FAILED: &str = "Could not enrich company data.";

/// Gaps named in a fallback search query.
const QUERY_GAP_LIMIT: usize = 4;

/// How search providers are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentStrategy {
    /// The model picks tools, guided by the preference order in the prompt.
    #[default]
    Agent,
    /// Providers are walked in registration order until one returns text.
    Fallback,
    Off,
}

impl fmt::Display for EnrichmentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent => write!(f, "agent"),
            Self::Fallback => write!(f, "fallback"),
            Self::Off => write!(f, "off"),
        }
    }
}

impl FromStr for EnrichmentStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "agent" => Ok(Self::Agent),
            "fallback" => Ok(Self::Fallback),
            "off" | "none" => Ok(Self::Off),
            other => Err(Error::config(format!(
                "Unknown enrichment strategy '{}' (expected agent, fallback, or off)",
                other
            ))),
        }
    }
}

/// Outcome of an enrichment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrichment {
    Found {
        findings: String,
        /// Providers that returned text, in call order.
        sources: Vec<String>,
    },
    /// Not attempted: disabled, or nothing was missing.
    Skipped,
    Failed { reason: String },
}

impl Enrichment {
    pub fn findings(&self) -> Option<&str> {
        match self {
            Self::Found { findings, .. } => Some(findings),
            _ => None,
        }
    }

    pub fn sources(&self) -> &[String] {
        match self {
            Self::Found { sources, .. } => sources,
            _ => &[],
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Enrichment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found { sources, .. } => write!(f, "enriched via {}", sources.join(", ")),
            Self::Skipped => write!(f, "enrichment skipped"),
            Self::Failed { reason } => write!(f, "{} ({})", ENRICHMENT_FAILED, reason),
        }
    }
}

/// Fills record gaps from web search.
pub struct Enricher {
    model: ChatModel,
    tools: ToolRegistry,
    strategy: EnrichmentStrategy,
    max_iterations: usize,
}

impl Enricher {
    pub fn new(model: ChatModel, tools: ToolRegistry) -> Self {
        Self {
            model,
            tools,
            strategy: EnrichmentStrategy::default(),
            max_iterations: 8,
        }
    }

    pub fn with_strategy(mut self, strategy: EnrichmentStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn strategy(&self) -> EnrichmentStrategy {
        self.strategy
    }

    /// Search for whatever `known` is missing.
    pub async fn enrich(&self, company_name: &str, known: &CompanyRecord) -> Enrichment {
        if self.strategy == EnrichmentStrategy::Off {
            return Enrichment::Skipped;
        }

        let gaps = known.missing_fields();
        if gaps.is_empty() {
            debug!(company = company_name, "No gaps to enrich");
            return Enrichment::Skipped;
        }

        if self.tools.is_empty() {
            warn!(company = company_name, "No search providers configured");
            return Enrichment::failed("no search providers configured");
        }

        info!(
            company = company_name,
            strategy = %self.strategy,
            gaps = gaps.len(),
            providers = ?self.tools.names(),
            "Enriching company data"
        );

        match self.strategy {
            EnrichmentStrategy::Agent => self.enrich_with_agent(company_name, known, &gaps).await,
            EnrichmentStrategy::Fallback => self.enrich_with_fallback(company_name, &gaps).await,
            EnrichmentStrategy::Off => Enrichment::Skipped,
        }
    }

    async fn enrich_with_agent(
        &self,
        company_name: &str,
        known: &CompanyRecord,
        gaps: &[&str],
    ) -> Enrichment {
        let config = AgentConfig::new("enricher")
            .with_system_prompt(system_prompt(&self.tools.names()))
            .with_max_iterations(self.max_iterations);
        let task = task_prompt(company_name, known, gaps);

        match Agent::run_once(&self.model, &self.tools, &config, &task).await {
            Ok(run) => {
                let findings = run.content.trim();
                if findings.is_empty() {
                    return Enrichment::failed("model returned no findings");
                }

                let mut sources: Vec<String> = Vec::new();
                for trace in run.trace.iter().filter(|t| t.succeeded) {
                    if !sources.contains(&trace.tool_name) {
                        sources.push(trace.tool_name.clone());
                    }
                }

                debug!(
                    company = company_name,
                    iterations = run.iterations,
                    tools = ?run.tools_used(),
                    "Enrichment agent finished"
                );
                Enrichment::Found {
                    findings: findings.to_string(),
                    sources,
                }
            }
            Err(e) => {
                warn!(company = company_name, error = %e, "Enrichment agent failed");
                Enrichment::failed(e.to_string())
            }
        }
    }

    async fn enrich_with_fallback(&self, company_name: &str, gaps: &[&str]) -> Enrichment {
        let query = fallback_query(company_name, gaps);

        let mut hit = None;
        for tool in self.tools.iter() {
            match tool.execute(json!({ "query": query })).await {
                Ok(output) if output.has_content() => {
                    hit = Some((tool.name().to_string(), output.content));
                    break;
                }
                Ok(output) => {
                    debug!(tool = tool.name(), error = output.is_error, "No result, trying next provider");
                }
                Err(e) => {
                    warn!(tool = tool.name(), error = %e, "Search provider failed, trying next");
                }
            }
        }

        let Some((source, raw)) = hit else {
            return Enrichment::failed("no search provider returned results");
        };

        let findings = match self.model.invoke(&distill_prompt(company_name, gaps, &raw)).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => raw,
            Err(e) => {
                warn!(error = %e, "Could not distill search results, keeping raw text");
                raw
            }
        };

        Enrichment::Found {
            findings,
            sources: vec![source],
        }
    }
}

fn system_prompt(tool_names: &[&str]) -> String {
    format!(
        "You are a business research assistant. Use the search tools to find facts about \
         companies. Try the tools in this order, moving to the next one only when a tool \
         returns no result: {}. Report only facts you found, one per bullet point, and name \
         the source of each fact. If no tool returns anything useful, say so plainly.",
        tool_names.join(", ")
    )
}

fn task_prompt(company_name: &str, known: &CompanyRecord, gaps: &[&str]) -> String {
    let mut prompt = format!("Find current information about the company \"{}\".\n", company_name);

    let known_facts: Vec<String> = known
        .fields()
        .filter(|(key, value)| *key != "company_name" && !is_sentinel(value))
        .map(|(key, value)| format!("- {}: {}", field_label(key), value))
        .collect();
    if !known_facts.is_empty() {
        prompt.push_str("\nAlready known:\n");
        prompt.push_str(&known_facts.join("\n"));
        prompt.push('\n');
    }

    prompt.push_str("\nStill missing:\n");
    for gap in gaps {
        prompt.push_str(&format!("- {}\n", field_label(gap)));
    }
    prompt
}

fn fallback_query(company_name: &str, gaps: &[&str]) -> String {
    let topics: Vec<String> = gaps
        .iter()
        .take(QUERY_GAP_LIMIT)
        .map(|gap| field_label(gap).to_lowercase())
        .collect();
    format!("{} {}", company_name, topics.join(" "))
}

fn distill_prompt(company_name: &str, gaps: &[&str], raw: &str) -> String {
    let wanted: Vec<&str> = gaps.iter().map(|gap| field_label(gap)).collect();
    format!(
        "From the search results below, list the facts about {} that cover any of: {}.\n\
         Use one bullet point per fact. Leave out anything the results do not state.\n\n\
         Search results:\n{}",
        company_name,
        wanted.join(", "),
        raw
    )
}
