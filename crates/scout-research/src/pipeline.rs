//! The research pipeline: resolve, extract, enrich, synthesize, store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use scout_core::Error;
use scout_tools::SessionStore;

use crate::enrich::{Enricher, Enrichment};
use crate::extractor::FieldExtractor;
use crate::synthesizer::{ReportSynthesizer, Synthesis, SUMMARY_FAILED};

/// A generated report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchReport {
    pub company: String,
    pub text: String,
    pub enrichment: Enrichment,
    pub generated_at: DateTime<Utc>,
}

/// What one pipeline run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResearchOutcome {
    Report(ResearchReport),
    /// Synthesis failed; nothing was stored.
    Failed { company: String, message: String },
}

impl ResearchOutcome {
    pub fn company(&self) -> &str {
        match self {
            Self::Report(report) => &report.company,
            Self::Failed { company, .. } => company,
        }
    }

    /// Report text, or the failure message.
    pub fn text(&self) -> &str {
        match self {
            Self::Report(report) => &report.text,
            Self::Failed { message, .. } => message,
        }
    }

    pub fn is_report(&self) -> bool {
        matches!(self, Self::Report(_))
    }
}

/// Runs one company through every stage, sequentially.
pub struct ResearchPipeline {
    extractor: FieldExtractor,
    enricher: Option<Enricher>,
    synthesizer: ReportSynthesizer,
    store: Arc<dyn SessionStore>,
}

impl ResearchPipeline {
    pub fn new(
        extractor: FieldExtractor,
        synthesizer: ReportSynthesizer,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            extractor,
            enricher: None,
            synthesizer,
            store,
        }
    }

    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Research `company_name` and store the report.
    ///
    /// The name enters the history before any network call. External
    /// failures degrade; the only errors are an empty name and a template
    /// naming an unknown field.
    pub async fn run(&self, company_name: &str) -> Result<ResearchOutcome, Error> {
        let company = company_name.trim();
        if company.is_empty() {
            return Err(Error::invalid_request("company name must not be empty"));
        }

        if let Err(e) = self.store.append_history(company) {
            warn!(company, error = %e, "Could not record search history");
        }

        info!(company, "Researching company");
        let record = self.extractor.extract(company).await;

        let enrichment = match &self.enricher {
            Some(enricher) => enricher.enrich(company, &record).await,
            None => Enrichment::Skipped,
        };
        info!(company, enrichment = %enrichment, "Enrichment finished");

        let synthesis = self
            .synthesizer
            .synthesize(company, &record, enrichment.findings())
            .await?;

        match synthesis {
            Synthesis::Report(text) => {
                if let Err(e) = self.store.put(company, &text) {
                    warn!(company, error = %e, "Could not store report");
                }
                info!(company, chars = text.len(), "Report generated");
                Ok(ResearchOutcome::Report(ResearchReport {
                    company: company.to_string(),
                    text,
                    enrichment,
                    generated_at: Utc::now(),
                }))
            }
            Synthesis::Failed { reason } => {
                warn!(company, reason = %reason, "Report not generated");
                Ok(ResearchOutcome::Failed {
                    company: company.to_string(),
                    message: SUMMARY_FAILED.to_string(),
                })
            }
        }
    }

    /// A previously stored report. Never touches the network.
    pub fn recall(&self, company_name: &str) -> Result<Option<String>, Error> {
        self.store.get(company_name.trim())
    }

    pub fn history(&self) -> Result<Vec<String>, Error> {
        self.store.list_history()
    }
}
