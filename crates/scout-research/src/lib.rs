//! scout-research: Company research pipeline
//!
//! - Resolver: finds a company's official website
//! - Extractor: pattern-based field extraction from the site
//! - Enrich: web-search enrichment of fields the site did not yield
//! - Synthesizer: fixed-section report template plus model polishing
//! - Render: `.docx` rendering of finished reports
//! - Pipeline: the sequential run tying these together

pub mod enrich;
pub mod extractor;
pub mod pipeline;
pub mod record;
pub mod render;
pub mod resolver;
pub mod synthesizer;

pub use enrich::{Enricher, Enrichment, EnrichmentStrategy, ENRICHMENT_FAILED};
pub use extractor::{FieldExtractor, HttpPageSource, PageSource, PatternRules};
pub use pipeline::{ResearchOutcome, ResearchPipeline, ResearchReport};
pub use record::{CompanyRecord, NOT_AVAILABLE, NO_SAP_POSTINGS};
pub use render::{report_file_name, DocumentRenderer, DocxRenderer, DOCX_MIME};
pub use resolver::{
    first_organic_link, ScrapingResolver, SerpApiResolver, SiteResolver, DEFAULT_RESULT_SELECTOR,
};
pub use synthesizer::{render_template, ReportSynthesizer, Synthesis, REPORT_TEMPLATE, SUMMARY_FAILED};
