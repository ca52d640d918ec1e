//! Report synthesis: fixed-section template rendering, then a language-model
//! pass for final prose.

use tracing::{debug, warn};

use scout_core::{ChatModel, Error};

use crate::record::CompanyRecord;

/// Shown in place of a report when the model call fails.
pub const SUMMARY_FAILED: &str = "Summary generation failed.";

/// The report prompt. `{key}` placeholders name [`CompanyRecord`] fields;
/// `{company_name}` is the name the user searched for. `{{` and `}}` are
/// literal braces.
pub const REPORT_TEMPLATE: &str = "\
You are a business intelligence assistant creating a report on **{company_name}**.
Fill in missing information from any additional research findings that follow the report.

**Company Report**

## Company Overview
- **Company Name:** {company_name}
- **Address:** {address}
- **Employee Count:** {employee_count}
- **Annual Revenue:** {annual_revenue}

## Recent Developments
- **Leadership Changes:** {leadership_changes}
- **Recent News:** {recent_news}
- **Recent SAP Job Postings:** {recent_sap_job_postings}

## Financial & Industry Insights
- **Recent Funding:** {recent_funding}
- **ERP System:** {current_erp}
- **SIC Codes:** {sic_codes}

## SWOT Analysis
- **Strengths:** {strengths}
- **Weaknesses:** {weaknesses}
- **Opportunities:** {opportunities}
- **Threats:** {threats}

## Contact Information
- **Phone:** {phone_number}
- **Address:** {address}
- **Official Website:** {company_official_website}

## Disclaimer
Some info may be outdated. Refer to the official website for the latest updates.
";

/// Section headings every report template carries, in order.
pub const REPORT_SECTIONS: [&str; 6] = [
    "Company Overview",
    "Recent Developments",
    "Financial & Industry Insights",
    "SWOT Analysis",
    "Contact Information",
    "Disclaimer",
];

/// Substitute every `{key}` in `template`.
///
/// A placeholder naming a field the record does not have is an
/// [`Error::Template`]. A brace that does not open a well-formed
/// placeholder is copied through.
pub fn render_template(
    template: &str,
    company_name: &str,
    record: &CompanyRecord,
) -> Result<String, Error> {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }

        if let Some(end) = tail.find('}').filter(|_| tail.starts_with('{')) {
            let key = &tail[1..end];
            if is_placeholder(key) {
                let value = if key == "company_name" {
                    company_name
                } else {
                    record.get(key).ok_or_else(|| Error::template(key))?
                };
                out.push_str(value);
                rest = &tail[end + 1..];
                continue;
            }
        }

        out.push_str(&tail[..1]);
        rest = &tail[1..];
    }

    out.push_str(rest);
    Ok(out)
}

fn is_placeholder(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Result of a synthesis attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Synthesis {
    Report(String),
    /// The model call failed. Nothing should be stored.
    Failed { reason: String },
}

impl Synthesis {
    /// Text to show the user.
    pub fn text(&self) -> &str {
        match self {
            Self::Report(text) => text,
            Self::Failed { .. } => SUMMARY_FAILED,
        }
    }
}

/// Turns a record (plus optional search findings) into report text.
pub struct ReportSynthesizer {
    model: ChatModel,
    template: String,
}

impl ReportSynthesizer {
    pub fn new(model: ChatModel) -> Self {
        Self {
            model,
            template: REPORT_TEMPLATE.to_string(),
        }
    }

    /// Use a custom template. Rejected up front if it names an unknown field.
    pub fn with_template(mut self, template: impl Into<String>) -> Result<Self, Error> {
        let template = template.into();
        render_template(&template, "", &CompanyRecord::unavailable())?;
        self.template = template;
        Ok(self)
    }

    /// The deterministic, pre-model rendering.
    pub fn render(&self, company_name: &str, record: &CompanyRecord) -> Result<String, Error> {
        render_template(&self.template, company_name, record)
    }

    /// The full prompt: the rendered template, then findings if any.
    pub fn prompt(
        &self,
        company_name: &str,
        record: &CompanyRecord,
        findings: Option<&str>,
    ) -> Result<String, Error> {
        let mut prompt = self.render(company_name, record)?;
        if let Some(findings) = findings.map(str::trim).filter(|f| !f.is_empty()) {
            prompt.push_str("\n**Additional research findings**\n\n");
            prompt.push_str(findings);
            prompt.push('\n');
        }
        Ok(prompt)
    }

    /// Render and polish. Only a template error is returned as `Err`; a
    /// model failure is [`Synthesis::Failed`].
    pub async fn synthesize(
        &self,
        company_name: &str,
        record: &CompanyRecord,
        findings: Option<&str>,
    ) -> Result<Synthesis, Error> {
        let prompt = self.prompt(company_name, record, findings)?;
        debug!(company = company_name, prompt_len = prompt.len(), "Synthesizing report");

        match self.model.invoke(&prompt).await {
            Ok(text) if !text.trim().is_empty() => Ok(Synthesis::Report(text.trim().to_string())),
            Ok(_) => {
                warn!(company = company_name, "Model returned an empty report");
                Ok(Synthesis::Failed {
                    reason: "empty response".to_string(),
                })
            }
            Err(e) => {
                warn!(company = company_name, error = %e, "Report generation failed");
                Ok(Synthesis::Failed {
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use scout_core::testing::MockProvider;

    use crate::record::NOT_AVAILABLE;

    fn acme() -> CompanyRecord {
        let mut record = CompanyRecord::unavailable();
        record.company_name = "Acme Corp".to_string();
        record.employee_count = "1250".to_string();
        record.address = "1234 Main Street, Springfield, IL 62704".to_string();
        record.current_erp = "SAP".to_string();
        record
    }

    fn synthesizer(provider: Arc<MockProvider>) -> ReportSynthesizer {
        ReportSynthesizer::new(ChatModel::new(provider))
    }

    #[test]
    fn test_render_substitutes_every_field() {
        let rendered = render_template(REPORT_TEMPLATE, "Acme Corp", &acme()).unwrap();

        assert!(rendered.starts_with(
            "You are a business intelligence assistant creating a report on **Acme Corp**."
        ));
        assert!(rendered.contains("- **Employee Count:** 1250"));
        assert!(rendered.contains("- **ERP System:** SAP"));
        assert_eq!(
            rendered
                .matches("- **Address:** 1234 Main Street, Springfield, IL 62704")
                .count(),
            2
        );
        assert!(!rendered.contains('{'));
        assert!(!rendered.contains('}'));
    }

    #[test]
    fn test_render_sections_in_order() {
        let rendered = render_template(REPORT_TEMPLATE, "Acme Corp", &acme()).unwrap();
        let mut last = 0;
        for section in REPORT_SECTIONS {
            let heading = format!("## {}", section);
            let pos = rendered.find(&heading).unwrap_or_else(|| panic!("missing {heading}"));
            assert!(pos > last);
            last = pos;
        }
        assert!(rendered.contains(
            "Some info may be outdated. Refer to the official website for the latest updates."
        ));
    }

    #[test]
    fn test_render_is_deterministic() {
        let record = acme();
        let first = render_template(REPORT_TEMPLATE, "Acme Corp", &record).unwrap();
        let second = render_template(REPORT_TEMPLATE, "Acme Corp", &record).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_sentinel_record() {
        let rendered =
            render_template(REPORT_TEMPLATE, "Ghost Inc", &CompanyRecord::unavailable()).unwrap();
        assert!(rendered.contains("**Ghost Inc**"));
        assert!(rendered.contains(&format!("- **Threats:** {}", NOT_AVAILABLE)));
    }

    #[test]
    fn test_render_unknown_key_is_template_error() {
        let err = render_template("CEO: {ceo_name}", "Acme", &acme()).unwrap_err();
        assert!(matches!(&err, Error::Template { key } if key == "ceo_name"));
    }

    #[test]
    fn test_render_literal_braces() {
        let rendered = render_template("{{json}} {company_name} { } {a-b} }", "Acme", &acme()).unwrap();
        assert_eq!(rendered, "{json} Acme { } {a-b} }");
    }

    #[test]
    fn test_with_template_rejects_unknown_field() {
        let provider = Arc::new(MockProvider::new());
        assert!(synthesizer(provider.clone())
            .with_template("{company_name}: {employee_count}")
            .is_ok());
        assert!(synthesizer(provider).with_template("{revenue}").is_err());
    }

    #[tokio::test]
    async fn test_synthesize_returns_trimmed_model_text() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response("  ## Company Overview\n- Acme Corp makes anvils.\n\n");

        let synthesis = synthesizer(provider.clone())
            .synthesize("Acme Corp", &acme(), None)
            .await
            .unwrap();

        assert_eq!(
            synthesis,
            Synthesis::Report("## Company Overview\n- Acme Corp makes anvils.".to_string())
        );
        let request = provider.last_request().unwrap();
        assert_eq!(request.messages.len(), 1);
        assert!(request.messages[0].content.contains("**Acme Corp**"));
        assert!(!request.messages[0].content.contains("Additional research findings"));
    }

    #[tokio::test]
    async fn test_synthesize_appends_findings() {
        let provider = Arc::new(MockProvider::echo());
        let synthesizer = synthesizer(provider);

        let rendered = synthesizer.render("Acme Corp", &acme()).unwrap();
        let synthesis = synthesizer
            .synthesize("Acme Corp", &acme(), Some("- Funding: $20 million (tavily)"))
            .await
            .unwrap();

        let Synthesis::Report(text) = synthesis else {
            panic!("expected a report");
        };
        assert!(text.starts_with(rendered.trim_end()));
        assert!(text.ends_with("**Additional research findings**\n\n- Funding: $20 million (tavily)"));
    }

    #[tokio::test]
    async fn test_synthesize_model_failure_degrades() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_error(Error::auth("invalid api key"));

        let synthesis = synthesizer(provider)
            .synthesize("Acme Corp", &acme(), None)
            .await
            .unwrap();

        assert!(matches!(synthesis, Synthesis::Failed { .. }));
        assert_eq!(synthesis.text(), SUMMARY_FAILED);
    }

    #[tokio::test]
    async fn test_synthesize_empty_response_degrades() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response("   ");

        let synthesis = synthesizer(provider)
            .synthesize("Acme Corp", &acme(), None)
            .await
            .unwrap();
        assert_eq!(synthesis.text(), SUMMARY_FAILED);
    }
}
