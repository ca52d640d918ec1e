//! Pattern rules that turn page text into record fields.
//!
//! Every rule is best-effort and independent. A rule that matches nothing
//! leaves its field at the sentinel.

use regex::Regex;

use scout_core::Error;

use crate::record::{CompanyRecord, NOT_AVAILABLE, NO_SAP_POSTINGS};

/// ERP vendors in priority order. The first one named anywhere on the page
/// wins.
pub const ERP_SYSTEMS: &[&str] = &[
    "SAP",
    "Oracle ERP",
    "Microsoft Dynamics",
    "NetSuite",
    "Infor",
];

const LEADERSHIP_KEYWORDS: &[&str] = &["ceo", "appointed", "named", "joined", "leadership"];
const NEWS_KEYWORDS: &[&str] = &["news", "announcement", "press release", "update"];
const SENTENCE_CAP: usize = 3;

/// Fewer digits than this is a year or a count, not a phone number.
const MIN_PHONE_DIGITS: usize = 7;

const PHONE: &str = r"\+?\d{1,3}[-.\s]?\(?\d{1,4}\)?[-.\s]?\d{1,4}[-.\s]?\d{1,9}";
const ADDRESS: &str = r"\d{1,5}\s[\w\s.,-]+?,\s\w+,\s[A-Z]{2}\s\d{5}(?:-\d{4})?";
const EMPLOYEES: &str = r"(?i)(\d[\d,]*)\s+(?:employees|staff|workers|team)";
const REVENUE: &str =
    r"(?i)(?:annual revenue|revenue|sales|turnover)[\s\w]{0,20}?\$?(\d[\d,.]*)\s?(million|billion)?";
const FUNDING: &str =
    r"(?i)\$?(\d[\d,.]*)\s?(million|billion)?\s+(?:funding|investment|raised|round)";
const SIC: &str = r"(?i)SIC Code[:\s]*(\d{4})";

/// The compiled regex battery.
#[derive(Debug, Clone)]
pub struct PatternRules {
    phone: Regex,
    address: Regex,
    employees: Regex,
    revenue: Regex,
    funding: Regex,
    sic: Regex,
}

impl PatternRules {
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            phone: compile("phone", PHONE)?,
            address: compile("address", ADDRESS)?,
            employees: compile("employees", EMPLOYEES)?,
            revenue: compile("revenue", REVENUE)?,
            funding: compile("funding", FUNDING)?,
            sic: compile("sic", SIC)?,
        })
    }

    /// Fill `record` from the page's visible text and its anchor texts.
    pub fn apply(&self, record: &mut CompanyRecord, text: &str, anchors: &[String]) {
        set(&mut record.phone_number, self.phone_number(text));
        set(&mut record.address, self.address(text));
        set(&mut record.employee_count, self.employee_count(text));
        set(&mut record.annual_revenue, self.annual_revenue(text));
        set(&mut record.recent_funding, self.recent_funding(text));
        set(&mut record.sic_codes, self.sic_code(text));
        set(&mut record.current_erp, current_erp(text));

        let sentences = sentences(text);
        set(
            &mut record.leadership_changes,
            join_matching(&sentences, LEADERSHIP_KEYWORDS, Some(SENTENCE_CAP)),
        );
        set(
            &mut record.recent_news,
            join_matching(&sentences, NEWS_KEYWORDS, Some(SENTENCE_CAP)),
        );
        set(&mut record.strengths, join_matching(&sentences, &["strength"], None));
        set(&mut record.weaknesses, join_matching(&sentences, &["weakness"], None));
        set(
            &mut record.opportunities,
            join_matching(&sentences, &["opportunit"], None),
        );
        set(&mut record.threats, join_matching(&sentences, &["threat"], None));

        record.recent_sap_job_postings =
            sap_job_postings(anchors).unwrap_or_else(|| NO_SAP_POSTINGS.to_string());
    }

    fn phone_number(&self, text: &str) -> Option<String> {
        self.phone
            .find_iter(text)
            .map(|m| m.as_str().trim())
            .find(|candidate| candidate.chars().filter(char::is_ascii_digit).count() >= MIN_PHONE_DIGITS)
            .map(str::to_string)
    }

    fn address(&self, text: &str) -> Option<String> {
        let mut candidate = self.address.find(text)?.as_str();

        // A match spanning a sentence break started at an unrelated number.
        while let Some(idx) = candidate.find(". ") {
            match self.address.find(&candidate[idx + 2..]) {
                Some(inner) => candidate = inner.as_str(),
                None => break,
            }
        }

        Some(candidate.trim().to_string())
    }

    fn employee_count(&self, text: &str) -> Option<String> {
        let caps = self.employees.captures(text)?;
        Some(caps[1].replace(',', ""))
    }

    fn annual_revenue(&self, text: &str) -> Option<String> {
        let caps = self.revenue.captures(text)?;
        Some(money(&caps[1], caps.get(2).map(|m| m.as_str())))
    }

    fn recent_funding(&self, text: &str) -> Option<String> {
        let caps = self.funding.captures(text)?;
        Some(money(&caps[1], caps.get(2).map(|m| m.as_str())))
    }

    fn sic_code(&self, text: &str) -> Option<String> {
        let caps = self.sic.captures(text)?;
        Some(caps[1].to_string())
    }
}

fn compile(rule: &str, pattern: &str) -> Result<Regex, Error> {
    Regex::new(pattern).map_err(|e| Error::config(format!("Invalid {} pattern: {}", rule, e)))
}

fn set(field: &mut String, value: Option<String>) {
    *field = value.unwrap_or_else(|| NOT_AVAILABLE.to_string());
}

/// `$<amount> <unit>`. Grouping commas and trailing sentence punctuation
/// are dropped from the amount; the unit keeps its case.
fn money(amount: &str, unit: Option<&str>) -> String {
    let amount = amount.trim_end_matches(['.', ',']).replace(',', "");
    match unit {
        Some(unit) => format!("${} {}", amount, unit),
        None => format!("${}", amount),
    }
}

/// First ERP vendor from [`ERP_SYSTEMS`] mentioned in the text.
pub fn current_erp(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    ERP_SYSTEMS
        .iter()
        .find(|erp| lower.contains(&erp.to_lowercase()))
        .map(|erp| erp.to_string())
}

/// Text split on periods, trimmed, empties dropped.
pub fn sentences(text: &str) -> Vec<&str> {
    text.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Sentences containing any keyword (case-insensitive), joined with spaces.
fn join_matching(sentences: &[&str], keywords: &[&str], cap: Option<usize>) -> Option<String> {
    let matching = sentences.iter().filter(|sentence| {
        let lower = sentence.to_lowercase();
        keywords.iter().any(|k| lower.contains(k))
    });

    let picked: Vec<&str> = match cap {
        Some(cap) => matching.take(cap).copied().collect(),
        None => matching.copied().collect(),
    };

    if picked.is_empty() {
        None
    } else {
        Some(picked.join(" "))
    }
}

/// Anchor texts mentioning SAP or ERP, joined with ", ".
pub fn sap_job_postings(anchors: &[String]) -> Option<String> {
    let postings: Vec<&str> = anchors
        .iter()
        .map(|a| a.trim())
        .filter(|a| {
            let lower = a.to_lowercase();
            lower.contains("sap") || lower.contains("erp")
        })
        .collect();

    if postings.is_empty() {
        None
    } else {
        Some(postings.join(", "))
    }
}
