//! The structured extraction result for one company.

use serde::{Deserialize, Serialize};

/// Marker for a field nothing was found for.
pub const NOT_AVAILABLE: &str = "Not Available";

/// Marker for a fetched page that carried no SAP/ERP job links.
pub const NO_SAP_POSTINGS: &str = "No SAP job postings found.";

/// Flat record of business attributes.
///
/// Every field is always present. A field nobody found data for holds a
/// sentinel ([`NOT_AVAILABLE`], or [`NO_SAP_POSTINGS`] for job postings),
/// never an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub company_name: String,
    pub address: String,
    pub employee_count: String,
    pub annual_revenue: String,
    pub leadership_changes: String,
    pub recent_news: String,
    pub recent_funding: String,
    pub current_erp: String,
    pub recent_sap_job_postings: String,
    pub phone_number: String,
    pub sic_codes: String,
    pub company_official_website: String,
    pub strengths: String,
    pub weaknesses: String,
    pub opportunities: String,
    pub threats: String,
}

impl CompanyRecord {
    /// Field keys in template order.
    pub const FIELDS: [&'static str; 16] = [
        "company_name",
        "address",
        "employee_count",
        "annual_revenue",
        "leadership_changes",
        "recent_news",
        "recent_funding",
        "current_erp",
        "recent_sap_job_postings",
        "phone_number",
        "sic_codes",
        "company_official_website",
        "strengths",
        "weaknesses",
        "opportunities",
        "threats",
    ];

    /// A record with every field at its sentinel.
    pub fn unavailable() -> Self {
        let na = || NOT_AVAILABLE.to_string();
        Self {
            company_name: na(),
            address: na(),
            employee_count: na(),
            annual_revenue: na(),
            leadership_changes: na(),
            recent_news: na(),
            recent_funding: na(),
            current_erp: na(),
            recent_sap_job_postings: na(),
            phone_number: na(),
            sic_codes: na(),
            company_official_website: na(),
            strengths: na(),
            weaknesses: na(),
            opportunities: na(),
            threats: na(),
        }
    }

    /// Look up a field by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "company_name" => &self.company_name,
            "address" => &self.address,
            "employee_count" => &self.employee_count,
            "annual_revenue" => &self.annual_revenue,
            "leadership_changes" => &self.leadership_changes,
            "recent_news" => &self.recent_news,
            "recent_funding" => &self.recent_funding,
            "current_erp" => &self.current_erp,
            "recent_sap_job_postings" => &self.recent_sap_job_postings,
            "phone_number" => &self.phone_number,
            "sic_codes" => &self.sic_codes,
            "company_official_website" => &self.company_official_website,
            "strengths" => &self.strengths,
            "weaknesses" => &self.weaknesses,
            "opportunities" => &self.opportunities,
            "threats" => &self.threats,
            _ => return None,
        };
        Some(value)
    }

    /// `(key, value)` pairs in template order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        Self::FIELDS
            .iter()
            .filter_map(move |key| self.get(key).map(|value| (*key, value)))
    }

    /// Keys of descriptive fields still at a sentinel. The company name is
    /// never a gap: it is what the caller searched for.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.fields()
            .filter(|(key, value)| *key != "company_name" && is_sentinel(value))
            .map(|(key, _)| key)
            .collect()
    }

    /// True when no field carries discovered data.
    pub fn is_empty(&self) -> bool {
        self.fields().all(|(_, value)| is_sentinel(value))
    }
}

impl Default for CompanyRecord {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// Whether a value is one of the "nothing found" markers.
pub fn is_sentinel(value: &str) -> bool {
    value == NOT_AVAILABLE || value == NO_SAP_POSTINGS
}

/// Human-readable label for a field key.
pub fn field_label(key: &str) -> &'static str {
    match key {
        "company_name" => "Company Name",
        "address" => "Address",
        "employee_count" => "Employee Count",
        "annual_revenue" => "Annual Revenue",
        "leadership_changes" => "Leadership Changes",
        "recent_news" => "Recent News",
        "recent_funding" => "Recent Funding",
        "current_erp" => "ERP System",
        "recent_sap_job_postings" => "Recent SAP Job Postings",
        "phone_number" => "Phone",
        "sic_codes" => "SIC Codes",
        "company_official_website" => "Official Website",
        "strengths" => "Strengths",
        "weaknesses" => "Weaknesses",
        "opportunities" => "Opportunities",
        "threats" => "Threats",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_record_is_complete() {
        let record = CompanyRecord::unavailable();
        assert_eq!(record.fields().count(), CompanyRecord::FIELDS.len());
        assert!(record.fields().all(|(_, v)| v == NOT_AVAILABLE));
        assert!(record.is_empty());
    }

    #[test]
    fn test_every_field_key_resolves() {
        let record = CompanyRecord::unavailable();
        for key in CompanyRecord::FIELDS {
            assert!(record.get(key).is_some(), "missing key {key}");
            assert_ne!(field_label(key), "Unknown");
        }
        assert_eq!(record.get("ceo"), None);
    }

    #[test]
    fn test_missing_fields_excludes_company_name() {
        let mut record = CompanyRecord::unavailable();
        record.company_name = "Acme Corp".to_string();
        record.current_erp = "SAP".to_string();
        record.recent_sap_job_postings = NO_SAP_POSTINGS.to_string();

        let missing = record.missing_fields();
        assert!(!missing.contains(&"company_name"));
        assert!(!missing.contains(&"current_erp"));
        assert!(missing.contains(&"recent_sap_job_postings"));
        assert_eq!(missing.len(), 14);
        assert!(!record.is_empty());
    }

    #[test]
    fn test_record_serializes_every_key() {
        let json = serde_json::to_value(CompanyRecord::unavailable()).unwrap();
        for key in CompanyRecord::FIELDS {
            assert_eq!(json[key], NOT_AVAILABLE);
        }
    }
}
