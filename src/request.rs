//! Outbound request shaping for the lookup service
//!
//! [`RequestBody`] is a strict only-present-fields projection of an
//! [`OptionSet`](crate::command::OptionSet): internal defaults such as the
//! limit of 50 exist for bookkeeping on the option set, but must never leak
//! into the payload unless the user actually set the flag. Booleans are
//! emitted only when a flag turned them on.

use crate::command::OptionSet;
use serde::Serialize;

/// JSON body POSTed to the lookup service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestBody {
    /// CVE identifiers filter
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub id: Vec<String>,
    /// CWE identifiers filter
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cwe: Vec<String>,
    /// Vendor filter
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vendor: Vec<String>,
    /// Product filter
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub product: Vec<String>,
    /// Product exclusion filter
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub eproduct: Vec<String>,
    /// Severity filter
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub severity: Vec<String>,
    /// CVSS score filter
    #[serde(rename = "cvss-score", skip_serializing_if = "Vec::is_empty")]
    pub cvss_score: Vec<String>,
    /// CPE filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpe: Option<String>,
    /// EPSS score filter
    #[serde(rename = "epss-score", skip_serializing_if = "Option::is_none")]
    pub epss_score: Option<String>,
    /// EPSS percentile filter
    #[serde(rename = "epss-percentile", skip_serializing_if = "Vec::is_empty")]
    pub epss_percentile: Vec<String>,
    /// Age-in-days filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    /// Assignee filter
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignee: Vec<String>,
    /// Vulnerability status filter
    #[serde(rename = "vstatus", skip_serializing_if = "Option::is_none")]
    pub vuln_status: Option<String>,
    /// Free-text search terms
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub search: Vec<String>,
    /// CISA KEV only
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub kev: bool,
    /// Public nuclei template available
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub template: bool,
    /// Public PoC available
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub poc: bool,
    /// Reported on HackerOne
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub hackerone: bool,
    /// Remotely exploitable
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub remote: bool,
    /// Fields to display
    #[serde(rename = "field", skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    /// Fields to exclude
    #[serde(rename = "exclude", skip_serializing_if = "Vec::is_empty")]
    pub exclude_fields: Vec<String>,
    /// List only identifiers
    #[serde(rename = "list-id", skip_serializing_if = "std::ops::Not::not")]
    pub list_ids_only: bool,
    /// Result limit; present only when the flag was explicitly given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Result offset; present only when the flag was explicitly given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    /// Raw JSON output requested
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json: bool,
}

impl From<&OptionSet> for RequestBody {
    fn from(options: &OptionSet) -> Self {
        Self {
            id: options.ids.clone(),
            cwe: options.cwes.clone(),
            vendor: options.vendors.clone(),
            product: options.products.clone(),
            eproduct: options.exclude_products.clone(),
            severity: options.severity.clone(),
            cvss_score: options.cvss_scores.clone(),
            cpe: options.cpe.clone(),
            epss_score: options.epss_score.clone(),
            epss_percentile: options.epss_percentiles.clone(),
            age: options.age.clone(),
            assignee: options.assignees.clone(),
            vuln_status: options.vuln_status.clone(),
            search: options.search_terms.clone(),
            kev: options.kev,
            template: options.template,
            poc: options.poc,
            hackerone: options.hackerone,
            remote: options.remote,
            fields: options.fields_to_display.clone(),
            exclude_fields: options.exclude_fields.clone(),
            list_ids_only: options.list_ids_only,
            limit: options.limit,
            offset: options.offset,
            json: options.json,
        }
    }
}
