//! Result data model for the lookup service
//!
//! [`CveRecord`] and its nested pieces are constructed only by deserializing
//! the external response, consumed once by the report renderer and then
//! discarded. Every field defaults so a sparse record still deserializes.

use serde::Deserialize;

/// One vulnerability entry in the lookup result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CveRecord {
    /// CVE identifier
    #[serde(default)]
    pub cve_id: String,
    /// Human-readable description
    #[serde(default)]
    pub cve_description: Option<String>,
    /// Severity label (critical/high/medium/low)
    #[serde(default)]
    pub severity: Option<String>,
    /// CVSS base score
    #[serde(default)]
    pub cvss_score: Option<f64>,
    /// Per-version CVSS metrics
    #[serde(default)]
    pub cvss_metrics: Option<CvssMetrics>,
    /// Associated weaknesses
    #[serde(default)]
    pub weaknesses: Vec<Weakness>,
    /// Vendor/product scope
    #[serde(default)]
    pub cpe: Option<Cpe>,
    /// Reference URLs
    #[serde(default)]
    pub reference: Vec<String>,
    /// Published proof-of-concept entries
    #[serde(default)]
    pub poc: Vec<PocEntry>,
    /// Days since publication
    #[serde(default)]
    pub age_in_days: Option<i64>,
    /// Vulnerability status (confirmed/unconfirmed/...)
    #[serde(default)]
    pub vuln_status: Option<String>,
    /// A public PoC exists
    #[serde(default)]
    pub is_poc: bool,
    /// Remotely exploitable
    #[serde(default)]
    pub is_remote: bool,
    /// Affects an open-source project
    #[serde(default)]
    pub is_oss: bool,
    /// A public nuclei template exists
    #[serde(default)]
    pub is_template: bool,
    /// Known exploited in the wild
    #[serde(default)]
    pub is_exploited: bool,
    /// Vendor advisory URL
    #[serde(default)]
    pub vendor_advisory: Option<String>,
    /// Open-source project details
    #[serde(default)]
    pub oss: Option<OssInfo>,
    /// Patch URLs
    #[serde(default)]
    pub patch_url: Vec<String>,
    /// Crowd-intel counters (report rank and count)
    #[serde(default)]
    pub hackerone: Option<CrowdIntel>,
    /// Scan-engine counters (hit count and example queries)
    #[serde(default)]
    pub shodan: Option<ScanStats>,
}

/// CVSS metric variants keyed by specification version.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CvssMetrics {
    /// CVSS v3.1 metrics
    #[serde(default)]
    pub cvss31: Option<Cvss31>,
}

/// CVSS v3.1 score and vector.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Cvss31 {
    /// Base score
    #[serde(default)]
    pub score: Option<f64>,
    /// Vector string, e.g. `CVSS:3.1/AV:N/AC:L/...`
    #[serde(default)]
    pub vector: Option<String>,
}

/// CWE id/name pair.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Weakness {
    /// CWE identifier, e.g. `CWE-79`
    #[serde(default)]
    pub cwe_id: String,
    /// Human-readable weakness name, preferred over the bare id when present
    #[serde(default)]
    pub cwe_name: Option<String>,
}

/// Vendor/product pair of the matched CPE.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Cpe {
    /// Vendor component
    #[serde(default)]
    pub vendor: Option<String>,
    /// Product component
    #[serde(default)]
    pub product: Option<String>,
}

/// One published proof-of-concept entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PocEntry {
    /// PoC URL
    #[serde(default)]
    pub url: String,
    /// Where the PoC was published
    #[serde(default)]
    pub source: Option<String>,
    /// ISO-8601 timestamp of publication
    #[serde(default)]
    pub added_at: Option<String>,
}

/// Open-source project pointer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OssInfo {
    /// Project URL
    #[serde(default)]
    pub url: Option<String>,
}

/// Crowd-sourced report counters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrowdIntel {
    /// Report rank
    #[serde(default)]
    pub rank: Option<i64>,
    /// Report count
    #[serde(default)]
    pub count: Option<i64>,
}

/// Internet scan-engine counters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanStats {
    /// Hit count
    #[serde(default)]
    pub count: Option<i64>,
    /// Example queries reproducing the hits
    #[serde(default)]
    pub query: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_record_deserializes() {
        let record: CveRecord =
            serde_json::from_str(r#"{"cve_id":"CVE-2024-0001"}"#).expect("sparse record");
        assert_eq!(record.cve_id, "CVE-2024-0001");
        assert!(record.weaknesses.is_empty());
        assert!(!record.is_poc);
        assert!(record.cpe.is_none());
    }

    #[test]
    fn test_full_record_deserializes() {
        let raw = r#"{
            "cve_id": "CVE-2023-1234",
            "cve_description": "Buffer overflow in example_product",
            "severity": "critical",
            "cvss_score": 9.8,
            "cvss_metrics": {"cvss31": {"score": 9.8, "vector": "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H"}},
            "weaknesses": [{"cwe_id": "CWE-787", "cwe_name": "Out-of-bounds Write"}],
            "cpe": {"vendor": "example", "product": "example_product"},
            "reference": ["https://example.test/advisory"],
            "poc": [{"url": "https://github.test/poc", "source": "github", "added_at": "2023-05-01T12:30:00Z"}],
            "age_in_days": 120,
            "vuln_status": "confirmed",
            "is_poc": true,
            "is_remote": true,
            "is_template": false,
            "is_exploited": true,
            "vendor_advisory": "https://example.test/vsa",
            "patch_url": ["https://example.test/patch"],
            "hackerone": {"rank": 12, "count": 44},
            "shodan": {"count": 907, "query": ["product:example_product"]}
        }"#;

        let record: CveRecord = serde_json::from_str(raw).expect("full record");
        assert_eq!(record.severity.as_deref(), Some("critical"));
        assert_eq!(record.weaknesses[0].cwe_name.as_deref(), Some("Out-of-bounds Write"));
        assert_eq!(
            record
                .cvss_metrics
                .as_ref()
                .and_then(|m| m.cvss31.as_ref())
                .and_then(|v| v.vector.as_deref()),
            Some("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H")
        );
        assert_eq!(record.shodan.expect("shodan").count, Some(907));
    }
}
