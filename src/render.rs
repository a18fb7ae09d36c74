//! Report rendering for lookup results
//!
//! The lookup service answers with newline-delimited fragments: transport
//! framing lines to drop, and back-to-back JSON objects with no separators.
//! This module isolates the payload repair behind one function, deserializes
//! the repaired array and renders it either as a full markdown report or as a
//! condensed single-field list.

use crate::error::{Error, Result};
use crate::types::CveRecord;

/// Reserved prefix marking a transport-framing line in the upstream body.
const FRAME_PREFIX: char = ':';

/// Drop blank lines and transport-framing lines, concatenating the remaining
/// data fragments into one payload.
pub fn filter_transport_frames(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(FRAME_PREFIX))
        .collect()
}

/// Repair a concatenation of back-to-back JSON objects into an array literal.
///
/// The upstream body carries `{..}{..}` with no separators; this inserts the
/// array brackets and splits adjacent objects at the `}{` boundary. The
/// substitution is knowingly fragile (a field value containing `}{` would
/// break it) and is kept for wire compatibility; replacing the framing format
/// only requires touching this function.
pub fn repair_concatenated_json(payload: &str) -> String {
    format!("[{}]", payload.replace("}{", "},{"))
}

/// Parse the filtered upstream payload into records.
pub fn parse_records(payload: &str) -> Result<Vec<CveRecord>> {
    let repaired = repair_concatenated_json(payload);
    serde_json::from_str(&repaired).map_err(|e| Error::UpstreamDecode(e.to_string()))
}

/// Render a condensed newline-joined list of one extracted field.
///
/// Only `cve_id` extraction is meaningful today; records without the field
/// are skipped.
pub fn render_field_list(records: &[CveRecord]) -> String {
    records
        .iter()
        .filter(|record| !record.cve_id.is_empty())
        .map(|record| record.cve_id.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the full markdown report, one block per record in fixed field
/// order, separated by a blank line. Absent or falsy optional values produce
/// no line at all; the CPE vendor/product sides are the only fields with an
/// explicit "Unknown" placeholder.
pub fn render_markdown(records: &[CveRecord]) -> String {
    let mut output = String::new();

    for record in records {
        render_record(&mut output, record);
        output.push('\n');
    }

    output
}

fn render_record(output: &mut String, record: &CveRecord) {
    output.push_str(&format!("## {}\n", record.cve_id));

    if let Some(ref description) = record.cve_description {
        output.push_str(&format!("{}\n", description));
    }

    render_severity_line(output, record);
    render_weaknesses(output, record);
    render_cpe_line(output, record);
    render_references(output, record);
    render_poc_table(output, record);

    if let Some(age) = record.age_in_days.filter(|age| *age != 0) {
        output.push_str(&format!("**Age in Days:** {}\n", age));
    }
    if let Some(ref status) = record.vuln_status {
        if !status.is_empty() {
            output.push_str(&format!("**Vulnerability Status:** {}\n", status));
        }
    }
    if record.is_poc {
        output.push_str("**Proof of Concept Available:** Yes\n");
    }
    if record.is_remote {
        output.push_str("**Remotely Exploitable:** Yes\n");
    }
    if record.is_oss {
        output.push_str("**Open Source Software:** Yes\n");
    }
    if let Some(ref advisory) = record.vendor_advisory {
        if !advisory.is_empty() {
            output.push_str(&format!("**Vendor Advisory:** {}\n", advisory));
        }
    }

    // Always-present booleans: explicit yes/no lines.
    output.push_str(&format!(
        "**Template Available:** {}\n",
        yes_no(record.is_template)
    ));
    output.push_str(&format!(
        "**Exploited in the Wild:** {}\n",
        yes_no(record.is_exploited)
    ));

    render_crowd_intel(output, record);
    render_scan_stats(output, record);

    if let Some(url) = record
        .oss
        .as_ref()
        .and_then(|oss| oss.url.as_deref())
        .filter(|url| !url.is_empty())
    {
        output.push_str(&format!("**OSS Project:** {}\n", url));
    }

    if !record.patch_url.is_empty() {
        output.push_str("### Patch URLs\n");
        for url in &record.patch_url {
            output.push_str(&format!("- {}\n", url));
        }
    }
}

fn render_severity_line(output: &mut String, record: &CveRecord) {
    let severity = record.severity.as_deref().unwrap_or("unknown");
    let vector = record
        .cvss_metrics
        .as_ref()
        .and_then(|metrics| metrics.cvss31.as_ref())
        .and_then(|cvss| cvss.vector.as_deref());

    match (record.cvss_score, vector) {
        (Some(score), Some(vector)) => output.push_str(&format!(
            "**Severity:** {} | **CVSS Score:** {} ({})\n",
            severity, score, vector
        )),
        (Some(score), None) => output.push_str(&format!(
            "**Severity:** {} | **CVSS Score:** {}\n",
            severity, score
        )),
        (None, _) => output.push_str(&format!("**Severity:** {}\n", severity)),
    }
}

fn render_weaknesses(output: &mut String, record: &CveRecord) {
    if record.weaknesses.is_empty() {
        return;
    }

    output.push_str("### Weaknesses\n");
    for weakness in &record.weaknesses {
        // Prefer the human-readable name over the bare id.
        let label = weakness
            .cwe_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&weakness.cwe_id);
        output.push_str(&format!("- {}\n", label));
    }
}

fn render_cpe_line(output: &mut String, record: &CveRecord) {
    let Some(ref cpe) = record.cpe else {
        return;
    };

    let vendor = cpe
        .vendor
        .as_deref()
        .filter(|vendor| !vendor.is_empty())
        .unwrap_or("Unknown vendor");
    let product = cpe
        .product
        .as_deref()
        .filter(|product| !product.is_empty())
        .unwrap_or("Unknown product");
    output.push_str(&format!("**CPE:** {}:{}\n", vendor, product));
}

fn render_references(output: &mut String, record: &CveRecord) {
    if record.reference.is_empty() {
        return;
    }

    output.push_str("### References\n");
    for url in &record.reference {
        output.push_str(&format!("- [{}]({})\n", url, url));
    }
}

fn render_poc_table(output: &mut String, record: &CveRecord) {
    if record.poc.is_empty() {
        return;
    }

    output.push_str("### Proof of Concept\n");
    output.push_str("| URL | Source | Added At |\n");
    output.push_str("| --- | ------ | -------- |\n");
    for entry in &record.poc {
        let source = entry.source.as_deref().unwrap_or("");
        let added = entry
            .added_at
            .as_deref()
            .map(truncate_to_date)
            .unwrap_or("");
        output.push_str(&format!("| {} | {} | {} |\n", entry.url, source, added));
    }
}

fn render_crowd_intel(output: &mut String, record: &CveRecord) {
    let Some(ref intel) = record.hackerone else {
        return;
    };

    if intel.rank.is_none() && intel.count.is_none() {
        return;
    }

    let rank = intel.rank.unwrap_or(0);
    let count = intel.count.unwrap_or(0);
    output.push_str(&format!(
        "**HackerOne:** Rank {} | Reports {}\n",
        rank, count
    ));
}

fn render_scan_stats(output: &mut String, record: &CveRecord) {
    let Some(ref stats) = record.shodan else {
        return;
    };
    let Some(count) = stats.count.filter(|count| *count != 0) else {
        return;
    };

    output.push_str(&format!("**Shodan Results:** {}\n", count));
    for query in &stats.query {
        output.push_str(&format!("  - `{}`\n", query));
    }
}

/// Truncate an ISO-8601 timestamp to its date component.
fn truncate_to_date(timestamp: &str) -> &str {
    timestamp.split('T').next().unwrap_or(timestamp)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}
