//! Command grammar for the `/cvemap` command family
//!
//! Two stages live here: a purely lexical recognizer that decides whether a
//! text line is an invocation of this command family at all, and the argument
//! parser that turns a recognized line into an [`OptionSet`]. The parser is
//! deliberately lenient: unknown flags and malformed integers degrade
//! silently, and only structural problems (oversized input, a value-taking
//! flag with no value) terminate the parse.

use crate::error::{Error, Result};
use regex::Regex;
use serde::Serialize;

/// Leading token that marks a line as a cvemap invocation.
pub const COMMAND_PREFIX: &str = "/cvemap";

/// Input ceiling: longer lines are rejected before any parsing happens.
pub const MAX_COMMAND_LEN: usize = 500;

/// Lexical gate for the command family
///
/// Holds the compiled pattern so repeated recognition is cheap. The pattern
/// accepts the prefix token followed by any mix of flags (`-` plus lowercase
/// letters) and opaque argument tokens; it never checks whether a flag is
/// actually known.
#[derive(Debug)]
pub struct CommandRecognizer {
    pattern: Regex,
}

impl CommandRecognizer {
    /// Create a new recognizer with the compiled command pattern
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"^/cvemap(?:\s+(?:-[a-z]+|\S+))*\s*$")
                .expect("command pattern is valid"),
        }
    }

    /// Return true iff the trimmed line is a well-formed invocation
    pub fn is_command(&self, line: &str) -> bool {
        self.pattern.is_match(line.trim())
    }
}

impl Default for CommandRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Check for the help flag, which short-circuits upstream of the parser.
pub fn contains_help_flag(line: &str) -> bool {
    line.split_whitespace()
        .any(|token| token == "-h" || token == "-help")
}

/// Static flag-reference document returned verbatim for `-h`/`-help`.
pub const FLAG_REFERENCE: &str = r#"## cvemap

Query the vulnerability database with CLI-style flags.

**Usage:** `/cvemap [flags]`

**Filter flags:**
| Flag | Description |
| ---- | ----------- |
| `-id string[]` | cve to list for given id |
| `-cwe, -cwe-id string[]` | cve to list for given cwe id |
| `-v, -vendor string[]` | cve to list for given vendor |
| `-p, -product string[]` | cve to list for given product |
| `-eproduct string[]` | cves to exclude based on product |
| `-s, -severity string[]` | cve to list for given severity |
| `-cs, -cvss-score string[]` | cve to list for given cvss score |
| `-c, -cpe string` | cve to list for given cpe |
| `-es, -epss-score string` | cve to list for given epss score |
| `-ep, -epss-percentile string[]` | cve to list for given epss percentile |
| `-age string` | cve to list published by given age in days |
| `-a, -assignee string[]` | cve to list for given publisher assignee |
| `-vs, -vstatus string` | cve to list for given vulnerability status |
| `-q, -search string[]` | free-text search terms |

**Boolean flags:**
| Flag | Description |
| ---- | ----------- |
| `-k, -kev` | display cves marked as exploitable vulnerabilities by cisa |
| `-t, -template` | display cves that have public nuclei templates |
| `-poc` | display cves that have public published poc |
| `-h1, -hackerone` | display cves reported on hackerone |
| `-re, -remote` | display remotely exploitable cves |

**Output flags:**
| Flag | Description |
| ---- | ----------- |
| `-f, -field string[]` | fields to display in the output |
| `-fe, -exclude string[]` | fields to exclude from the output |
| `-lsi, -list-id` | list only the cve ids |
| `-l, -limit int` | limit the number of results (default 50) |
| `-offset int` | offset the results to display |
| `-j, -json` | return output as raw json |

**Examples:**
```
/cvemap -severity critical -poc -limit 10
/cvemap -vendor microsoft -product windows_10 -kev
/cvemap -id CVE-2023-0001 -json
```
"#;

/// Canonical parsed representation of one command line
///
/// Either `error` is unset and every present field reflects a fully-parsed
/// flag, or `error` is set and the whole set is terminal: nothing else in it
/// may be acted upon.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct OptionSet {
    /// CVE identifiers (`-id`)
    pub ids: Vec<String>,
    /// CWE identifiers (`-cwe`/`-cwe-id`)
    pub cwes: Vec<String>,
    /// Vendor names (`-v`/`-vendor`)
    pub vendors: Vec<String>,
    /// Product names (`-p`/`-product`)
    pub products: Vec<String>,
    /// Products to exclude (`-eproduct`)
    pub exclude_products: Vec<String>,
    /// Severity levels (`-s`/`-severity`)
    pub severity: Vec<String>,
    /// CVSS score filters (`-cs`/`-cvss-score`)
    pub cvss_scores: Vec<String>,
    /// CPE filter (`-c`/`-cpe`)
    pub cpe: Option<String>,
    /// EPSS score filter (`-es`/`-epss-score`)
    pub epss_score: Option<String>,
    /// EPSS percentile filters (`-ep`/`-epss-percentile`)
    pub epss_percentiles: Vec<String>,
    /// Age-in-days filter (`-age`)
    pub age: Option<String>,
    /// Publisher assignees (`-a`/`-assignee`)
    pub assignees: Vec<String>,
    /// Vulnerability status filter (`-vs`/`-vstatus`)
    pub vuln_status: Option<String>,
    /// Free-text search terms (`-q`/`-search`)
    pub search_terms: Vec<String>,
    /// CISA KEV only (`-k`/`-kev`)
    pub kev: bool,
    /// Public template available (`-t`/`-template`)
    pub template: bool,
    /// Public PoC available (`-poc`)
    pub poc: bool,
    /// Reported on HackerOne (`-h1`/`-hackerone`)
    pub hackerone: bool,
    /// Remotely exploitable (`-re`/`-remote`)
    pub remote: bool,
    /// Fields to display (`-f`/`-field`)
    pub fields_to_display: Vec<String>,
    /// Fields to exclude (`-fe`/`-exclude`)
    pub exclude_fields: Vec<String>,
    /// List only identifiers (`-lsi`/`-list-id`)
    pub list_ids_only: bool,
    /// Result limit (`-l`/`-limit`); `None` until explicitly set
    pub limit: Option<u32>,
    /// Result offset (`-offset`); `None` until explicitly set
    pub offset: Option<u32>,
    /// Raw-JSON output (`-j`/`-json`)
    pub json: bool,
    /// Set exclusively when the input is invalid; terminal for the set
    pub error: Option<String>,
}

impl OptionSet {
    /// Parse one command line into an option set.
    ///
    /// Never panics: structural failures come back as a set with `error`
    /// populated and every other field untouched.
    pub fn parse(line: &str) -> Self {
        if line.len() > MAX_COMMAND_LEN {
            let err = Error::InputTooLong {
                length: line.len(),
                limit: MAX_COMMAND_LEN,
            };
            tracing::debug!("rejecting oversized command: {}", err);
            return Self {
                error: Some(err.to_string()),
                ..Self::default()
            };
        }

        let normalized = line.trim().to_lowercase();
        let tokens: Vec<&str> = normalized.split(' ').collect();

        match Self::walk_tokens(&tokens) {
            Ok(options) => options,
            Err(err) => {
                tracing::debug!("command parse failed: {}", err);
                Self {
                    error: Some(err.to_string()),
                    ..Self::default()
                }
            }
        }
    }

    /// Effective result limit, falling back to the internal default of 50.
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(50)
    }

    /// Effective result offset, falling back to the internal default of 0.
    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    /// Whether the set may be acted upon at all
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    fn walk_tokens(tokens: &[&str]) -> Result<Self> {
        let mut options = Self::default();
        let mut cursor = TokenCursor::new(tokens);

        // Drop a leading literal command-name token if present.
        if cursor.peek() == Some(COMMAND_PREFIX) {
            cursor.advance();
        }

        while let Some(token) = cursor.peek() {
            cursor.advance();
            match token {
                "-id" => options.ids = split_list(cursor.value(token)?),
                "-cwe" | "-cwe-id" => options.cwes = split_list(cursor.value(token)?),
                "-v" | "-vendor" => options.vendors = split_list(cursor.value(token)?),
                "-p" | "-product" => options.products = split_list(cursor.value(token)?),
                "-eproduct" => options.exclude_products = split_list(cursor.value(token)?),
                "-s" | "-severity" => options.severity = split_list(cursor.value(token)?),
                "-cs" | "-cvss-score" => options.cvss_scores = split_list(cursor.value(token)?),
                "-c" | "-cpe" => options.cpe = Some(cursor.value(token)?.to_string()),
                "-es" | "-epss-score" => options.epss_score = Some(cursor.value(token)?.to_string()),
                "-ep" | "-epss-percentile" => {
                    options.epss_percentiles = split_list(cursor.value(token)?)
                }
                "-age" => options.age = Some(cursor.value(token)?.to_string()),
                "-a" | "-assignee" => options.assignees = split_list(cursor.value(token)?),
                "-vs" | "-vstatus" => options.vuln_status = Some(cursor.value(token)?.to_string()),
                "-q" | "-search" => options.search_terms = split_list(cursor.value(token)?),
                "-k" | "-kev" => options.kev = true,
                "-t" | "-template" => options.template = true,
                "-poc" => options.poc = true,
                "-h1" | "-hackerone" => options.hackerone = true,
                "-re" | "-remote" => options.remote = true,
                "-f" | "-field" => options.fields_to_display = split_list(cursor.value(token)?),
                "-fe" | "-exclude" => options.exclude_fields = split_list(cursor.value(token)?),
                "-lsi" | "-list-id" => options.list_ids_only = true,
                "-l" | "-limit" => {
                    // Lenient-degrade: a non-numeric value leaves the default
                    // untouched rather than failing the parse.
                    if let Ok(n) = cursor.value(token)?.parse::<u32>() {
                        options.limit = Some(n);
                    }
                }
                "-offset" => {
                    if let Ok(n) = cursor.value(token)?.parse::<u32>() {
                        options.offset = Some(n);
                    }
                }
                "-j" | "-json" => options.json = true,
                // Unknown tokens pass through for forward compatibility.
                other => tracing::trace!("ignoring unrecognized token: {:?}", other),
            }
        }

        Ok(options)
    }
}

/// Comma-split a consumed value token, preserving order and duplicates.
fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(str::to_string).collect()
}

/// Explicit cursor over an immutable token sequence.
///
/// Asking for the value of a flag that sits in final position is a defined
/// failure, never an out-of-bounds access.
struct TokenCursor<'a> {
    tokens: &'a [&'a str],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    fn new(tokens: &'a [&'a str]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    /// Consume the next token as the value of `flag`.
    fn value(&mut self, flag: &str) -> Result<&'a str> {
        match self.peek() {
            Some(token) => {
                self.advance();
                Ok(token)
            }
            None => Err(Error::MissingFlagValue(flag.to_string())),
        }
    }
}
