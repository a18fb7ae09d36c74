//! Result stream assembly
//!
//! One invocation drives one ordered stream of text chunks: optional
//! natural-language preamble, heartbeat reassurance while the lookup is in
//! flight, then exactly one terminal chunk (report, no-results notice or
//! in-band error text). The heartbeat timer and the network read race inside
//! a single supervising `select!` loop, so the timer is dropped exactly once
//! on every exit path. At the transport level the stream always closes
//! cleanly; failures travel in-band as text.

use crate::client::VulnLookup;
use crate::command::{contains_help_flag, OptionSet, FLAG_REFERENCE};
use crate::config::RelayConfig;
use crate::error::Result;
use crate::render;
use crate::request::RequestBody;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Chunk sent when the feature-enable switch is off.
pub const DISABLED_NOTICE: &str =
    "The CVEMap feature is currently disabled. Ask your administrator to enable it.\n";

/// Chunk sent when the filtered upstream payload is empty.
pub const NO_RESULTS_NOTICE: &str = "No results found for your query.\n";

const CHUNK_BUFFER: usize = 32;

/// Final status of one streamed invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// Feature switch was off; disabled notice emitted
    Disabled,
    /// Help flag short-circuited to the flag reference
    Help,
    /// The command line failed to parse; error text emitted
    InvalidInput,
    /// Lookup succeeded but matched nothing
    Empty,
    /// Lookup succeeded; report emitted
    Results {
        /// Raw filtered payload as returned by the service
        raw: String,
    },
    /// Lookup or decode failed; in-band error text emitted
    Failed,
}

/// Ordered sequence of text chunks plus the final status.
///
/// Dropping the receiver closes the stream from the caller side; the
/// assembler notices and silences the heartbeat.
#[derive(Debug)]
pub struct StreamedResponse {
    /// Ordered chunk receiver
    pub chunks: mpsc::Receiver<String>,
    /// Resolves once the stream has closed
    pub outcome: JoinHandle<StreamOutcome>,
}

impl StreamedResponse {
    /// Drain the whole stream. Convenience for callers that do not need
    /// incremental delivery.
    pub async fn collect(mut self) -> (Vec<String>, StreamOutcome) {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.chunks.recv().await {
            chunks.push(chunk);
        }
        let outcome = self.outcome.await.unwrap_or(StreamOutcome::Failed);
        (chunks, outcome)
    }
}

/// Drives one command line from parse to rendered report.
pub struct ResultStreamAssembler {
    config: RelayConfig,
    lookup: Arc<dyn VulnLookup>,
}

impl std::fmt::Debug for ResultStreamAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStreamAssembler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ResultStreamAssembler {
    /// Create an assembler with injected configuration and lookup boundary.
    pub fn new(config: RelayConfig, lookup: Arc<dyn VulnLookup>) -> Self {
        Self { config, lookup }
    }

    /// Handle one command line, spawning the driving task.
    ///
    /// `preamble` carries the explanatory text of a natural-language rewrite
    /// step and, when present, becomes the first emitted chunk.
    pub fn handle(&self, line: &str, preamble: Option<String>) -> StreamedResponse {
        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        let config = self.config.clone();
        let lookup = Arc::clone(&self.lookup);
        let line = line.to_string();

        let outcome = tokio::spawn(async move { drive(config, lookup, line, preamble, tx).await });

        StreamedResponse {
            chunks: rx,
            outcome,
        }
    }
}

async fn drive(
    config: RelayConfig,
    lookup: Arc<dyn VulnLookup>,
    line: String,
    preamble: Option<String>,
    tx: mpsc::Sender<String>,
) -> StreamOutcome {
    if !config.enabled {
        emit(&tx, DISABLED_NOTICE).await;
        return StreamOutcome::Disabled;
    }

    // Help short-circuits upstream of the parser.
    if contains_help_flag(&line) {
        emit(&tx, FLAG_REFERENCE).await;
        return StreamOutcome::Help;
    }

    let options = OptionSet::parse(&line);
    if let Some(ref error) = options.error {
        emit(&tx, &format!("{}\n", error)).await;
        return StreamOutcome::InvalidInput;
    }

    if let Some(preamble) = preamble {
        emit(&tx, &preamble).await;
    }

    let body = RequestBody::from(&options);
    tracing::info!("dispatching vulnerability lookup");

    match await_with_heartbeat(&config, lookup.as_ref(), &body, &tx).await {
        Ok(raw) => finalize(&options, &raw, &tx).await,
        Err(err) => {
            tracing::error!("vulnerability lookup failed: {}", err);
            let message = if err.is_reportable() {
                format!("An error occurred while fetching vulnerability data: {}\n", err)
            } else {
                "An unknown error occurred while fetching vulnerability data.\n".to_string()
            };
            emit(&tx, &message).await;
            StreamOutcome::Failed
        }
    }
}

/// Race the lookup against the heartbeat interval.
///
/// The interval lives on this function's stack, so whichever way the race
/// resolves (response, error, caller-closed stream) the timer is dropped
/// exactly once and no further tick can fire.
async fn await_with_heartbeat(
    config: &RelayConfig,
    lookup: &dyn VulnLookup,
    body: &RequestBody,
    tx: &mpsc::Sender<String>,
) -> Result<String> {
    let period = Duration::from_secs(config.heartbeat.interval_secs);
    // First tick only after one full period has elapsed.
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    let search = lookup.search(body);
    tokio::pin!(search);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tracing::debug!("heartbeat tick");
                if !emit(tx, &config.heartbeat.message).await {
                    tracing::debug!("output stream closed by caller, silencing heartbeat");
                    return search.await;
                }
            }
            result = &mut search => return result,
        }
    }
}

async fn finalize(options: &OptionSet, raw: &str, tx: &mpsc::Sender<String>) -> StreamOutcome {
    let payload = render::filter_transport_frames(raw);
    if payload.is_empty() {
        emit(tx, NO_RESULTS_NOTICE).await;
        return StreamOutcome::Empty;
    }

    if options.json {
        let repaired = render::repair_concatenated_json(&payload);
        return match serde_json::from_str::<serde_json::Value>(&repaired) {
            Ok(value) => {
                let pretty =
                    serde_json::to_string_pretty(&value).unwrap_or_else(|_| payload.clone());
                emit(tx, &format!("```json\n{}\n```\n", pretty)).await;
                StreamOutcome::Results { raw: payload }
            }
            Err(err) => {
                tracing::error!("failed to decode lookup payload: {}", err);
                emit(tx, NO_RESULTS_NOTICE).await;
                StreamOutcome::Empty
            }
        };
    }

    let records = match render::parse_records(&payload) {
        Ok(records) => records,
        Err(err) => {
            // Decode failures are surfaced as an explanatory empty result,
            // never thrown to the caller.
            tracing::error!("failed to decode lookup payload: {}", err);
            emit(tx, NO_RESULTS_NOTICE).await;
            return StreamOutcome::Empty;
        }
    };

    let report = if options.list_ids_only {
        format!("{}\n", render::render_field_list(&records))
    } else {
        render::render_markdown(&records)
    };

    emit(tx, &report).await;
    StreamOutcome::Results { raw: payload }
}

/// Send one chunk; returns false once the caller has closed the stream.
async fn emit(tx: &mpsc::Sender<String>, chunk: &str) -> bool {
    tx.send(chunk.to_string()).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;

    enum FakeBehavior {
        Respond(String),
        Fail(String),
    }

    struct FakeLookup {
        delay: Duration,
        behavior: FakeBehavior,
    }

    impl FakeLookup {
        fn respond(payload: &str) -> Self {
            Self {
                delay: Duration::ZERO,
                behavior: FakeBehavior::Respond(payload.to_string()),
            }
        }

        fn respond_after(payload: &str, delay: Duration) -> Self {
            Self {
                delay,
                behavior: FakeBehavior::Respond(payload.to_string()),
            }
        }

        fn fail(message: &str) -> Self {
            Self {
                delay: Duration::ZERO,
                behavior: FakeBehavior::Fail(message.to_string()),
            }
        }
    }

    #[async_trait]
    impl VulnLookup for FakeLookup {
        async fn search(&self, _body: &RequestBody) -> Result<String> {
            tokio::time::sleep(self.delay).await;
            match &self.behavior {
                FakeBehavior::Respond(payload) => Ok(payload.clone()),
                FakeBehavior::Fail(message) => Err(Error::network(message.clone())),
            }
        }
    }

    fn assembler(config: RelayConfig, lookup: FakeLookup) -> ResultStreamAssembler {
        ResultStreamAssembler::new(config, Arc::new(lookup))
    }

    #[tokio::test]
    async fn test_disabled_feature_short_circuits() {
        let config = RelayConfig {
            enabled: false,
            ..RelayConfig::default()
        };
        let stream = assembler(config, FakeLookup::respond("{}")).handle("/cvemap -poc", None);
        let (chunks, outcome) = stream.collect().await;

        assert_eq!(chunks, vec![DISABLED_NOTICE.to_string()]);
        assert_eq!(outcome, StreamOutcome::Disabled);
    }

    #[tokio::test]
    async fn test_help_flag_yields_flag_reference() {
        let stream = assembler(RelayConfig::default(), FakeLookup::respond("{}"))
            .handle("/cvemap -help", None);
        let (chunks, outcome) = stream.collect().await;

        assert_eq!(chunks, vec![FLAG_REFERENCE.to_string()]);
        assert_eq!(outcome, StreamOutcome::Help);
    }

    #[tokio::test]
    async fn test_parse_error_emits_single_error_chunk() {
        let long = format!("/cvemap -q {}", "x".repeat(600));
        let stream =
            assembler(RelayConfig::default(), FakeLookup::respond("{}")).handle(&long, None);
        let (chunks, outcome) = stream.collect().await;

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("Command too long"));
        assert_eq!(outcome, StreamOutcome::InvalidInput);
    }

    #[tokio::test]
    async fn test_empty_payload_emits_exactly_one_no_results_chunk() {
        let stream = assembler(RelayConfig::default(), FakeLookup::respond(": ping\n\n"))
            .handle("/cvemap -severity critical", None);
        let (chunks, outcome) = stream.collect().await;

        assert_eq!(chunks, vec![NO_RESULTS_NOTICE.to_string()]);
        assert_eq!(outcome, StreamOutcome::Empty);
    }

    #[tokio::test]
    async fn test_markdown_report_for_results() {
        let payload = r#"{"cve_id":"CVE-1","severity":"high"}{"cve_id":"CVE-2","severity":"low"}"#;
        let stream = assembler(RelayConfig::default(), FakeLookup::respond(payload))
            .handle("/cvemap -severity high", None);
        let (chunks, outcome) = stream.collect().await;

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("## CVE-1"));
        assert!(chunks[0].contains("## CVE-2"));
        assert_eq!(
            outcome,
            StreamOutcome::Results {
                raw: payload.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_json_flag_returns_fenced_payload() {
        let payload = r#"{"cve_id":"CVE-1"}{"cve_id":"CVE-2"}"#;
        let stream = assembler(RelayConfig::default(), FakeLookup::respond(payload))
            .handle("/cvemap -json", None);
        let (chunks, outcome) = stream.collect().await;

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("```json\n["));
        assert!(matches!(outcome, StreamOutcome::Results { .. }));
    }

    #[tokio::test]
    async fn test_list_ids_only() {
        let payload = r#"{"cve_id":"CVE-1"}{"cve_id":"CVE-2"}"#;
        let stream = assembler(RelayConfig::default(), FakeLookup::respond(payload))
            .handle("/cvemap -lsi", None);
        let (chunks, _) = stream.collect().await;

        assert_eq!(chunks, vec!["CVE-1\nCVE-2\n".to_string()]);
    }

    #[tokio::test]
    async fn test_preamble_emitted_first() {
        let payload = r#"{"cve_id":"CVE-1"}"#;
        let stream = assembler(RelayConfig::default(), FakeLookup::respond(payload))
            .handle("/cvemap -id cve-1", Some("Looking up CVE-1 for you.\n".to_string()));
        let (chunks, _) = stream.collect().await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "Looking up CVE-1 for you.\n");
        assert!(chunks[1].contains("## CVE-1"));
    }

    #[tokio::test]
    async fn test_lookup_failure_becomes_in_band_chunk() {
        let stream = assembler(RelayConfig::default(), FakeLookup::fail("connection refused"))
            .handle("/cvemap -poc", None);
        let (chunks, outcome) = stream.collect().await;

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("An error occurred while fetching vulnerability data"));
        assert!(chunks[0].contains("connection refused"));
        assert_eq!(outcome, StreamOutcome::Failed);
    }

    #[tokio::test]
    async fn test_decode_failure_surfaces_as_no_results() {
        let stream = assembler(RelayConfig::default(), FakeLookup::respond("definitely not json"))
            .handle("/cvemap -poc", None);
        let (chunks, outcome) = stream.collect().await;

        assert_eq!(chunks, vec![NO_RESULTS_NOTICE.to_string()]);
        assert_eq!(outcome, StreamOutcome::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_cadence_and_cancellation() {
        // Response lands after 40s with a 15s heartbeat: ticks at 15s and
        // 30s, then the report, then nothing further.
        let payload = r#"{"cve_id":"CVE-1"}"#;
        let lookup = FakeLookup::respond_after(payload, Duration::from_secs(40));
        let stream =
            assembler(RelayConfig::default(), lookup).handle("/cvemap -severity critical", None);
        let (chunks, outcome) = stream.collect().await;

        let heartbeat = RelayConfig::default().heartbeat.message;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], heartbeat);
        assert_eq!(chunks[1], heartbeat);
        assert!(chunks[2].contains("## CVE-1"));
        assert!(matches!(outcome, StreamOutcome::Results { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_heartbeat_for_fast_response() {
        let payload = r#"{"cve_id":"CVE-1"}"#;
        let lookup = FakeLookup::respond_after(payload, Duration::from_secs(1));
        let stream = assembler(RelayConfig::default(), lookup).handle("/cvemap -poc", None);
        let (chunks, _) = stream.collect().await;

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("## CVE-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_canceled_on_error() {
        let lookup = FakeLookup {
            delay: Duration::from_secs(20),
            behavior: FakeBehavior::Fail("boom".to_string()),
        };
        let stream = assembler(RelayConfig::default(), lookup).handle("/cvemap -poc", None);
        let (chunks, outcome) = stream.collect().await;

        // One tick at 15s, then the error chunk, then the stream closes.
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], RelayConfig::default().heartbeat.message);
        assert!(chunks[1].contains("An error occurred"));
        assert_eq!(outcome, StreamOutcome::Failed);
    }
}
