use anyhow::Result;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::classifier::{self, classify, Classification};
use crate::column_mapper::map_columns;
use crate::csv_export;
use crate::filter::{filter, FilterCriterion};
use crate::gateway::{ensure_aligned, ValidationGateway};
use crate::models::{ColumnMapping, SourceRow, Summary, ValidationResult};
use crate::review::{review_rows, ReviewRow};

/// Receives the handle once, so the host can trigger parsing later.
pub type InitialiseHook = Box<dyn FnOnce(ParserHandle) + Send>;
/// Called after every successful parse.
pub type ParseCompleteHook = Arc<dyn Fn(&ParseComplete) + Send + Sync>;

/// Optional callbacks. A missing hook is simply not called.
#[derive(Default)]
pub struct ParserHooks {
    pub on_initialise: Option<InitialiseHook>,
    pub on_parse_complete: Option<ParseCompleteHook>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseState {
    Idle,
    Loading,
    Complete,
    Failed(String),
}

/// Emitted when a batch has been validated and classified.
#[derive(Debug, Clone)]
pub struct ParseComplete {
    pub batch_id: Uuid,
    pub data: Vec<ValidationResult>,
    pub summary: Summary,
}

impl ParseComplete {
    pub fn is_complete(&self) -> bool {
        classifier::is_complete(&self.data)
    }
}

struct Session {
    column_mapping: ColumnMapping,
    source_data: Vec<SourceRow>,
    parsed: Vec<ValidationResult>,
    filtered: Vec<ValidationResult>,
    criterion: FilterCriterion,
    summary: Summary,
    state: ParseState,
    /// Bumped by every parse; only the latest one may write results or `state`.
    generation: u64,
    in_flight: usize,
}

impl Session {
    /// Ends one in-flight parse. Returns false when a newer parse has superseded it.
    fn finish(&mut self, generation: u64) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        generation == self.generation
    }
}

/// Cloneable handle onto a parser session. Clones share the same state.
#[derive(Clone)]
pub struct ParserHandle {
    session: Arc<Mutex<Session>>,
    gateway: Arc<dyn ValidationGateway>,
    on_parse_complete: Option<ParseCompleteHook>,
}

/// Owns the upload inputs until [`BulkFlowParser::initialise`] hands out the handle.
pub struct BulkFlowParser {
    handle: ParserHandle,
    on_initialise: Option<InitialiseHook>,
}

impl BulkFlowParser {
    pub fn new(
        column_mapping: ColumnMapping,
        source_data: Vec<SourceRow>,
        gateway: Arc<dyn ValidationGateway>,
        hooks: ParserHooks,
    ) -> Self {
        let session = Session {
            column_mapping,
            source_data,
            parsed: Vec::new(),
            filtered: Vec::new(),
            criterion: FilterCriterion::All,
            summary: Summary::default(),
            state: ParseState::Idle,
            generation: 0,
            in_flight: 0,
        };
        BulkFlowParser {
            handle: ParserHandle {
                session: Arc::new(Mutex::new(session)),
                gateway,
                on_parse_complete: hooks.on_parse_complete,
            },
            on_initialise: hooks.on_initialise,
        }
    }

    /// Passes a handle to the `on_initialise` hook and returns another one to the caller.
    pub fn initialise(mut self) -> ParserHandle {
        if let Some(hook) = self.on_initialise.take() {
            hook(self.handle.clone());
        }
        self.handle
    }
}

impl ParserHandle {
    /// Maps, validates and classifies the uploaded rows, replacing any previous results.
    ///
    /// The filter resets to ALL. If the gateway call fails the session moves to
    /// [`ParseState::Failed`] and the error is returned; previous results are kept.
    ///
    /// Parses may overlap. The most recently started one owns the session: an older
    /// parse that finishes afterwards returns its outcome to its caller but leaves the
    /// results, `state` and the completion hook alone.
    pub async fn parse_flows(&self) -> Result<ParseComplete> {
        let batch_id = Uuid::new_v4();

        let (generation, records) = {
            let mut session = self.session.lock().await;
            if session.in_flight > 0 {
                warn!("Batch {} started while {} parse(s) are still loading", batch_id, session.in_flight);
            }
            session.generation += 1;
            session.in_flight += 1;
            session.state = ParseState::Loading;
            let records = if session.column_mapping.is_empty() || session.source_data.is_empty() {
                None
            } else {
                Some(map_columns(&session.column_mapping, &session.source_data))
            };
            (session.generation, records)
        };

        let results = match records {
            None => {
                info!("Batch {}: no column mapping or source data, nothing to validate.", batch_id);
                Vec::new()
            }
            Some(records) => {
                info!("Batch {}: validating {} records...", batch_id, records.len());
                let validated = self
                    .gateway
                    .validate(&records)
                    .await
                    .and_then(|results| ensure_aligned(&records, &results).map(|_| results));
                match validated {
                    Ok(results) => results,
                    Err(e) => {
                        error!("Error resolving flows for batch {}: {:#}", batch_id, e);
                        let mut session = self.session.lock().await;
                        if session.finish(generation) {
                            session.state = ParseState::Failed(format!("{:#}", e));
                        } else {
                            warn!("Batch {} was superseded, its failure does not change the session", batch_id);
                        }
                        return Err(e.context(format!("Failed to parse batch {}", batch_id)));
                    }
                }
            }
        };

        let Classification { annotated, summary } = classify(results);

        let (event, latest) = {
            let mut session = self.session.lock().await;
            let latest = session.finish(generation);
            if latest {
                session.parsed = annotated.clone();
                session.criterion = FilterCriterion::All;
                session.filtered = filter(&session.parsed, FilterCriterion::All);
                session.summary = summary;
                session.state = ParseState::Complete;
            }
            let event = ParseComplete {
                batch_id,
                data: annotated,
                summary,
            };
            (event, latest)
        };

        if !latest {
            warn!(
                "Batch {} was superseded by a newer parse, discarding its {} flows",
                batch_id,
                event.data.len()
            );
            return Ok(event);
        }

        info!(
            "Batch {} parsed: {} flows, complete: {}",
            batch_id,
            event.data.len(),
            event.is_complete()
        );
        if let Some(hook) = &self.on_parse_complete {
            hook(&event);
        }
        Ok(event)
    }

    /// Recomputes the visible rows for `criterion` and returns them.
    pub async fn apply_filter(&self, criterion: FilterCriterion) -> Vec<ValidationResult> {
        let mut session = self.session.lock().await;
        session.criterion = criterion;
        session.filtered = filter(&session.parsed, criterion);
        session.filtered.clone()
    }

    pub async fn criterion(&self) -> FilterCriterion {
        self.session.lock().await.criterion
    }

    pub async fn filtered(&self) -> Vec<ValidationResult> {
        self.session.lock().await.filtered.clone()
    }

    pub async fn parsed(&self) -> Vec<ValidationResult> {
        self.session.lock().await.parsed.clone()
    }

    pub async fn summary(&self) -> Summary {
        self.session.lock().await.summary
    }

    pub async fn state(&self) -> ParseState {
        self.session.lock().await.state.clone()
    }

    /// True while any parse, including a superseded one, is waiting on the gateway.
    pub async fn is_loading(&self) -> bool {
        self.session.lock().await.in_flight > 0
    }

    pub async fn is_complete(&self) -> bool {
        classifier::is_complete(&self.session.lock().await.parsed)
    }

    /// Grid model of the currently visible rows.
    pub async fn review(&self) -> Vec<ReviewRow> {
        review_rows(&self.session.lock().await.filtered)
    }

    /// CSV of the error rows within the current view.
    pub async fn export_parse_errors(&self) -> Result<String> {
        csv_export::export_errors(&self.session.lock().await.filtered)
    }

    pub async fn write_parse_errors(&self, dir: &Path) -> Result<PathBuf> {
        csv_export::write_error_file(dir, &self.session.lock().await.filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalRecord, EntityReference, Outcome, ParsedFlow, TargetField};
    use anyhow::anyhow;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Resolves every record with a `name`; records without one fail.
    struct EchoGateway {
        calls: AtomicUsize,
    }

    impl ValidationGateway for EchoGateway {
        fn validate<'a>(&'a self, records: &'a [CanonicalRecord]) -> BoxFuture<'a, Result<Vec<ValidationResult>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                Ok(records
                    .iter()
                    .map(|r| {
                        let name = r.get("name").filter(|n| !n.is_empty()).map(str::to_owned);
                        let outcome = if name.is_some() { Outcome::Success } else { Outcome::Failure };
                        ValidationResult {
                            outcome,
                            entity_reference: r.get("externalId").map(|_| EntityReference {
                                kind: "PHYSICAL_FLOW".into(),
                                id: 100,
                                name: None,
                                external_id: None,
                            }),
                            errors: if name.is_none() {
                                [("name".to_string(), "required".to_string())].into_iter().collect()
                            } else {
                                Default::default()
                            },
                            parsed_flow: ParsedFlow { name, ..Default::default() },
                            has_parse_errors: false,
                            original_command: Some(r.clone()),
                        }
                    })
                    .collect())
            })
        }
    }

    struct DownGateway;

    impl ValidationGateway for DownGateway {
        fn validate<'a>(&'a self, _records: &'a [CanonicalRecord]) -> BoxFuture<'a, Result<Vec<ValidationResult>>> {
            Box::pin(async { Err(anyhow!("connection refused")) })
        }
    }

    struct ShortGateway;

    impl ValidationGateway for ShortGateway {
        fn validate<'a>(&'a self, _records: &'a [CanonicalRecord]) -> BoxFuture<'a, Result<Vec<ValidationResult>>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    /// Holds each call until its gate is opened. Calls listed in `failing` time out.
    struct GatedGateway {
        calls: AtomicUsize,
        gates: Vec<Notify>,
        failing: Vec<usize>,
        echo: EchoGateway,
    }

    impl GatedGateway {
        fn new(gates: usize, failing: Vec<usize>) -> Arc<Self> {
            Arc::new(GatedGateway {
                calls: AtomicUsize::new(0),
                gates: (0..gates).map(|_| Notify::new()).collect(),
                failing,
                echo: EchoGateway { calls: AtomicUsize::new(0) },
            })
        }

        fn open(&self, call: usize) {
            self.gates[call].notify_one();
        }

        async fn wait_for_calls(&self, n: usize) {
            while self.calls.load(Ordering::SeqCst) < n {
                tokio::task::yield_now().await;
            }
        }
    }

    impl ValidationGateway for GatedGateway {
        fn validate<'a>(&'a self, records: &'a [CanonicalRecord]) -> BoxFuture<'a, Result<Vec<ValidationResult>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                self.gates[call].notified().await;
                if self.failing.contains(&call) {
                    return Err(anyhow!("timeout"));
                }
                self.echo.validate(records).await
            })
        }
    }

    fn mapping() -> ColumnMapping {
        [
            ("Flow".to_string(), TargetField::new("name")),
            ("Ext".to_string(), TargetField::new("externalId")),
        ]
        .into_iter()
        .collect()
    }

    fn rows() -> Vec<SourceRow> {
        vec![
            [("Flow".to_string(), "a".to_string())].into_iter().collect(),
            [("Flow".to_string(), "b".to_string()), ("Ext".to_string(), "X1".to_string())].into_iter().collect(),
            [("Flow".to_string(), "".to_string())].into_iter().collect(),
        ]
    }

    fn echo() -> Arc<EchoGateway> {
        Arc::new(EchoGateway { calls: AtomicUsize::new(0) })
    }

    #[tokio::test]
    async fn parse_classifies_and_notifies() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_hook = seen.clone();
        let hooks = ParserHooks {
            on_parse_complete: Some(Arc::new(move |event: &ParseComplete| {
                seen_in_hook.fetch_add(event.data.len(), Ordering::SeqCst);
            })),
            ..Default::default()
        };
        let handle = BulkFlowParser::new(mapping(), rows(), echo(), hooks).initialise();
        assert_eq!(handle.state().await, ParseState::Idle);

        let event = handle.parse_flows().await.unwrap();
        assert_eq!(event.data.len(), 3);
        assert!(!event.is_complete());
        assert_eq!(event.summary.new_flows, 1);
        assert_eq!(event.summary.existing_flows, 1);
        assert_eq!(event.summary.failed_flows, 1);
        assert!(event.data.iter().all(|r| r.has_parse_errors));
        assert_eq!(seen.load(Ordering::SeqCst), 3);

        assert_eq!(handle.state().await, ParseState::Complete);
        assert!(!handle.is_loading().await);
        assert_eq!(handle.filtered().await.len(), 3);
        assert_eq!(handle.summary().await, event.summary);
    }

    #[tokio::test]
    async fn filter_and_export_follow_the_view() {
        let handle = BulkFlowParser::new(mapping(), rows(), echo(), ParserHooks::default()).initialise();
        handle.parse_flows().await.unwrap();

        let new_rows = handle.apply_filter(FilterCriterion::New).await;
        assert_eq!(new_rows.len(), 1);
        assert_eq!(handle.criterion().await, FilterCriterion::New);
        // Export narrows to errors, and the NEW view has none
        assert_eq!(handle.export_parse_errors().await.unwrap().lines().count(), 1);

        handle.apply_filter(FilterCriterion::All).await;
        let csv = handle.export_parse_errors().await.unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains("required"));
        assert_eq!(handle.review().await.len(), 3);
        assert_eq!(handle.parsed().await.len(), 3);
    }

    #[tokio::test]
    async fn gateway_failure_is_reported() {
        let handle = BulkFlowParser::new(mapping(), rows(), Arc::new(DownGateway), ParserHooks::default()).initialise();

        let err = handle.parse_flows().await.unwrap_err();
        assert!(format!("{:#}", err).contains("connection refused"));
        match handle.state().await {
            ParseState::Failed(message) => assert!(message.contains("connection refused")),
            other => panic!("unexpected state {:?}", other),
        }
        assert!(!handle.is_loading().await);
        assert!(handle.parsed().await.is_empty());
    }

    #[tokio::test]
    async fn misaligned_results_fail_the_parse() {
        let handle = BulkFlowParser::new(mapping(), rows(), Arc::new(ShortGateway), ParserHooks::default()).initialise();
        assert!(handle.parse_flows().await.is_err());
        assert!(matches!(handle.state().await, ParseState::Failed(_)));
    }

    #[tokio::test]
    async fn empty_inputs_skip_the_gateway() {
        let gateway = echo();
        let handle = BulkFlowParser::new(ColumnMapping::new(), rows(), gateway.clone(), ParserHooks::default()).initialise();

        let event = handle.parse_flows().await.unwrap();
        assert!(event.data.is_empty());
        assert!(event.is_complete());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn loading_while_the_gateway_is_outstanding() {
        let gateway = GatedGateway::new(1, vec![]);
        let handle = BulkFlowParser::new(mapping(), rows(), gateway.clone(), ParserHooks::default()).initialise();

        let pending = tokio::spawn({
            let handle = handle.clone();
            async move { handle.parse_flows().await }
        });
        gateway.wait_for_calls(1).await;
        assert!(handle.is_loading().await);
        assert_eq!(handle.state().await, ParseState::Loading);

        gateway.open(0);
        let event = pending.await.unwrap().unwrap();
        assert_eq!(event.data.len(), 3);
        assert!(!handle.is_loading().await);
        assert_eq!(handle.state().await, ParseState::Complete);
    }

    #[tokio::test]
    async fn superseded_success_leaves_the_session_alone() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_hook = seen.clone();
        let hooks = ParserHooks {
            on_parse_complete: Some(Arc::new(move |_: &ParseComplete| {
                seen_in_hook.fetch_add(1, Ordering::SeqCst);
            })),
            ..Default::default()
        };
        let gateway = GatedGateway::new(2, vec![1]);
        let handle = BulkFlowParser::new(mapping(), rows(), gateway.clone(), hooks).initialise();

        let first = tokio::spawn({
            let handle = handle.clone();
            async move { handle.parse_flows().await }
        });
        gateway.wait_for_calls(1).await;
        let second = tokio::spawn({
            let handle = handle.clone();
            async move { handle.parse_flows().await }
        });
        gateway.wait_for_calls(2).await;

        // The older batch finishes first; the newer one is still waiting
        gateway.open(0);
        let stale = first.await.unwrap().unwrap();
        assert_eq!(stale.data.len(), 3);
        assert!(handle.is_loading().await);
        assert_eq!(handle.state().await, ParseState::Loading);
        assert!(handle.parsed().await.is_empty());
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        // The newer batch fails, and nothing from the older one leaks in
        gateway.open(1);
        assert!(second.await.unwrap().is_err());
        assert!(!handle.is_loading().await);
        assert_eq!(handle.state().await, ParseState::Failed("timeout".to_string()));
        assert!(handle.parsed().await.is_empty());
        assert_eq!(handle.summary().await, Summary::default());
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn late_failure_of_an_older_parse_is_ignored() {
        let gateway = GatedGateway::new(2, vec![0]);
        let handle = BulkFlowParser::new(mapping(), rows(), gateway.clone(), ParserHooks::default()).initialise();

        let first = tokio::spawn({
            let handle = handle.clone();
            async move { handle.parse_flows().await }
        });
        gateway.wait_for_calls(1).await;
        let second = tokio::spawn({
            let handle = handle.clone();
            async move { handle.parse_flows().await }
        });
        gateway.wait_for_calls(2).await;

        gateway.open(1);
        second.await.unwrap().unwrap();
        assert_eq!(handle.state().await, ParseState::Complete);
        assert!(handle.is_loading().await);

        gateway.open(0);
        assert!(first.await.unwrap().is_err());
        assert!(!handle.is_loading().await);
        assert_eq!(handle.state().await, ParseState::Complete);
        assert_eq!(handle.parsed().await.len(), 3);
    }

    #[test]
    fn initialise_hands_the_handle_to_the_host() {
        let captured: Arc<std::sync::Mutex<Option<ParserHandle>>> = Arc::default();
        let slot = captured.clone();
        let hooks = ParserHooks {
            on_initialise: Some(Box::new(move |handle: ParserHandle| {
                *slot.lock().unwrap() = Some(handle);
            })),
            ..Default::default()
        };
        let own = BulkFlowParser::new(mapping(), rows(), echo(), hooks).initialise();

        let host_handle = captured.lock().unwrap().take().expect("hook was called");
        let event = tokio_test::block_on(host_handle.parse_flows()).unwrap();
        assert_eq!(event.data.len(), 3);
        assert_eq!(tokio_test::block_on(own.parsed()).len(), 3);
    }
}
