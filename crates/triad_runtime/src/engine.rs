//! Evaluation engine.
//!
//! Runs the evaluation graph for one triple as a tokio task graph. The loop
//! owns the state and the scheduler: it prepares each request at dispatch
//! time, so tasks own nothing but their request, and it is the only writer
//! of state. The aggregate node runs inline in the loop.

use crate::executor::{ExecutorError, StageExecutor, StageOutput};
use crate::monitor::{ExecutionTrace, Metrics, ProgressSink, TraceStatus};
use crate::policy::{PartialPolicy, RetryPolicy, SiblingFailurePolicy};
use crate::scheduler::{ScheduleDecision, ScheduleError, Scheduler};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};
use triad_core::{
    CategoryKey, EvaluationState, RunId, Stage, SuperCategory, TranslationTriple,
};
use triad_oracle::Oracle;
use triad_plan::{EvaluationGraph, GraphNode, GraphValidator};
use triad_score::{Aggregation, aggregate};

/// Default bound on in-flight oracle calls
const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum oracle calls in flight at once
    pub max_concurrency: usize,
    /// Retry policy for every oracle call
    pub retry: RetryPolicy,
    /// What to do when the aggregate node cannot run
    pub partial: PartialPolicy,
    /// What a Stage-2 failure does to its group
    pub sibling_failure: SiblingFailurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            retry: RetryPolicy::default(),
            partial: PartialPolicy::default(),
            sibling_failure: SiblingFailurePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Set the concurrency bound; zero is treated as one
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the partial-result policy
    #[must_use]
    pub fn with_partial(mut self, partial: PartialPolicy) -> Self {
        self.partial = partial;
        self
    }

    /// Set the sibling failure policy
    #[must_use]
    pub fn with_sibling_failure(mut self, policy: SiblingFailurePolicy) -> Self {
        self.sibling_failure = policy;
        self
    }
}

/// A node that failed during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFailure {
    /// Failed node
    pub key: CategoryKey,
    /// Its group
    pub group: SuperCategory,
    /// Error kind name
    pub kind: String,
    /// Error message
    pub message: String,
    /// Oracle attempts made
    pub attempts: u32,
    /// Nodes cancelled because of this failure
    pub cancelled: Vec<GraphNode>,
}

impl NodeFailure {
    fn new(err: &ExecutorError, cancelled: Vec<GraphNode>) -> Self {
        let key = err.key();
        Self {
            key,
            group: key.group(),
            kind: err.kind().to_string(),
            message: err.to_string(),
            attempts: err.attempts(),
            cancelled,
        }
    }

    /// Whether this failure left the group's verification absent
    #[must_use]
    pub fn blocks_verification(&self) -> bool {
        let verification = self.group.stage3_key();
        self.key == verification || self.cancelled.contains(&verification.into())
    }
}

/// Execution engine error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// The triple was rejected before any node ran
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Validation failure
        message: String,
    },

    /// The evaluation graph failed structural validation
    #[error("Invalid evaluation graph: {message}")]
    Graph {
        /// Collected violations
        message: String,
    },

    /// Internal ordering guarantee broken
    #[error("Scheduler invariant violated: {message}")]
    SchedulerInvariant {
        /// What went wrong
        message: String,
    },

    /// Some groups never verified and partial results are not accepted
    #[error("Evaluation incomplete: {}", describe_incomplete(.groups, .failures))]
    IncompleteEvaluation {
        /// Groups without a verification result
        groups: Vec<SuperCategory>,
        /// Every failure of the run
        failures: Vec<NodeFailure>,
    },
}

impl From<ScheduleError> for ExecutionError {
    fn from(err: ScheduleError) -> Self {
        Self::SchedulerInvariant {
            message: err.to_string(),
        }
    }
}

fn describe_incomplete(groups: &[SuperCategory], failures: &[NodeFailure]) -> String {
    groups
        .iter()
        .map(|group| {
            match failures
                .iter()
                .find(|f| f.group == *group && f.blocks_verification())
            {
                Some(f) => format!("{} ({} failed: {})", group, f.key, f.kind),
                None => format!("{} (not verified)", group),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result of one evaluation
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationOutcome {
    /// Run identifier
    pub run_id: RunId,
    /// Oracle that produced the judgments
    pub oracle: String,
    /// Every recorded judgment
    pub state: EvaluationState,
    /// Scores and diagnostics
    pub aggregation: Aggregation,
    /// Node failures, in resolution order
    pub failures: Vec<NodeFailure>,
    /// Node lifecycle events
    pub trace: ExecutionTrace,
    /// Run metrics
    pub metrics: Metrics,
    /// True if the aggregate was computed over an incomplete state
    pub partial: bool,
}

/// Evaluation engine
///
/// Holds the validated graph and a shared executor; each call to
/// [`Self::evaluate`] gets a fresh state and scheduler.
pub struct EvaluationEngine {
    graph: EvaluationGraph,
    executor: Arc<StageExecutor>,
    config: EngineConfig,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl EvaluationEngine {
    /// Create an engine with the standard catalog
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::Graph` if the graph fails validation
    pub fn new(oracle: Arc<dyn Oracle>, config: EngineConfig) -> Result<Self, ExecutionError> {
        Self::with_executor(StageExecutor::new(oracle), config)
    }

    /// Create an engine around a configured executor
    ///
    /// The executor's retry policy is replaced by the config's.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::Graph` if the graph fails validation
    pub fn with_executor(
        executor: StageExecutor,
        config: EngineConfig,
    ) -> Result<Self, ExecutionError> {
        let graph = EvaluationGraph::standard().map_err(|e| ExecutionError::Graph {
            message: e.to_string(),
        })?;
        GraphValidator::new()
            .validate(&graph)
            .map_err(|errors| ExecutionError::Graph {
                message: errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            })?;

        Ok(Self {
            graph,
            executor: Arc::new(executor.with_retry(config.retry)),
            config,
            progress: None,
        })
    }

    /// Report progress to a sink
    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Get the configuration
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the evaluation graph
    #[must_use]
    pub const fn graph(&self) -> &EvaluationGraph {
        &self.graph
    }

    /// Evaluate one triple
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a bad triple, `IncompleteEvaluation` when
    /// groups did not verify under `PartialPolicy::Fail`, and
    /// `SchedulerInvariant` if an ordering guarantee is broken
    pub async fn evaluate(
        &self,
        triple: TranslationTriple,
    ) -> Result<EvaluationOutcome, ExecutionError> {
        triple
            .validate()
            .map_err(|e| ExecutionError::InvalidInput {
                message: e.to_string(),
            })?;

        let run_id = RunId::new();
        let span = info_span!("evaluate", run_id = %run_id);
        self.run(run_id, triple).instrument(span).await
    }

    async fn run(
        &self,
        run_id: RunId,
        triple: TranslationTriple,
    ) -> Result<EvaluationOutcome, ExecutionError> {
        info!(
            oracle = self.executor.oracle_name(),
            max_concurrency = self.config.max_concurrency,
            "Evaluation started"
        );

        let mut run = Run {
            state: EvaluationState::new(triple),
            scheduler: Scheduler::new(&self.graph),
            trace: ExecutionTrace::new(),
            metrics: Metrics::new(),
            failures: Vec::new(),
            started: Instant::now(),
            sibling_failure: self.config.sibling_failure,
            progress: self.progress.clone(),
        };
        let permits = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks: JoinSet<(CategoryKey, Result<StageOutput, ExecutorError>)> =
            JoinSet::new();
        let mut aggregation = None;

        loop {
            match run.scheduler.decide() {
                ScheduleDecision::Dispatch(_) => {
                    for node in run.scheduler.take_ready() {
                        match node {
                            GraphNode::Aggregate => {
                                let result = aggregate(&run.state);
                                run.scheduler.mark_complete(node)?;
                                run.record(node, TraceStatus::Completed);
                                debug!(
                                    overall = result.scores.overall_error_probability,
                                    "Aggregate computed"
                                );
                                aggregation = Some(result);
                            }
                            GraphNode::Category(key) => {
                                let request =
                                    self.executor.prepare(key, &run.state).map_err(|e| {
                                        ExecutionError::SchedulerInvariant {
                                            message: e.to_string(),
                                        }
                                    })?;
                                let executor = Arc::clone(&self.executor);
                                let permits = Arc::clone(&permits);
                                tasks.spawn(
                                    async move {
                                        let result = match permits.acquire_owned().await {
                                            Ok(_permit) => executor.run(request).await,
                                            Err(_) => Err(ExecutorError::Cancelled { key }),
                                        };
                                        (key, result)
                                    }
                                    .in_current_span(),
                                );
                                run.metrics.record_dispatch(tasks.len());
                                run.record(node, TraceStatus::Dispatched);
                                debug!(key = %key, stage = %key.stage(), "Node dispatched");
                            }
                        }
                    }
                }
                ScheduleDecision::Wait => {
                    let joined = tasks.join_next().await.ok_or_else(|| {
                        ExecutionError::SchedulerInvariant {
                            message: "nodes running but no task outstanding".to_string(),
                        }
                    })?;
                    let (key, result) = joined.map_err(|e| ExecutionError::SchedulerInvariant {
                        message: format!("Task failed: {}", e),
                    })?;
                    run.resolve(key, result)?;
                }
                ScheduleDecision::Complete => break,
            }
        }

        if !run.scheduler.is_finished() {
            return Err(ExecutionError::SchedulerInvariant {
                message: "unresolved nodes with nothing running".to_string(),
            });
        }

        let (aggregation, partial) = match aggregation {
            Some(aggregation) => (aggregation, false),
            None => {
                let groups: Vec<SuperCategory> = SuperCategory::ALL
                    .iter()
                    .copied()
                    .filter(|group| run.state.stage3(*group).is_none())
                    .collect();
                match self.config.partial {
                    PartialPolicy::Fail => {
                        error!(
                            groups = %describe_incomplete(&groups, &run.failures),
                            "Evaluation incomplete"
                        );
                        return Err(ExecutionError::IncompleteEvaluation {
                            groups,
                            failures: run.failures,
                        });
                    }
                    PartialPolicy::Tolerate => {
                        warn!(
                            incomplete = groups.len(),
                            "Aggregating partial state"
                        );
                        (aggregate(&run.state), true)
                    }
                }
            }
        };

        run.metrics.elapsed_ms = u64::try_from(run.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            overall = aggregation.scores.overall_error_probability,
            failures = run.failures.len(),
            partial,
            elapsed_ms = run.metrics.elapsed_ms,
            "Evaluation finished"
        );

        Ok(EvaluationOutcome {
            run_id,
            oracle: self.executor.oracle_name().to_string(),
            state: run.state,
            aggregation,
            failures: run.failures,
            trace: run.trace,
            metrics: run.metrics,
            partial,
        })
    }
}

impl std::fmt::Debug for EvaluationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationEngine")
            .field("executor", &self.executor)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Mutable state of one run, owned by the engine loop
struct Run {
    state: EvaluationState,
    scheduler: Scheduler,
    trace: ExecutionTrace,
    metrics: Metrics,
    failures: Vec<NodeFailure>,
    started: Instant,
    sibling_failure: SiblingFailurePolicy,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl Run {
    fn record(&mut self, node: GraphNode, status: TraceStatus) {
        let event = self
            .trace
            .record(self.scheduler.time(), self.started.elapsed(), node, status);
        if let Some(sink) = &self.progress {
            sink.on_event(event);
        }
    }

    fn resolve(
        &mut self,
        key: CategoryKey,
        result: Result<StageOutput, ExecutorError>,
    ) -> Result<(), ExecutionError> {
        let node = GraphNode::from(key);
        let err = match result {
            Ok(output) => {
                self.state
                    .insert(key, output.judgment)
                    .map_err(|e| ExecutionError::SchedulerInvariant {
                        message: e.to_string(),
                    })?;
                self.scheduler.mark_complete(node)?;
                self.metrics.record_completion(output.attempts);
                self.record(node, TraceStatus::Completed);
                debug!(key = %key, attempts = output.attempts, "Node completed");
                return Ok(());
            }
            Err(err @ ExecutorError::MissingDependency { .. }) => {
                return Err(ExecutionError::SchedulerInvariant {
                    message: err.to_string(),
                });
            }
            Err(err) => err,
        };

        let skip = key.stage() == Stage::Critique
            && self.sibling_failure == SiblingFailurePolicy::Skip;
        let cancelled = if skip {
            self.scheduler.mark_skipped(node)?;
            self.metrics.record_skip(err.attempts());
            self.record(node, TraceStatus::Skipped);
            warn!(key = %key, kind = err.kind(), "Sibling failed, verifying without it: {}", err);
            Vec::new()
        } else {
            let cancelled = self.scheduler.mark_failed(node)?;
            self.metrics.record_failure(err.attempts());
            self.metrics.record_cancelled(cancelled.len());
            self.record(node, TraceStatus::Failed);
            for descendant in &cancelled {
                self.record(*descendant, TraceStatus::Cancelled);
            }
            error!(
                key = %key,
                group = %key.group(),
                kind = err.kind(),
                cancelled = cancelled.len(),
                "Node failed, group cancelled: {}",
                err
            );
            cancelled
        };
        self.failures.push(NodeFailure::new(&err, cancelled));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use triad_core::SubCategory;
    use crate::monitor::TraceEvent;
    use triad_oracle::{OracleError, ScriptedOracle, ScriptedReply, clean_judgment};

    fn triple() -> TranslationTriple {
        TranslationTriple::new(
            "Der Vertrag wurde gestern unterzeichnet.",
            "The contract was signed.",
            "The contract was signed yesterday.",
        )
    }

    fn config() -> EngineConfig {
        EngineConfig::default().with_retry(
            RetryPolicy::default()
                .with_call_timeout(Duration::from_secs(2))
                .with_backoff(Duration::ZERO),
        )
    }

    fn engine(oracle: &Arc<ScriptedOracle>, config: EngineConfig) -> EvaluationEngine {
        let oracle: Arc<dyn Oracle> = oracle.clone();
        EvaluationEngine::new(oracle, config).unwrap()
    }

    fn rejected() -> OracleError {
        OracleError::Api {
            status: 400,
            message: "rejected".to_string(),
        }
    }

    #[tokio::test]
    async fn test_clean_run_scores_zero() {
        let oracle = Arc::new(ScriptedOracle::clean());
        let outcome = engine(&oracle, config()).evaluate(triple()).await.unwrap();

        assert_eq!(outcome.state.len(), CategoryKey::COUNT);
        assert_eq!(outcome.aggregation.scores.overall_error_probability, 0.0);
        assert!(outcome.failures.is_empty());
        assert!(!outcome.partial);
        assert_eq!(outcome.metrics.nodes_dispatched, CategoryKey::COUNT as u64);
        assert_eq!(outcome.metrics.nodes_completed, CategoryKey::COUNT as u64);
        assert_eq!(outcome.metrics.nodes_dispatched, 21);
        assert_eq!(
            outcome.trace.final_status(GraphNode::Aggregate),
            Some(TraceStatus::Completed)
        );
        assert_eq!(outcome.oracle, "scripted");
    }

    #[tokio::test]
    async fn test_calls_respect_dependencies() {
        let oracle = Arc::new(ScriptedOracle::clean().with_uniform_delay(Duration::from_millis(5)));
        engine(&oracle, config()).evaluate(triple()).await.unwrap();

        let calls = oracle.calls();
        assert_eq!(calls.len(), 21);
        for call in &calls {
            for prerequisite in call.key.prerequisites() {
                for before in oracle.calls_for(prerequisite) {
                    assert!(
                        before.finished <= call.started,
                        "{} started before {} finished",
                        call.key,
                        prerequisite
                    );
                }
            }
            assert_eq!(call.context_keys, call.key.prerequisites());
        }
    }

    #[tokio::test]
    async fn test_stage1_runs_concurrently() {
        let oracle = Arc::new(ScriptedOracle::clean().with_uniform_delay(Duration::from_millis(40)));
        engine(&oracle, config()).evaluate(triple()).await.unwrap();

        assert!(oracle.peak_in_flight() >= 4);
        let stage1: Vec<_> = SuperCategory::ALL
            .iter()
            .flat_map(|g| oracle.calls_for(g.stage1_key()))
            .collect();
        let last_start = stage1.iter().map(|c| c.started).max().unwrap();
        let first_finish = stage1.iter().map(|c| c.finished).min().unwrap();
        assert!(last_start < first_finish);
    }

    #[tokio::test]
    async fn test_concurrency_bounded() {
        let oracle = Arc::new(ScriptedOracle::clean().with_uniform_delay(Duration::from_millis(5)));
        let outcome = engine(&oracle, config().with_max_concurrency(2))
            .evaluate(triple())
            .await
            .unwrap();

        assert!(oracle.peak_in_flight() <= 2);
        assert_eq!(outcome.state.len(), CategoryKey::COUNT);
    }

    #[tokio::test]
    async fn test_stage1_failure_is_group_local() {
        let oracle = Arc::new(ScriptedOracle::clean());
        oracle.push_reply(SuperCategory::Accuracy.stage1_key(), rejected());

        let outcome = engine(&oracle, config().with_partial(PartialPolicy::Tolerate))
            .evaluate(triple())
            .await
            .unwrap();

        assert!(outcome.partial);
        assert_eq!(outcome.failures.len(), 1);
        let failure = &outcome.failures[0];
        assert_eq!(failure.group, SuperCategory::Accuracy);
        assert_eq!(failure.kind, "oracle_failed");
        assert_eq!(failure.cancelled.len(), 6);
        assert!(failure.blocks_verification());

        for sub in SuperCategory::Accuracy.sub_categories() {
            assert_eq!(oracle.call_count(CategoryKey::Stage2(*sub)), 0);
        }
        assert!(outcome.state.stage3(SuperCategory::Fluency).is_some());
        assert!(outcome.state.stage3(SuperCategory::Accuracy).is_none());
        assert!(outcome.aggregation.categories[&SuperCategory::Accuracy].is_degenerate());
        assert_eq!(outcome.metrics.nodes_cancelled, 6);
    }

    #[tokio::test]
    async fn test_incomplete_evaluation_fails_by_default() {
        let oracle = Arc::new(ScriptedOracle::clean());
        oracle.push_reply(SuperCategory::Accuracy.stage1_key(), rejected());

        let err = engine(&oracle, config()).evaluate(triple()).await.unwrap_err();
        let ExecutionError::IncompleteEvaluation { groups, failures } = &err else {
            panic!("expected incomplete evaluation, got {err}");
        };
        assert_eq!(groups, &vec![SuperCategory::Accuracy]);
        assert_eq!(failures.len(), 1);
        assert!(err.to_string().contains("accuracyStage1 failed"));
    }

    #[tokio::test]
    async fn test_sibling_failure_skipped() {
        let oracle = Arc::new(ScriptedOracle::clean());
        let grammar = CategoryKey::Stage2(SubCategory::Grammar);
        oracle.push_reply(grammar, rejected());

        let outcome = engine(&oracle, config()).evaluate(triple()).await.unwrap();

        assert!(!outcome.partial);
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].cancelled.is_empty());
        assert!(!outcome.state.contains(grammar));
        assert_eq!(
            outcome.trace.final_status(grammar.into()),
            Some(TraceStatus::Skipped)
        );

        let verification = oracle.calls_for(SuperCategory::Fluency.stage3_key());
        assert_eq!(verification.len(), 1);
        assert!(!verification[0].context_keys.contains(&grammar));
        assert_eq!(verification[0].context_keys.len(), 6);
        assert_eq!(
            outcome.aggregation.categories[&SuperCategory::Fluency].contributing,
            5
        );
    }

    #[tokio::test]
    async fn test_sibling_failure_cancels_group() {
        let oracle = Arc::new(ScriptedOracle::clean());
        oracle.push_reply(CategoryKey::Stage2(SubCategory::Grammar), rejected());

        let config = config()
            .with_sibling_failure(SiblingFailurePolicy::CancelGroup)
            .with_partial(PartialPolicy::Tolerate);
        let outcome = engine(&oracle, config).evaluate(triple()).await.unwrap();

        assert!(outcome.partial);
        assert_eq!(oracle.call_count(SuperCategory::Fluency.stage3_key()), 0);
        assert_eq!(
            outcome.failures[0].cancelled,
            vec![
                GraphNode::from(SuperCategory::Fluency.stage3_key()),
                GraphNode::Aggregate
            ]
        );
        // other fluency siblings still ran
        assert!(outcome.state.contains(CategoryKey::Stage2(SubCategory::Spelling)));
    }

    #[tokio::test]
    async fn test_stage3_failure_leaves_verification_absent() {
        let oracle = Arc::new(ScriptedOracle::clean());
        oracle.push_reply(SuperCategory::Style.stage3_key(), rejected());

        let outcome = engine(&oracle, config().with_partial(PartialPolicy::Tolerate))
            .evaluate(triple())
            .await
            .unwrap();

        assert!(outcome.partial);
        assert_eq!(outcome.failures[0].cancelled, vec![GraphNode::Aggregate]);
        assert_eq!(
            outcome.aggregation.categories[&SuperCategory::Style].verification,
            triad_score::Verification::Unverified
        );
    }

    #[tokio::test]
    async fn test_timeout_retried_within_run() {
        let oracle = Arc::new(ScriptedOracle::clean());
        let key = SuperCategory::Terminology.stage1_key();
        oracle.push_reply(
            key,
            ScriptedReply::delayed(Duration::from_secs(10), clean_judgment(key).into()),
        );

        let config = config().with_retry(
            RetryPolicy::default()
                .with_call_timeout(Duration::from_millis(100))
                .with_backoff(Duration::ZERO),
        );
        let outcome = engine(&oracle, config).evaluate(triple()).await.unwrap();

        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.metrics.retries, 1);
        assert_eq!(oracle.call_count(key), 2);
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        let oracle = Arc::new(ScriptedOracle::clean());
        let err = engine(&oracle, config())
            .evaluate(TranslationTriple::new("source", "  ", "reference"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidInput { .. }));
        assert!(oracle.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fixture_replay_reproduces_scores() {
        let oracle = Arc::new(ScriptedOracle::clean());
        let first = engine(&oracle, config()).evaluate(triple()).await.unwrap();

        let fixture = Arc::new(ScriptedOracle::from_state(&first.state));
        let second = engine(&fixture, config()).evaluate(triple()).await.unwrap();

        assert_eq!(first.aggregation, second.aggregation);
        assert_eq!(second.oracle, "fixture");
        assert_ne!(first.run_id, second.run_id);
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<TraceEvent>>);

    impl ProgressSink for Collect {
        fn on_event(&self, event: &TraceEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[tokio::test]
    async fn test_progress_sink_sees_every_event() {
        let oracle = Arc::new(ScriptedOracle::clean());
        let sink = Arc::new(Collect::default());
        let outcome = engine(&oracle, config())
            .with_progress(sink.clone())
            .evaluate(triple())
            .await
            .unwrap();

        let seen = sink.0.lock().unwrap();
        assert_eq!(seen.as_slice(), outcome.trace.events());
        // dispatch and completion per category, one completion for the aggregate
        assert_eq!(seen.len(), 43);
    }
}
