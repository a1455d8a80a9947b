//! Run metrics, execution trace, and progress reporting.

use crate::scheduler::NodeStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use triad_core::LogicalTime;
use triad_plan::GraphNode;

/// Execution metrics for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    /// Category nodes handed to the executor
    pub nodes_dispatched: u64,
    /// Nodes completed with a recorded judgment
    pub nodes_completed: u64,
    /// Nodes failed
    pub nodes_failed: u64,
    /// Nodes resolved as skipped
    pub nodes_skipped: u64,
    /// Nodes cancelled by a failed ancestor
    pub nodes_cancelled: u64,
    /// Oracle attempts across all nodes
    pub oracle_attempts: u64,
    /// Attempts beyond the first, across all nodes
    pub retries: u64,
    /// Largest number of category tasks outstanding at once
    pub peak_in_flight: u64,
    /// Wall-clock duration of the run, in milliseconds
    pub elapsed_ms: u64,
}

impl Metrics {
    /// Create new metrics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node dispatch with `in_flight` tasks now outstanding
    pub fn record_dispatch(&mut self, in_flight: usize) {
        self.nodes_dispatched += 1;
        self.peak_in_flight = self.peak_in_flight.max(in_flight as u64);
    }

    /// Record a completion after `attempts` oracle calls
    pub fn record_completion(&mut self, attempts: u32) {
        self.nodes_completed += 1;
        self.record_attempts(attempts);
    }

    /// Record a failure after `attempts` oracle calls
    pub fn record_failure(&mut self, attempts: u32) {
        self.nodes_failed += 1;
        self.record_attempts(attempts);
    }

    /// Record a failed node resolved as skipped
    pub fn record_skip(&mut self, attempts: u32) {
        self.nodes_skipped += 1;
        self.record_attempts(attempts);
    }

    /// Record cancelled nodes
    pub fn record_cancelled(&mut self, count: usize) {
        self.nodes_cancelled += count as u64;
    }

    fn record_attempts(&mut self, attempts: u32) {
        self.oracle_attempts += u64::from(attempts);
        self.retries += u64::from(attempts.saturating_sub(1));
    }

    /// Get success rate over dispatched nodes (0.0 - 1.0)
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.nodes_dispatched == 0 {
            return 1.0;
        }
        self.nodes_completed as f64 / self.nodes_dispatched as f64
    }
}

/// One trace event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Scheduler time when the event happened
    pub time: LogicalTime,
    /// Offset from the start of the run, in milliseconds
    pub elapsed_ms: u64,
    /// Node the event is about
    pub node: GraphNode,
    /// Status the node moved to
    pub status: TraceStatus,
}

/// Node status as recorded in a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    /// Handed to a task
    Dispatched,
    /// Result recorded
    Completed,
    /// Failed, dependents proceed
    Skipped,
    /// Failed, descendants cancelled
    Failed,
    /// Cancelled by a failed ancestor
    Cancelled,
}

impl TraceStatus {
    /// Map a resolved scheduler status
    #[must_use]
    pub const fn from_status(status: NodeStatus) -> Option<Self> {
        match status {
            NodeStatus::Running => Some(Self::Dispatched),
            NodeStatus::Completed => Some(Self::Completed),
            NodeStatus::Skipped => Some(Self::Skipped),
            NodeStatus::Failed => Some(Self::Failed),
            NodeStatus::Cancelled => Some(Self::Cancelled),
            NodeStatus::Pending | NodeStatus::Ready => None,
        }
    }

    /// Whether this event ends the node's lifecycle
    #[must_use]
    pub const fn is_final(self) -> bool {
        !matches!(self, Self::Dispatched)
    }
}

/// Ordered record of node lifecycle events in one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    events: Vec<TraceEvent>,
}

impl ExecutionTrace {
    /// Create an empty trace
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn record(
        &mut self,
        time: LogicalTime,
        elapsed: Duration,
        node: GraphNode,
        status: TraceStatus,
    ) -> &TraceEvent {
        self.events.push(TraceEvent {
            time,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            node,
            status,
        });
        &self.events[self.events.len() - 1]
    }

    /// All events in order
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Events for one node
    pub fn for_node(&self, node: GraphNode) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter().filter(move |e| e.node == node)
    }

    /// Final status of a node, if it resolved
    #[must_use]
    pub fn final_status(&self, node: GraphNode) -> Option<TraceStatus> {
        self.for_node(node)
            .filter(|e| e.status.is_final())
            .map(|e| e.status)
            .last()
    }

    /// Number of events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events were recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Receives trace events as a run progresses
///
/// Called from the engine loop; implementations must not block.
pub trait ProgressSink: Send + Sync {
    /// A node changed status
    fn on_event(&self, event: &TraceEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use triad_core::SuperCategory;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.nodes_dispatched, 0);
        assert_eq!(metrics.success_rate(), 1.0);
    }

    #[test]
    fn test_metrics_record() {
        let mut metrics = Metrics::new();
        metrics.record_dispatch(3);
        metrics.record_dispatch(2);
        metrics.record_completion(1);
        metrics.record_failure(3);

        assert_eq!(metrics.nodes_dispatched, 2);
        assert_eq!(metrics.peak_in_flight, 3);
        assert_eq!(metrics.oracle_attempts, 4);
        assert_eq!(metrics.retries, 2);
        assert_eq!(metrics.success_rate(), 0.5);
    }

    #[test]
    fn test_trace_final_status() {
        let mut trace = ExecutionTrace::new();
        let node: GraphNode = SuperCategory::Style.stage1_key().into();
        trace.record(LogicalTime::zero(), Duration::ZERO, node, TraceStatus::Dispatched);
        assert_eq!(trace.final_status(node), None);

        let event = trace.record(
            LogicalTime::from_raw(1),
            Duration::from_millis(12),
            node,
            TraceStatus::Completed,
        );
        assert_eq!(event.elapsed_ms, 12);
        assert_eq!(trace.final_status(node), Some(TraceStatus::Completed));
        assert_eq!(trace.len(), 2);
    }

    #[test]
    fn test_trace_status_mapping() {
        assert_eq!(TraceStatus::from_status(NodeStatus::Pending), None);
        assert_eq!(
            TraceStatus::from_status(NodeStatus::Cancelled),
            Some(TraceStatus::Cancelled)
        );
    }

    #[test]
    fn test_trace_serializes() {
        let mut trace = ExecutionTrace::new();
        trace.record(
            LogicalTime::from_raw(4),
            Duration::from_millis(3),
            GraphNode::Aggregate,
            TraceStatus::Completed,
        );
        let value = serde_json::to_value(&trace).unwrap();
        assert_eq!(value["events"][0]["node"], "aggregate");
        assert_eq!(value["events"][0]["status"], "completed");
    }
}
