//! Ready-counter scheduler for one evaluation.
//!
//! Every node carries the number of dependencies that have not resolved yet.
//! A node becomes ready when its counter reaches zero:
//! - completed and skipped nodes resolve their dependents
//! - failed nodes cancel every unresolved transitive descendant
//! - logical time ticks once per resolution

use indexmap::IndexMap;
use std::collections::BTreeSet;
use triad_core::LogicalTime;
use triad_plan::{EvaluationGraph, GraphNode};

/// Scheduling decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// These nodes are ready to run
    Dispatch(Vec<GraphNode>),
    /// Nodes are running; wait for one to finish
    Wait,
    /// Nothing is running or ready
    Complete,
}

/// Lifecycle of a node within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    /// Waiting for dependencies
    Pending,
    /// All dependencies resolved
    Ready,
    /// Handed out by `take_ready`
    Running,
    /// Finished with a recorded result
    Completed,
    /// Finished without a result; dependents still proceed
    Skipped,
    /// Finished with an error; descendants cancelled
    Failed,
    /// Will never run because an ancestor failed
    Cancelled,
}

impl NodeStatus {
    /// Whether the node has reached a final state
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Skipped | Self::Failed | Self::Cancelled
        )
    }
}

/// Scheduler error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Node not in the graph
    NodeNotFound {
        /// Requested node
        node: GraphNode,
    },
    /// Transition not allowed from the node's current status
    InvalidTransition {
        /// Node being updated
        node: GraphNode,
        /// Status it was in
        from: NodeStatus,
        /// Attempted action
        action: &'static str,
    },
}

impl std::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NodeNotFound { node } => write!(f, "Node not found: {}", node),
            Self::InvalidTransition { node, from, action } => {
                write!(f, "Cannot {} node {} while {:?}", action, node, from)
            }
        }
    }
}

impl std::error::Error for ScheduleError {}

/// Scheduler for one evaluation request
///
/// Ready nodes are handed out in `GraphNode` order, so dispatch order is
/// deterministic for a given sequence of resolutions.
#[derive(Debug, Clone)]
pub struct Scheduler {
    /// Current status of every node
    status: IndexMap<GraphNode, NodeStatus>,
    /// Unresolved dependency count per node
    pending: IndexMap<GraphNode, usize>,
    /// Reverse edges: node -> nodes that depend on it
    dependents: IndexMap<GraphNode, Vec<GraphNode>>,
    /// Nodes ready to run
    ready: BTreeSet<GraphNode>,
    /// Current logical time
    time: LogicalTime,
}

impl Scheduler {
    /// Create a scheduler with every entry node ready
    #[must_use]
    pub fn new(graph: &EvaluationGraph) -> Self {
        let mut status = IndexMap::new();
        let mut pending = IndexMap::new();
        let mut dependents = IndexMap::new();
        let mut ready = BTreeSet::new();

        for node in graph.nodes() {
            let count = graph.dependencies(node).len();
            pending.insert(node, count);
            dependents.insert(node, graph.dependents(node));
            if count == 0 {
                status.insert(node, NodeStatus::Ready);
                ready.insert(node);
            } else {
                status.insert(node, NodeStatus::Pending);
            }
        }

        Self {
            status,
            pending,
            dependents,
            ready,
            time: LogicalTime::zero(),
        }
    }

    /// Get the next scheduling decision
    #[must_use]
    pub fn decide(&self) -> ScheduleDecision {
        if !self.ready.is_empty() {
            ScheduleDecision::Dispatch(self.ready.iter().copied().collect())
        } else if self.running_count() > 0 {
            ScheduleDecision::Wait
        } else {
            ScheduleDecision::Complete
        }
    }

    /// Hand out every ready node, marking it running
    pub fn take_ready(&mut self) -> Vec<GraphNode> {
        let nodes: Vec<GraphNode> = std::mem::take(&mut self.ready).into_iter().collect();
        for node in &nodes {
            self.status.insert(*node, NodeStatus::Running);
        }
        nodes
    }

    /// Mark a running node as completed
    ///
    /// Returns the dependents that became ready.
    ///
    /// # Errors
    ///
    /// Returns error if the node is unknown or not running
    pub fn mark_complete(&mut self, node: GraphNode) -> Result<Vec<GraphNode>, ScheduleError> {
        self.finish(node, NodeStatus::Completed, "complete")?;
        Ok(self.resolve_dependents(node))
    }

    /// Mark a running node as skipped: no result, but dependents proceed
    ///
    /// Returns the dependents that became ready.
    ///
    /// # Errors
    ///
    /// Returns error if the node is unknown or not running
    pub fn mark_skipped(&mut self, node: GraphNode) -> Result<Vec<GraphNode>, ScheduleError> {
        self.finish(node, NodeStatus::Skipped, "skip")?;
        Ok(self.resolve_dependents(node))
    }

    /// Mark a running node as failed and cancel its unresolved descendants
    ///
    /// Returns the cancelled nodes.
    ///
    /// # Errors
    ///
    /// Returns error if the node is unknown or not running
    pub fn mark_failed(&mut self, node: GraphNode) -> Result<Vec<GraphNode>, ScheduleError> {
        self.finish(node, NodeStatus::Failed, "fail")?;

        let mut cancelled = Vec::new();
        let mut stack = self.dependents_of(node);
        while let Some(current) = stack.pop() {
            let Some(status) = self.status.get(&current).copied() else {
                continue;
            };
            if status.is_resolved() || status == NodeStatus::Running {
                continue;
            }
            self.status.insert(current, NodeStatus::Cancelled);
            self.ready.remove(&current);
            cancelled.push(current);
            stack.extend(self.dependents_of(current));
        }
        cancelled.sort();
        Ok(cancelled)
    }

    fn finish(
        &mut self,
        node: GraphNode,
        to: NodeStatus,
        action: &'static str,
    ) -> Result<(), ScheduleError> {
        let from = self.status(node)?;
        if from != NodeStatus::Running {
            return Err(ScheduleError::InvalidTransition { node, from, action });
        }
        self.status.insert(node, to);
        self.tick();
        Ok(())
    }

    fn resolve_dependents(&mut self, node: GraphNode) -> Vec<GraphNode> {
        let mut newly_ready = Vec::new();
        for dependent in self.dependents_of(node) {
            let Some(count) = self.pending.get_mut(&dependent) else {
                continue;
            };
            *count = count.saturating_sub(1);
            if *count == 0 && self.status.get(&dependent) == Some(&NodeStatus::Pending) {
                self.status.insert(dependent, NodeStatus::Ready);
                self.ready.insert(dependent);
                newly_ready.push(dependent);
            }
        }
        newly_ready
    }

    fn dependents_of(&self, node: GraphNode) -> Vec<GraphNode> {
        self.dependents.get(&node).cloned().unwrap_or_default()
    }

    /// Increment logical time
    fn tick(&mut self) {
        self.time = self.time.saturating_add(1);
    }

    /// Current status of a node
    ///
    /// # Errors
    ///
    /// Returns error if the node is not in the graph
    pub fn status(&self, node: GraphNode) -> Result<NodeStatus, ScheduleError> {
        self.status
            .get(&node)
            .copied()
            .ok_or(ScheduleError::NodeNotFound { node })
    }

    /// Get current logical time
    #[must_use]
    pub const fn time(&self) -> LogicalTime {
        self.time
    }

    /// Get number of ready nodes
    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    /// Get number of running nodes
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.count(NodeStatus::Running)
    }

    /// Nodes currently in the given status, in graph order
    #[must_use]
    pub fn nodes_with(&self, status: NodeStatus) -> Vec<GraphNode> {
        self.status
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(n, _)| *n)
            .collect()
    }

    fn count(&self, status: NodeStatus) -> usize {
        self.status.values().filter(|s| **s == status).count()
    }

    /// Whether every node has resolved
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status.values().all(|s| s.is_resolved())
    }

    /// Check if any node failed
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.count(NodeStatus::Failed) > 0
    }
}
