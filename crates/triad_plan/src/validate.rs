//! Structural validator for evaluation graphs.

use crate::builder::EvaluationGraph;
use crate::dag::{Dag, GraphNode};
use indexmap::IndexSet;
use triad_core::{CategoryKey, SuperCategory};

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Cycle detected in DAG
    Cycle {
        /// Nodes on the detected cycle path
        nodes: Vec<GraphNode>,
    },
    /// Nodes unreachable from any entry node, or with no edges at all
    Disconnected {
        /// Offending nodes
        nodes: Vec<GraphNode>,
    },
    /// A required node is absent
    MissingNode {
        /// Node that should exist
        node: GraphNode,
    },
    /// A node's incoming edges differ from its contract
    WrongDependencies {
        /// Node whose dependencies are wrong
        node: GraphNode,
        /// Dependencies required by the contract
        expected: Vec<GraphNode>,
        /// Dependencies found in the graph
        actual: Vec<GraphNode>,
    },
}

fn names(nodes: &[GraphNode]) -> String {
    nodes
        .iter()
        .map(|n| n.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cycle { nodes } => write!(f, "Cycle detected involving nodes: [{}]", names(nodes)),
            Self::Disconnected { nodes } => write!(f, "Disconnected nodes: [{}]", names(nodes)),
            Self::MissingNode { node } => write!(f, "Missing node {}", node),
            Self::WrongDependencies {
                node,
                expected,
                actual,
            } => write!(
                f,
                "Node {} depends on [{}], expected [{}]",
                node,
                names(actual),
                names(expected)
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Checks the barrier contract of an evaluation graph
///
/// Every Stage-2 node depends on exactly its parent Stage-1; every Stage-3
/// node depends on its parent Stage-1 and all sibling Stage-2 nodes; the
/// aggregate depends on exactly the Stage-3 nodes. Violations are collected.
pub struct GraphValidator {
    /// Require all 21 category nodes and the aggregate to be present
    pub require_complete: bool,
}

impl GraphValidator {
    /// Create a new validator
    #[must_use]
    pub fn new() -> Self {
        Self {
            require_complete: true,
        }
    }

    /// Set whether every category node must be present
    #[must_use]
    pub fn with_require_complete(mut self, require: bool) -> Self {
        self.require_complete = require;
        self
    }

    /// Validate an evaluation graph
    ///
    /// # Errors
    ///
    /// Returns every violation found
    pub fn validate(&self, graph: &EvaluationGraph) -> Result<(), Vec<ValidationError>> {
        let dag = graph.dag();
        let mut errors = Vec::new();

        if let Err(e) = self.check_cycles(dag) {
            errors.push(e);
        }

        if let Err(e) = self.check_connected(dag) {
            errors.push(e);
        }

        if self.require_complete {
            for key in CategoryKey::all() {
                if !dag.contains(key.into()) {
                    errors.push(ValidationError::MissingNode { node: key.into() });
                }
            }
            if !dag.contains(GraphNode::Aggregate) {
                errors.push(ValidationError::MissingNode {
                    node: GraphNode::Aggregate,
                });
            }
        }

        for node in dag.nodes.iter().copied() {
            let expected = expected_dependencies(node);
            let actual = dag.dependencies(node);
            let same = expected.len() == actual.len()
                && expected.iter().all(|n| actual.contains(n));
            if !same {
                errors.push(ValidationError::WrongDependencies {
                    node,
                    expected,
                    actual,
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Check for cycles in the DAG
    fn check_cycles(&self, dag: &Dag) -> Result<(), ValidationError> {
        let mut visited = IndexSet::new();
        let mut rec_stack = IndexSet::new();

        for &node in &dag.nodes {
            if Self::dfs_cycle(node, dag, &mut visited, &mut rec_stack) {
                return Err(ValidationError::Cycle {
                    nodes: rec_stack.iter().copied().collect(),
                });
            }
        }

        Ok(())
    }

    /// DFS cycle detection
    fn dfs_cycle(
        node: GraphNode,
        dag: &Dag,
        visited: &mut IndexSet<GraphNode>,
        rec_stack: &mut IndexSet<GraphNode>,
    ) -> bool {
        if rec_stack.contains(&node) {
            return true;
        }
        if visited.contains(&node) {
            return false;
        }

        visited.insert(node);
        rec_stack.insert(node);

        for dep in dag.dependencies(node) {
            if Self::dfs_cycle(dep, dag, visited, rec_stack) {
                return true;
            }
        }

        rec_stack.shift_remove(&node);
        false
    }

    /// Check for isolated or unreachable nodes
    fn check_connected(&self, dag: &Dag) -> Result<(), ValidationError> {
        if dag.node_count() <= 1 {
            return Ok(());
        }

        let mut reachable = IndexSet::new();
        let mut stack = dag.entry_nodes();

        while let Some(current) = stack.pop() {
            if !reachable.insert(current) {
                continue;
            }
            stack.extend(dag.dependents(current));
        }

        let disconnected: Vec<_> = dag
            .nodes
            .iter()
            .copied()
            .filter(|n| {
                let isolated = !dag.edges.iter().any(|e| e.from == *n || e.to == *n);
                isolated || !reachable.contains(n)
            })
            .collect();

        if !disconnected.is_empty() {
            return Err(ValidationError::Disconnected {
                nodes: disconnected,
            });
        }

        Ok(())
    }
}

impl Default for GraphValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Dependencies a node must have under the barrier contract
fn expected_dependencies(node: GraphNode) -> Vec<GraphNode> {
    match node {
        GraphNode::Category(key) => key.prerequisites().into_iter().map(Into::into).collect(),
        GraphNode::Aggregate => SuperCategory::ALL
            .iter()
            .map(|g| g.stage3_key().into())
            .collect(),
    }
}
