//! Construction of the standard evaluation graph.

use crate::dag::{Dag, Edge, GraphNode};
use serde::Serialize;
use triad_core::{CategoryKey, CoreResult, SubCategory, SuperCategory};

/// The static hierarchical evaluation DAG
///
/// Four Stage-1 entry nodes fan out to their sub-category Stage-2 nodes; each
/// group fans in to its Stage-3 verification; the four Stage-3 nodes feed the
/// aggregate node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationGraph {
    dag: Dag,
}

impl EvaluationGraph {
    /// Total node count: 21 categories plus the aggregate
    pub const NODE_COUNT: usize = CategoryKey::COUNT + 1;

    /// Build the graph from the static group table
    ///
    /// # Errors
    ///
    /// Returns error if the table produces a duplicate node or edge
    pub fn standard() -> CoreResult<Self> {
        let mut dag = Dag::new();
        for key in CategoryKey::all() {
            dag.add_node(key)?;
        }
        dag.add_node(GraphNode::Aggregate)?;

        for group in SuperCategory::ALL {
            let stage1 = group.stage1_key();
            let stage3 = group.stage3_key();
            for sub in group.sub_categories() {
                let stage2 = CategoryKey::Stage2(*sub);
                dag.add_edge(Edge::new(stage1, stage2))?;
                dag.add_edge(Edge::new(stage2, stage3))?;
            }
            dag.add_edge(Edge::new(stage1, stage3))?;
            dag.add_edge(Edge::new(stage3, GraphNode::Aggregate))?;
        }

        Ok(Self { dag })
    }

    /// Wrap an arbitrary DAG, for validation of hand-built graphs
    #[must_use]
    pub fn from_dag(dag: Dag) -> Self {
        Self { dag }
    }

    /// Underlying DAG
    #[must_use]
    pub fn dag(&self) -> &Dag {
        &self.dag
    }

    /// Nodes the given node waits for
    #[must_use]
    pub fn dependencies(&self, node: GraphNode) -> Vec<GraphNode> {
        self.dag.dependencies(node)
    }

    /// Nodes waiting on the given node
    #[must_use]
    pub fn dependents(&self, node: GraphNode) -> Vec<GraphNode> {
        self.dag.dependents(node)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = GraphNode> + '_ {
        self.dag.nodes.iter().copied()
    }

    /// Stage-2 nodes of a group, in table order
    #[must_use]
    pub fn group_members(group: SuperCategory) -> Vec<CategoryKey> {
        group
            .sub_categories()
            .iter()
            .map(|sub: &SubCategory| CategoryKey::Stage2(*sub))
            .collect()
    }
}
