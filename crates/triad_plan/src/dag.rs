//! Typed DAG of evaluation nodes.
//!
//! Nodes are category judgments plus one virtual aggregate node. Edges point
//! from a prerequisite to the node that consumes it.

use indexmap::IndexSet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use triad_core::{CategoryKey, CoreError, CoreResult, Stage, SuperCategory};

/// Identifier of a node in the evaluation graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GraphNode {
    /// One category judgment
    Category(CategoryKey),
    /// Final score computation
    Aggregate,
}

impl GraphNode {
    /// Stable name, the category key string or `aggregate`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Category(key) => key.as_str(),
            Self::Aggregate => "aggregate",
        }
    }

    /// Category key, unless this is the aggregate node
    #[must_use]
    pub const fn category(self) -> Option<CategoryKey> {
        match self {
            Self::Category(key) => Some(key),
            Self::Aggregate => None,
        }
    }

    /// Stage of a category node
    #[must_use]
    pub const fn stage(self) -> Option<Stage> {
        match self {
            Self::Category(key) => Some(key.stage()),
            Self::Aggregate => None,
        }
    }

    /// Group of a category node
    #[must_use]
    pub const fn group(self) -> Option<SuperCategory> {
        match self {
            Self::Category(key) => Some(key.group()),
            Self::Aggregate => None,
        }
    }
}

impl From<CategoryKey> for GraphNode {
    fn from(key: CategoryKey) -> Self {
        Self::Category(key)
    }
}

impl std::fmt::Display for GraphNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GraphNode {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        if s == "aggregate" {
            Ok(Self::Aggregate)
        } else {
            s.parse().map(Self::Category)
        }
    }
}

impl Serialize for GraphNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GraphNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// An edge between nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Prerequisite node
    pub from: GraphNode,
    /// Dependent node
    pub to: GraphNode,
}

impl Edge {
    /// Create a new edge
    #[must_use]
    pub fn new(from: impl Into<GraphNode>, to: impl Into<GraphNode>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// A directed acyclic graph of evaluation nodes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dag {
    /// All nodes, in insertion order
    pub nodes: IndexSet<GraphNode>,
    /// All edges, in insertion order
    pub edges: Vec<Edge>,
}

impl Dag {
    /// Create a new empty DAG
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the DAG
    ///
    /// # Errors
    ///
    /// Returns error if node already exists
    pub fn add_node(&mut self, node: impl Into<GraphNode>) -> CoreResult<()> {
        let node = node.into();
        if !self.nodes.insert(node) {
            return Err(CoreError::AlreadyExists {
                kind: "Node".to_string(),
                id: node.to_string(),
            });
        }
        Ok(())
    }

    /// Add an edge to the DAG
    ///
    /// # Errors
    ///
    /// Returns error if an endpoint is unknown, the edge is a duplicate, or
    /// it would create a cycle
    pub fn add_edge(&mut self, edge: Edge) -> CoreResult<()> {
        for end in [edge.from, edge.to] {
            if !self.nodes.contains(&end) {
                return Err(CoreError::NotFound {
                    kind: "Node".to_string(),
                    id: end.to_string(),
                });
            }
        }
        if self.edges.contains(&edge) {
            return Err(CoreError::AlreadyExists {
                kind: "Edge".to_string(),
                id: format!("{} -> {}", edge.from, edge.to),
            });
        }
        if self.reaches(edge.to, edge.from) {
            return Err(CoreError::Validation {
                field: "edge".to_string(),
                reason: format!("adding edge {} -> {} would create a cycle", edge.from, edge.to),
            });
        }

        self.edges.push(edge);
        Ok(())
    }

    /// Whether `target` is reachable from `start` along existing edges
    fn reaches(&self, start: GraphNode, target: GraphNode) -> bool {
        let mut visited = IndexSet::new();
        let mut stack = vec![start];

        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            stack.extend(self.dependents(current));
        }

        false
    }

    /// Validate the DAG structure
    ///
    /// # Errors
    ///
    /// Returns error if an edge references an unknown node or the edges
    /// contain a cycle
    pub fn validate(&self) -> CoreResult<()> {
        for edge in &self.edges {
            for end in [edge.from, edge.to] {
                if !self.nodes.contains(&end) {
                    return Err(CoreError::NotFound {
                        kind: "Node".to_string(),
                        id: end.to_string(),
                    });
                }
            }
        }

        if self.topological_order().len() != self.nodes.len() {
            return Err(CoreError::Validation {
                field: "dag".to_string(),
                reason: "cycle detected".to_string(),
            });
        }

        Ok(())
    }

    /// Nodes in a dependency-respecting order (Kahn's algorithm)
    ///
    /// Nodes on a cycle are left out, so a short result signals a cycle.
    #[must_use]
    pub fn topological_order(&self) -> Vec<GraphNode> {
        let mut pending: Vec<usize> = self
            .nodes
            .iter()
            .map(|n| self.dependencies(*n).len())
            .collect();
        let mut queue: Vec<GraphNode> = self
            .nodes
            .iter()
            .zip(&pending)
            .filter(|(_, count)| **count == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        let mut head = 0;
        while head < queue.len() {
            let node = queue[head];
            head += 1;
            order.push(node);
            for dependent in self.dependents(node) {
                if let Some(idx) = self.nodes.get_index_of(&dependent) {
                    pending[idx] = pending[idx].saturating_sub(1);
                    if pending[idx] == 0 {
                        queue.push(dependent);
                    }
                }
            }
        }

        order
    }

    /// Get nodes that depend on the given node
    #[must_use]
    pub fn dependents(&self, node: GraphNode) -> Vec<GraphNode> {
        self.edges
            .iter()
            .filter(|e| e.from == node)
            .map(|e| e.to)
            .collect()
    }

    /// Get nodes that the given node depends on
    #[must_use]
    pub fn dependencies(&self, node: GraphNode) -> Vec<GraphNode> {
        self.edges
            .iter()
            .filter(|e| e.to == node)
            .map(|e| e.from)
            .collect()
    }

    /// Nodes with no dependencies
    #[must_use]
    pub fn entry_nodes(&self) -> Vec<GraphNode> {
        self.nodes
            .iter()
            .copied()
            .filter(|n| !self.edges.iter().any(|e| e.to == *n))
            .collect()
    }

    /// Nodes with no dependents
    #[must_use]
    pub fn exit_nodes(&self) -> Vec<GraphNode> {
        self.nodes
            .iter()
            .copied()
            .filter(|n| !self.edges.iter().any(|e| e.from == *n))
            .collect()
    }

    /// Whether the node is in the DAG
    #[must_use]
    pub fn contains(&self, node: GraphNode) -> bool {
        self.nodes.contains(&node)
    }

    /// Get total node count
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get total edge count
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Check if DAG is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triad_core::SubCategory;

    fn s1() -> GraphNode {
        SuperCategory::Style.stage1_key().into()
    }

    fn s2() -> GraphNode {
        CategoryKey::Stage2(SubCategory::Awkward).into()
    }

    fn s3() -> GraphNode {
        SuperCategory::Style.stage3_key().into()
    }

    fn chain() -> Dag {
        let mut dag = Dag::new();
        for node in [s1(), s2(), s3()] {
            dag.add_node(node).unwrap();
        }
        dag.add_edge(Edge::new(s1(), s2())).unwrap();
        dag.add_edge(Edge::new(s2(), s3())).unwrap();
        dag
    }

    #[test]
    fn test_dag_new() {
        let dag = Dag::new();
        assert!(dag.is_empty());
        assert_eq!(dag.node_count(), 0);
        assert_eq!(dag.edge_count(), 0);
        assert!(dag.validate().is_ok());
    }

    #[test]
    fn test_dag_add_node_duplicate() {
        let mut dag = Dag::new();
        dag.add_node(s1()).unwrap();
        assert!(matches!(dag.add_node(s1()), Err(CoreError::AlreadyExists { .. })));
    }

    #[test]
    fn test_dag_add_edge_unknown_node() {
        let mut dag = Dag::new();
        dag.add_node(s1()).unwrap();
        let result = dag.add_edge(Edge::new(s1(), GraphNode::Aggregate));
        assert!(matches!(result, Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn test_dag_rejects_duplicate_edge() {
        let mut dag = chain();
        assert!(dag.add_edge(Edge::new(s1(), s2())).is_err());
        assert_eq!(dag.edge_count(), 2);
    }

    #[test]
    fn test_dag_rejects_cycle() {
        let mut dag = chain();
        let result = dag.add_edge(Edge::new(s3(), s1()));
        assert!(matches!(result, Err(CoreError::Validation { .. })));

        let mut dag = chain();
        assert!(dag.add_edge(Edge::new(s2(), s2())).is_err());
    }

    #[test]
    fn test_dag_validate_detects_forced_cycle() {
        let mut dag = chain();
        dag.edges.push(Edge::new(s3(), s1()));
        assert!(dag.validate().is_err());
    }

    #[test]
    fn test_dag_dependencies_and_dependents() {
        let dag = chain();
        assert_eq!(dag.dependencies(s2()), vec![s1()]);
        assert_eq!(dag.dependents(s2()), vec![s3()]);
        assert_eq!(dag.entry_nodes(), vec![s1()]);
        assert_eq!(dag.exit_nodes(), vec![s3()]);
    }

    #[test]
    fn test_topological_order() {
        let dag = chain();
        assert_eq!(dag.topological_order(), vec![s1(), s2(), s3()]);
    }

    #[test]
    fn test_graph_node_names() {
        assert_eq!(GraphNode::Aggregate.to_string(), "aggregate");
        assert_eq!("aggregate".parse::<GraphNode>().unwrap(), GraphNode::Aggregate);
        assert_eq!("awkward".parse::<GraphNode>().unwrap(), s2());
        assert_eq!(s3().group(), Some(SuperCategory::Style));
        assert_eq!(GraphNode::Aggregate.stage(), None);
    }
}
