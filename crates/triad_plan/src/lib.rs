//! TRIAD Planner
//!
//! The static evaluation DAG: category nodes wired by the group table, the
//! virtual aggregate node, and a validator for the stage barrier contract.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod dag;
pub mod validate;

pub use builder::EvaluationGraph;
pub use dag::{Dag, Edge, GraphNode};
pub use validate::{GraphValidator, ValidationError};
