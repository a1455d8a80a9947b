//! TRIAD Runtime
//!
//! Executes the evaluation graph for one triple: a ready-counter scheduler,
//! a stage executor with retry and timeout handling, and a tokio engine
//! that fans nodes out as tasks and aggregates once every group verified.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod executor;
pub mod monitor;
pub mod policy;
pub mod scheduler;

pub use engine::{EngineConfig, EvaluationEngine, EvaluationOutcome, ExecutionError, NodeFailure};
pub use executor::{ExecutorError, StageExecutor, StageOutput};
pub use monitor::{ExecutionTrace, Metrics, ProgressSink, TraceEvent, TraceStatus};
pub use policy::{PartialPolicy, RetryPolicy, SiblingFailurePolicy};
pub use scheduler::{NodeStatus, ScheduleDecision, ScheduleError, Scheduler};
