//! TRIAD Core Types
//!
//! This crate contains pure types with no I/O: category keys and the static
//! group table, judgment records, the translation triple, and the
//! single-assignment evaluation state.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod category;
pub mod error;
pub mod id;
pub mod judgment;
pub mod state;
pub mod time;
pub mod triple;

// Re-exports
pub use category::{CategoryKey, Stage, SubCategory, SuperCategory};
pub use error::{CoreError, CoreResult};
pub use id::RunId;
pub use judgment::{ErrorsExist, Judgment, Stage1Judgment, Stage2Judgment, Stage3Judgment};
pub use state::EvaluationState;
pub use time::LogicalTime;
pub use triple::TranslationTriple;
