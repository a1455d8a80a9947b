//! TRIAD Judgment Oracle
//!
//! The oracle boundary: request and context types, the instruction catalog,
//! prompt rendering, reply validation, and the HTTP and scripted oracles.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod http;
pub mod instruction;
pub mod oracle;
pub mod prompt;
pub mod scripted;
pub mod validate;

pub use error::OracleError;
pub use http::{HttpOracleConfig, OpenAiCompatibleOracle};
pub use instruction::{InstructionCatalog, InstructionSet};
pub use oracle::{Oracle, OracleContext, OracleRequest};
pub use prompt::{decode_judgment, render_system, render_user};
pub use scripted::{CallRecord, ScriptedOracle, ScriptedReply, clean_judgment};
pub use validate::JudgmentValidator;
