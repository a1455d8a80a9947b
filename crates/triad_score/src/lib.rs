//! TRIAD Aggregator
//!
//! Pure functions turning recorded judgments into category and overall error
//! scores. Aggregating an unchanged state always yields the same record.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod weights;

pub use aggregate::{
    Aggregation, CategoryScore, ScoreRecord, Verification, aggregate, category_score,
    overall_score, weighted_mean,
};
pub use weights::{NO_ERRORS_DAMPING, weight, weight_percent};
