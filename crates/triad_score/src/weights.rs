//! Category weights for the overall score.

use triad_core::SuperCategory;

/// Factor applied to a group's base score when verification finds no errors
pub const NO_ERRORS_DAMPING: f64 = 0.3;

/// Weight of each group, in percent
const WEIGHT_PERCENT: [(SuperCategory, u32); 4] = [
    (SuperCategory::Accuracy, 40),
    (SuperCategory::Fluency, 30),
    (SuperCategory::Terminology, 20),
    (SuperCategory::Style, 10),
];

const fn total_percent() -> u32 {
    let mut total = 0;
    let mut i = 0;
    while i < WEIGHT_PERCENT.len() {
        total += WEIGHT_PERCENT[i].1;
        i += 1;
    }
    total
}

const _: () = assert!(total_percent() == 100, "group weights must sum to 100%");

/// Weight of a group, in percent
#[must_use]
pub const fn weight_percent(group: SuperCategory) -> u32 {
    match group {
        SuperCategory::Accuracy => WEIGHT_PERCENT[0].1,
        SuperCategory::Fluency => WEIGHT_PERCENT[1].1,
        SuperCategory::Terminology => WEIGHT_PERCENT[2].1,
        SuperCategory::Style => WEIGHT_PERCENT[3].1,
    }
}

/// Weight of a group as a fraction
#[must_use]
pub fn weight(group: SuperCategory) -> f64 {
    f64::from(weight_percent(group)) / 100.0
}
