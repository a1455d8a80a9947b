//! Logical time for scheduling.
//!
//! The scheduler ticks once per node resolution, giving every trace event a
//! total order that does not depend on the wall clock.

use serde::{Deserialize, Serialize};

/// Logical time - monotonically increasing counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogicalTime(u64);

impl LogicalTime {
    /// Create a new logical time at zero
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Create from raw value
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Get raw value
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Advance by `n` ticks, saturating at `u64::MAX`
    #[must_use]
    pub const fn saturating_add(self, n: u64) -> Self {
        Self(self.0.saturating_add(n))
    }
}

impl Default for LogicalTime {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for LogicalTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_time() {
        let t = LogicalTime::zero();
        assert_eq!(t.as_u64(), 0);
        assert_eq!(t.saturating_add(3).as_u64(), 3);
        assert_eq!(LogicalTime::from_raw(u64::MAX).saturating_add(1).as_u64(), u64::MAX);
    }

    #[test]
    fn test_logical_time_ord() {
        assert!(LogicalTime::from_raw(1) < LogicalTime::from_raw(2));
        assert_eq!(LogicalTime::from_raw(7).to_string(), "T7");
    }
}
