//! Summary jobs over classified punches
//!
//! - `productivity`: production count per (day, area) split by shift
//! - `utilization`: worked seconds per (day, employee), plus the recalc queue
//! - `rebuild`: range rebuild of utilization rows with derived fractions

pub mod productivity;
pub mod rebuild;
pub mod utilization;

pub use productivity::ProductivityAggregator;
pub use rebuild::RangeRebuilder;
pub use utilization::UtilizationAggregator;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Which punches a job reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Today,
    Date(NaiveDate),
}

impl Scope {
    /// Date filter for this scope, `None` meaning every date
    pub fn resolve(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            Scope::All => None,
            Scope::Today => Some(today),
            Scope::Date(date) => Some(date),
        }
    }

    pub fn resolve_local(self) -> Option<NaiveDate> {
        self.resolve(Local::now().date_naive())
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::All => write!(f, "all history"),
            Scope::Today => write!(f, "today"),
            Scope::Date(date) => write!(f, "{}", date),
        }
    }
}

/// What to do with production counted under a shift other than 1, 2 or 3
/// (including punches that were never classified)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnexpectedShiftPolicy {
    /// Add the count to the given shift column
    MergeInto(u8),
    /// Leave the count out of every column
    Drop,
    /// Fail the run before anything is written
    Error,
}

impl Default for UnexpectedShiftPolicy {
    fn default() -> Self {
        UnexpectedShiftPolicy::MergeInto(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_resolution() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let other = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(Scope::All.resolve(today), None);
        assert_eq!(Scope::Today.resolve(today), Some(today));
        assert_eq!(Scope::Date(other).resolve(today), Some(other));
    }
}
