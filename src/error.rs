//! Domain errors raised by the aggregation pipeline

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PlantError {
    #[error("shift windows {first} and {second} overlap")]
    OverlappingShiftWindows { first: i64, second: i64 },

    #[error("unexpected shift {shift:?} on {date} (area {area:?})")]
    UnexpectedShift {
        date: NaiveDate,
        area: Option<i64>,
        shift: Option<i64>,
    },

    #[error("invalid date range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("invalid time '{0}', expected HH:MM:SS")]
    InvalidTime(String),
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Result<NaiveDate, PlantError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| PlantError::InvalidDate(value.to_string()))
}
