//! CLI command implementations

pub mod assign;
pub mod ingest;
pub mod productivity;
pub mod queue;
pub mod rebuild;
pub mod shift;
pub mod show;
pub mod utilization;

use anyhow::Result;
use chrono::NaiveDate;

use crate::aggregate::Scope;
use crate::error::parse_date;

/// Scope from the `--today` / `--date` flags; neither means all history
pub fn scope_from_args(today: bool, date: Option<&str>) -> Result<Scope> {
    Ok(match (today, date) {
        (_, Some(d)) => Scope::Date(parse_date(d)?),
        (true, None) => Scope::Today,
        (false, None) => Scope::All,
    })
}

pub(crate) fn parse_optional_date(value: Option<&str>) -> Result<Option<NaiveDate>> {
    Ok(value.map(parse_date).transpose()?)
}

pub(crate) fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub(crate) fn fmt_ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}%", v * 100.0))
}

/// Seconds as `H:MM:SS`; hours are not wrapped at 24
pub(crate) fn fmt_duration(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
