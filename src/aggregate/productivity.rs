//! Production count per (day, area), one column per shift (`productnb`)

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{Scope, UnexpectedShiftPolicy};
use crate::error::PlantError;
use crate::store::PlantStore;

/// Stored `area_key` for punches without an area
pub const UNKNOWN_AREA_KEY: i64 = -1;

/// Upper bound for a single punch's production count
pub const MAX_PRODUCT_COUNT: i64 = 1_000_000_000;

/// Summed production count for one (date, area, shift) group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionGroup {
    pub date: NaiveDate,
    pub area: Option<i64>,
    pub shift: Option<i64>,
    pub count: i64,
}

/// One `productnb` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductivitySummary {
    pub date: NaiveDate,
    pub area: Option<i64>,
    pub shift1: i64,
    pub shift2: i64,
    pub shift3: i64,
    pub total: i64,
}

impl ProductivitySummary {
    fn empty(date: NaiveDate, area: Option<i64>) -> Self {
        Self {
            date,
            area,
            shift1: 0,
            shift2: 0,
            shift3: 0,
            total: 0,
        }
    }

    fn add(&mut self, bucket: u8, count: i64) {
        let column = match bucket {
            1 => &mut self.shift1,
            2 => &mut self.shift2,
            _ => &mut self.shift3,
        };
        *column = column.saturating_add(count.max(0));
    }
}

pub struct ProductivityAggregator<'a> {
    store: &'a PlantStore,
    policy: UnexpectedShiftPolicy,
}

impl<'a> ProductivityAggregator<'a> {
    pub fn new(store: &'a PlantStore, policy: UnexpectedShiftPolicy) -> Self {
        Self { store, policy }
    }

    /// Recompute `productnb` rows for the scope. Returns the number of rows
    /// written.
    pub fn run(&self, scope: Scope) -> Result<usize> {
        self.run_for(scope.resolve_local())
    }

    /// Same as [`run`](Self::run) with the date filter already resolved
    pub fn run_for(&self, date: Option<NaiveDate>) -> Result<usize> {
        let groups = self.store.production_by_shift(date)?;
        if groups.is_empty() {
            info!(?date, "no punches to aggregate for productivity");
            return Ok(0);
        }

        let summaries = reshape(&groups, self.policy)?;
        for summary in &summaries {
            self.store.upsert_productivity(summary)?;
        }

        info!(
            ?date,
            groups = groups.len(),
            rows = summaries.len(),
            "productivity summaries upserted"
        );
        Ok(summaries.len())
    }
}

/// Fold (date, area, shift) groups into one row per (date, area). Totals are
/// recomputed from the three shift columns.
pub fn reshape(
    groups: &[ProductionGroup],
    policy: UnexpectedShiftPolicy,
) -> Result<Vec<ProductivitySummary>, PlantError> {
    let mut rows: BTreeMap<(NaiveDate, i64), ProductivitySummary> = BTreeMap::new();

    for group in groups {
        let bucket = match group.shift {
            Some(shift @ 1..=3) => shift as u8,
            other => match policy {
                // buckets other than 1 and 2 land in shift 3
                UnexpectedShiftPolicy::MergeInto(bucket) => bucket,
                UnexpectedShiftPolicy::Drop => {
                    debug!(
                        date = %group.date,
                        area = ?group.area,
                        shift = ?other,
                        count = group.count,
                        "dropping production under unexpected shift"
                    );
                    continue;
                }
                UnexpectedShiftPolicy::Error => {
                    return Err(PlantError::UnexpectedShift {
                        date: group.date,
                        area: group.area,
                        shift: other,
                    })
                }
            },
        };

        rows.entry((group.date, group.area.unwrap_or(UNKNOWN_AREA_KEY)))
            .or_insert_with(|| ProductivitySummary::empty(group.date, group.area))
            .add(bucket, group.count);
    }

    Ok(rows
        .into_values()
        .map(|mut row| {
            row.total = row
                .shift1
                .saturating_add(row.shift2)
                .saturating_add(row.shift3);
            row
        })
        .collect())
}
