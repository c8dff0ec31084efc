//! Range rebuild of `ttc` rows followed by the utilization fraction pass

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info};

use crate::error::PlantError;
use crate::store::PlantStore;

/// Dates are inclusive on both ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeFilter {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub area: Option<i64>,
    pub cost_center: Option<String>,
}

impl RangeFilter {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from,
            to,
            area: None,
            cost_center: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    /// Rows inserted or updated by the aggregate pass
    pub affected_rows: usize,
    /// Rows touched by the fraction pass, `None` if that pass failed
    pub ratios_updated: Option<usize>,
}

pub struct RangeRebuilder<'a> {
    store: &'a PlantStore,
}

impl<'a> RangeRebuilder<'a> {
    pub fn new(store: &'a PlantStore) -> Self {
        Self { store }
    }

    /// Aggregate punches in the range into `ttc`, then recompute the derived
    /// fractions. A failure of the second pass is logged and reported in the
    /// result; the aggregate pass is kept.
    pub fn rebuild(&self, filter: &RangeFilter) -> Result<RebuildReport> {
        if filter.from > filter.to {
            return Err(PlantError::InvalidRange {
                from: filter.from,
                to: filter.to,
            }
            .into());
        }

        let affected_rows = self.store.rebuild_utilization(filter)?;
        info!(
            from = %filter.from,
            to = %filter.to,
            area = ?filter.area,
            cost_center = ?filter.cost_center,
            affected_rows,
            "utilization range rebuilt"
        );

        let ratios_updated = match self.store.recompute_utilization_ratios(filter) {
            Ok(updated) => Some(updated),
            Err(e) => {
                error!(from = %filter.from, to = %filter.to, error = %e, "failed to recompute utilization fractions");
                None
            }
        };

        Ok(RebuildReport {
            affected_rows,
            ratios_updated,
        })
    }
}
