//! Assigns a shift to every punch that does not have one yet

use anyhow::Result;
use tracing::{debug, info};

use super::{ShiftTable, WindowResolution};
use crate::store::PlantStore;

pub struct ShiftAssigner<'a> {
    store: &'a PlantStore,
    resolution: WindowResolution,
}

impl<'a> ShiftAssigner<'a> {
    pub fn new(store: &'a PlantStore, resolution: WindowResolution) -> Self {
        Self { store, resolution }
    }

    /// Classify every unassigned punch by its start time and write all
    /// matches in one transaction. Punches matching no active window stay
    /// unassigned. Returns the number of punches updated.
    pub fn assign(&self) -> Result<usize> {
        let pending = self.store.unassigned_punches()?;
        if pending.is_empty() {
            debug!("no unassigned punches");
            return Ok(0);
        }

        let table = ShiftTable::new(self.store.active_shift_windows()?, self.resolution)?;
        let assignments: Vec<(i64, i64)> = pending
            .iter()
            .filter_map(|(id, start)| table.classify(start.as_deref()).map(|shift| (*id, shift)))
            .collect();

        let updated = if assignments.is_empty() {
            0
        } else {
            self.store.apply_shift_assignments(&assignments)?
        };

        info!(
            pending = pending.len(),
            windows = table.len(),
            assigned = updated,
            unmatched = pending.len() - assignments.len(),
            "shift assignment finished"
        );
        Ok(updated)
    }
}
