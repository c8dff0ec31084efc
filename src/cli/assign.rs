//! Assign command implementation

use anyhow::Result;

use crate::config::Config;
use crate::shift::ShiftAssigner;
use crate::store::PlantStore;

pub fn run(store: &PlantStore, config: &Config) -> Result<()> {
    let assigned = ShiftAssigner::new(store, config.shifts.resolution).assign()?;
    let remaining = store.unassigned_punches()?.len();

    println!("Assigned shifts to {} punches", assigned);
    if remaining > 0 {
        println!("{} punches match no active shift window", remaining);
    }
    Ok(())
}
