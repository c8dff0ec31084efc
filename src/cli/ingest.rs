//! Ingest command implementation

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::ingest::ingest_file;
use crate::store::PlantStore;

pub fn run(store: &PlantStore, config: &Config, path: &Path) -> Result<()> {
    let report = ingest_file(store, path, config.shifts.resolution)?;

    println!("Read {} punches from {}", report.read, path.display());
    println!("  Upserted:        {}", report.upserted);
    println!("  Skipped:         {} (no product number)", report.skipped);
    println!("  Dates queued:    {}", report.dates_queued.len());
    println!("  Shifts assigned: {}", report.shifts_assigned);
    Ok(())
}
