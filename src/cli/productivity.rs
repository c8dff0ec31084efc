//! Productivity command implementation

use anyhow::Result;

use crate::aggregate::{ProductivityAggregator, Scope};
use crate::config::Config;
use crate::store::PlantStore;

pub fn run(store: &PlantStore, config: &Config, scope: Scope) -> Result<()> {
    let aggregator = ProductivityAggregator::new(store, config.productivity.unexpected_shift);
    let rows = aggregator.run(scope)?;
    println!("Productivity ({}): {} rows upserted", scope, rows);
    Ok(())
}
