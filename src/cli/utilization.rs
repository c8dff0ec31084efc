//! Utilization command implementation

use anyhow::Result;

use crate::aggregate::utilization::NonProductive;
use crate::aggregate::{Scope, UtilizationAggregator};
use crate::config::Config;
use crate::store::PlantStore;

pub fn run(store: &PlantStore, config: &Config, scope: Scope) -> Result<()> {
    let aggregator = UtilizationAggregator::new(store, non_productive(config));
    let rows = aggregator.run(scope)?;
    println!("Utilization ({}): {} rows upserted", scope, rows);
    Ok(())
}

pub(crate) fn non_productive(config: &Config) -> NonProductive {
    NonProductive::new(&config.utilization.non_productive)
}
