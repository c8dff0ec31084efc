//! Recalculation queue commands

use anyhow::Result;

use crate::aggregate::UtilizationAggregator;
use crate::config::Config;
use crate::error::parse_date;
use crate::store::PlantStore;

use super::utilization::non_productive;

pub fn drain(store: &PlantStore, config: &Config) -> Result<()> {
    let pending = store.pending_recalc_dates()?;
    if pending.is_empty() {
        println!("Recalculation queue is empty.");
        return Ok(());
    }

    let aggregator = UtilizationAggregator::new(store, non_productive(config));
    let rows = aggregator.process_pending_queue()?;
    println!("Recalculated {} dates, {} rows upserted", pending.len(), rows);
    Ok(())
}

pub fn add(store: &PlantStore, date: &str) -> Result<()> {
    let date = parse_date(date)?;
    store.enqueue_recalc(date)?;
    println!("Queued {} for recalculation", date);
    Ok(())
}

pub fn list(store: &PlantStore) -> Result<()> {
    let entries = store.recalc_entries()?;
    if entries.is_empty() {
        println!("Recalculation queue is empty.");
        return Ok(());
    }

    println!("{:<12} {}", "Date", "State");
    println!("{}", "-".repeat(22));
    for entry in entries {
        let state = if entry.pending { "pending" } else { "done" };
        println!("{:<12} {}", entry.date, state);
    }
    Ok(())
}
