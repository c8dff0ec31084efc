//! Shift window commands

use anyhow::Result;

use crate::shift::{parse_clock_time, ShiftWindow};
use crate::store::PlantStore;

pub fn add(store: &PlantStore, id: i64, entry: &str, exit: &str, inactive: bool) -> Result<()> {
    let entry = parse_clock_time(entry)?;
    let exit = parse_clock_time(exit)?;
    store.upsert_shift_window(id, &entry, &exit, !inactive)?;

    let window = ShiftWindow::new(id, &entry, &exit);
    let note = if window.wraps_midnight() {
        " (crosses midnight)"
    } else {
        ""
    };
    println!("Shift {} set to {} - {}{}", id, entry, exit, note);
    Ok(())
}

pub fn list(store: &PlantStore) -> Result<()> {
    let windows = store.shift_windows()?;
    if windows.is_empty() {
        println!("No shift windows. Add one with 'plantpulse shift add'.");
        return Ok(());
    }

    println!("{:<6} {:<10} {:<10} {}", "Shift", "Entry", "Exit", "Active");
    println!("{}", "-".repeat(34));
    for w in windows {
        println!(
            "{:<6} {:<10} {:<10} {}",
            w.id,
            w.entry_time,
            w.exit_time,
            if w.active { "yes" } else { "no" }
        );
    }
    Ok(())
}
