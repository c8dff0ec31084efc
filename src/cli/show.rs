//! Show summary tables

use anyhow::Result;

use super::{fmt_duration, fmt_opt, fmt_ratio, parse_optional_date};
use crate::store::PlantStore;

pub fn productivity(
    store: &PlantStore,
    from: Option<&str>,
    to: Option<&str>,
    json: bool,
) -> Result<()> {
    let rows = store.productivity_rows(parse_optional_date(from)?, parse_optional_date(to)?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No productivity rows. Run 'plantpulse productivity' first.");
        return Ok(());
    }

    println!(
        "{:<12} {:<8} {:>8} {:>8} {:>8} {:>8}",
        "Date", "Area", "Shift1", "Shift2", "Shift3", "Total"
    );
    println!("{}", "-".repeat(58));
    for r in rows {
        println!(
            "{:<12} {:<8} {:>8} {:>8} {:>8} {:>8}",
            r.date,
            fmt_opt(r.area),
            r.shift1,
            r.shift2,
            r.shift3,
            r.total
        );
    }
    Ok(())
}

pub fn utilization(
    store: &PlantStore,
    from: Option<&str>,
    to: Option<&str>,
    employee: Option<&str>,
    json: bool,
) -> Result<()> {
    let rows = store.utilization_rows(
        parse_optional_date(from)?,
        parse_optional_date(to)?,
        employee,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No utilization rows. Run 'plantpulse utilization' or 'plantpulse rebuild' first.");
        return Ok(());
    }

    println!(
        "{:<12} {:<20} {:>9} {:>9} {:>9} {:>9} {:>10} {:>5} {:>7} {:>7} {:>7}",
        "Date", "Employee", "Shift1", "Shift2", "Shift3", "Total", "Productive", "Dom", "TU1", "TU2",
        "TU3"
    );
    println!("{}", "-".repeat(118));
    for r in rows {
        let name = r.employee_name.as_deref().unwrap_or(&r.employee_key);
        let name = if name.chars().count() > 20 {
            format!("{}...", name.chars().take(17).collect::<String>())
        } else {
            name.to_string()
        };
        println!(
            "{:<12} {:<20} {:>9} {:>9} {:>9} {:>9} {:>10} {:>5} {:>7} {:>7} {:>7}",
            r.date,
            name,
            fmt_duration(r.shift1_secs),
            fmt_duration(r.shift2_secs),
            fmt_duration(r.shift3_secs),
            fmt_duration(r.total_secs),
            r.productive_secs.map_or_else(|| "-".to_string(), fmt_duration),
            fmt_opt(r.dominant_shift),
            fmt_ratio(r.tu_shift1),
            fmt_ratio(r.tu_shift2),
            fmt_ratio(r.tu_shift3),
        );
    }
    Ok(())
}
