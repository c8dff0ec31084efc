//! Rebuild command implementation

use anyhow::Result;

use crate::aggregate::rebuild::RangeFilter;
use crate::aggregate::RangeRebuilder;
use crate::error::parse_date;
use crate::store::PlantStore;

pub fn run(
    store: &PlantStore,
    from: &str,
    to: &str,
    area: Option<i64>,
    cost_center: Option<String>,
) -> Result<()> {
    let mut filter = RangeFilter::new(parse_date(from)?, parse_date(to)?);
    filter.area = area;
    filter.cost_center = cost_center;

    let report = RangeRebuilder::new(store).rebuild(&filter)?;
    println!(
        "Rebuilt utilization {} .. {}: {} rows",
        filter.from, filter.to, report.affected_rows
    );
    match report.ratios_updated {
        Some(n) => println!("Fractions recomputed for {} rows", n),
        None => println!("Fraction pass failed, see log; fractions left empty"),
    }
    Ok(())
}
