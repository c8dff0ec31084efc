//! Worked time per (day, employee) (`ttc`) and the pending recalculation queue

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use super::Scope;
use crate::store::PlantStore;

/// Projection of a punch used for utilization
#[derive(Debug, Clone)]
pub struct WorkedPunch {
    pub date: NaiveDate,
    pub employee: Option<String>,
    pub employee_name: Option<String>,
    pub shift: Option<i64>,
    pub seconds: i64,
    pub cost_center: Option<String>,
}

impl WorkedPunch {
    /// Grouping key: employee name, falling back to the raw id
    pub fn employee_key(&self) -> String {
        non_blank(&self.employee_name)
            .or_else(|| non_blank(&self.employee))
            .unwrap_or_default()
            .to_string()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// One `ttc` row as written by the aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtilizationSummary {
    pub date: NaiveDate,
    pub employee_key: String,
    pub employee: Option<String>,
    pub employee_name: Option<String>,
    pub shift1_secs: i64,
    pub shift2_secs: i64,
    pub shift3_secs: i64,
    pub total_secs: i64,
    /// Seconds outside the non-productive cost centers
    pub productive_secs: i64,
    /// Most frequent shift among the group's punches
    pub dominant_shift: Option<i64>,
}

/// Cost centers whose time is left out of the productive total. Matching is
/// exact after trimming, ignoring case.
#[derive(Debug, Clone, Default)]
pub struct NonProductive {
    codes: HashSet<String>,
}

impl NonProductive {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            codes: codes
                .into_iter()
                .map(|c| c.as_ref().trim().to_uppercase())
                .collect(),
        }
    }

    pub fn contains(&self, cost_center: Option<&str>) -> bool {
        cost_center
            .map(|c| self.codes.contains(&c.trim().to_uppercase()))
            .unwrap_or(false)
    }
}

struct Accumulator {
    summary: UtilizationSummary,
    // (shift, occurrences) in first-seen order
    shift_counts: Vec<(Option<i64>, u32)>,
}

impl Accumulator {
    fn new(punch: &WorkedPunch, employee_key: String) -> Self {
        Self {
            summary: UtilizationSummary {
                date: punch.date,
                employee_key,
                employee: punch.employee.clone(),
                employee_name: punch.employee_name.clone(),
                shift1_secs: 0,
                shift2_secs: 0,
                shift3_secs: 0,
                total_secs: 0,
                productive_secs: 0,
                dominant_shift: None,
            },
            shift_counts: Vec::new(),
        }
    }

    fn add(&mut self, punch: &WorkedPunch, non_productive: &NonProductive) {
        let secs = punch.seconds.max(0);
        let summary = &mut self.summary;
        let shift_secs = match punch.shift {
            Some(1) => Some(&mut summary.shift1_secs),
            Some(2) => Some(&mut summary.shift2_secs),
            Some(3) => Some(&mut summary.shift3_secs),
            // other shifts only count toward the totals
            _ => None,
        };
        if let Some(column) = shift_secs {
            *column = column.saturating_add(secs);
        }
        summary.total_secs = summary.total_secs.saturating_add(secs);
        if !non_productive.contains(punch.cost_center.as_deref()) {
            summary.productive_secs = summary.productive_secs.saturating_add(secs);
        }

        match self.shift_counts.iter_mut().find(|(s, _)| *s == punch.shift) {
            Some((_, count)) => *count += 1,
            None => self.shift_counts.push((punch.shift, 1)),
        }
    }

    fn finish(mut self) -> UtilizationSummary {
        self.summary.dominant_shift = dominant_shift(&self.shift_counts);
        self.summary
    }
}

/// Shift with the most occurrences; ties go to the one seen first
fn dominant_shift(counts: &[(Option<i64>, u32)]) -> Option<i64> {
    let mut best: Option<(Option<i64>, u32)> = None;
    for &(shift, count) in counts {
        if best.map_or(true, |(_, max)| count > max) {
            best = Some((shift, count));
        }
    }
    best.and_then(|(shift, _)| shift)
}

/// Group punches by (date, employee key), preserving first-seen order
pub fn aggregate(punches: &[WorkedPunch], non_productive: &NonProductive) -> Vec<UtilizationSummary> {
    let mut index: HashMap<(NaiveDate, String), usize> = HashMap::new();
    let mut groups: Vec<Accumulator> = Vec::new();

    for punch in punches {
        let key = punch.employee_key();
        let slot = *index.entry((punch.date, key.clone())).or_insert_with(|| {
            groups.push(Accumulator::new(punch, key));
            groups.len() - 1
        });
        groups[slot].add(punch, non_productive);
    }

    groups.into_iter().map(Accumulator::finish).collect()
}

pub struct UtilizationAggregator<'a> {
    store: &'a PlantStore,
    non_productive: NonProductive,
}

impl<'a> UtilizationAggregator<'a> {
    pub fn new(store: &'a PlantStore, non_productive: NonProductive) -> Self {
        Self {
            store,
            non_productive,
        }
    }

    /// Recompute `ttc` rows for the scope. Returns the number of rows written.
    pub fn run(&self, scope: Scope) -> Result<usize> {
        self.run_for(scope.resolve_local())
    }

    pub fn run_for(&self, date: Option<NaiveDate>) -> Result<usize> {
        let punches = self.store.worked_punches(date)?;
        if punches.is_empty() {
            info!(?date, "no punches to aggregate for utilization");
            return Ok(0);
        }

        let summaries = aggregate(&punches, &self.non_productive);
        for summary in &summaries {
            self.store.upsert_utilization(summary)?;
        }

        info!(
            ?date,
            punches = punches.len(),
            rows = summaries.len(),
            "utilization summaries upserted"
        );
        Ok(summaries.len())
    }

    /// Drain the recalculation queue one date at a time, clearing each entry
    /// only after its rows are written. The first failure stops the drain;
    /// dates already processed stay cleared.
    pub fn process_pending_queue(&self) -> Result<usize> {
        let pending = self.store.pending_recalc_dates()?;
        if pending.is_empty() {
            return Ok(0);
        }
        info!(dates = pending.len(), "draining recalculation queue");

        let mut total = 0;
        for date in pending {
            let written = self
                .run_for(Some(date))
                .with_context(|| format!("recalculating {}", date))
                .map_err(|e| {
                    warn!(%date, error = %e, "recalculation stopped");
                    e
                })?;
            self.store.clear_recalc(date)?;
            total += written;
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_NON_PRODUCTIVE;
    use crate::ingest::{NewPunch, MAX_CLOCKED_SECS};
    use chrono::Local;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn worked(name: &str, shift: Option<i64>, seconds: i64, cost_center: &str) -> WorkedPunch {
        WorkedPunch {
            date: date("2025-01-10"),
            employee: Some(format!("id-{}", name)),
            employee_name: Some(name.to_string()),
            shift,
            seconds,
            cost_center: Some(cost_center.to_string()),
        }
    }

    fn punch(store: &PlantStore, day: &str, name: &str, shift: i64, clocked: &str) {
        let mut p = NewPunch::new(date(day));
        p.employee = Some(format!("id-{}", name));
        p.employee_name = Some(name.to_string());
        p.shift_id = Some(shift);
        p.time_clocked = Some(clocked.to_string());
        p.cost_center = Some("PROD1".to_string());
        p.job = Some(format!("J{}", store.punch_count().unwrap()));
        store.upsert_punch(&p).unwrap();
    }

    #[test]
    fn test_non_productive_exclusion() {
        let non_productive = NonProductive::new(["TRAIN"]);
        let rows = aggregate(
            &[
                worked("Ana", Some(1), 100, "TRAIN"),
                worked("Ana", Some(1), 200, "PROD1"),
            ],
            &non_productive,
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_secs, 300);
        assert_eq!(rows[0].productive_secs, 200);
        assert_eq!(rows[0].shift1_secs, 300);
    }

    #[test]
    fn test_non_productive_matching_ignores_case() {
        let non_productive = NonProductive::new(DEFAULT_NON_PRODUCTIVE);
        assert!(non_productive.contains(Some("train")));
        assert!(non_productive.contains(Some(" Medic ")));
        assert!(!non_productive.contains(Some("TRAINING")));
        assert!(!non_productive.contains(None));
    }

    #[test]
    fn test_dominant_shift_is_most_frequent() {
        let mut punches = vec![];
        for _ in 0..3 {
            punches.push(worked("Ana", Some(1), 60, "PROD1"));
        }
        for _ in 0..5 {
            punches.push(worked("Ana", Some(2), 60, "PROD1"));
        }
        let rows = aggregate(&punches, &NonProductive::default());
        assert_eq!(rows[0].dominant_shift, Some(2));
    }

    #[test]
    fn test_dominant_shift_tie_goes_to_first_seen() {
        let punches = vec![
            worked("Ana", Some(3), 60, "PROD1"),
            worked("Ana", Some(1), 60, "PROD1"),
            worked("Ana", Some(1), 60, "PROD1"),
            worked("Ana", Some(3), 60, "PROD1"),
        ];
        let rows = aggregate(&punches, &NonProductive::default());
        assert_eq!(rows[0].dominant_shift, Some(3));
    }

    #[test]
    fn test_unknown_shift_counts_only_in_total() {
        let rows = aggregate(
            &[
                worked("Ana", None, 50, "PROD1"),
                worked("Ana", Some(4), 70, "PROD1"),
                worked("Ana", Some(2), 30, "PROD1"),
            ],
            &NonProductive::default(),
        );
        let row = &rows[0];
        assert_eq!((row.shift1_secs, row.shift2_secs, row.shift3_secs), (0, 30, 0));
        assert_eq!(row.total_secs, 150);
    }

    #[test]
    fn test_sums_saturate_on_huge_durations() {
        let rows = aggregate(
            &[
                worked("Ana", Some(1), i64::MAX, "PROD1"),
                worked("Ana", Some(1), 60, "PROD1"),
            ],
            &NonProductive::default(),
        );
        assert_eq!(rows[0].shift1_secs, i64::MAX);
        assert_eq!(rows[0].total_secs, i64::MAX);
        assert_eq!(rows[0].productive_secs, i64::MAX);
    }

    #[test]
    fn test_huge_clocked_time_is_capped_at_ingest() {
        let store = PlantStore::open_in_memory().unwrap();
        punch(&store, "2025-01-10", "Ana", 1, "1e300");
        punch(&store, "2025-01-10", "Ana", 1, "60");

        let aggregator = UtilizationAggregator::new(&store, NonProductive::default());
        assert_eq!(aggregator.run(Scope::All).unwrap(), 1);

        let row = &store.utilization_rows(None, None, None).unwrap()[0];
        assert_eq!(row.shift1_secs, MAX_CLOCKED_SECS + 60);
        assert_eq!(row.total_secs, MAX_CLOCKED_SECS + 60);
        assert_eq!(row.productive_secs, Some(MAX_CLOCKED_SECS + 60));
    }

    #[test]
    fn test_today_scope_only_touches_today() {
        let store = PlantStore::open_in_memory().unwrap();
        let today = Local::now().date_naive();
        let yesterday = today.pred_opt().unwrap();
        punch(&store, &today.to_string(), "Ana", 1, "01:00:00");
        punch(&store, &yesterday.to_string(), "Luis", 2, "02:00:00");

        let aggregator = UtilizationAggregator::new(&store, NonProductive::default());
        assert_eq!(aggregator.run(Scope::Today).unwrap(), 1);

        let rows = store.utilization_rows(None, None, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, today);
        assert_eq!(rows[0].employee_key, "Ana");
    }

    #[test]
    fn test_groups_by_date_and_name() {
        let mut later = worked("Ana", Some(1), 10, "PROD1");
        later.date = date("2025-01-11");
        let mut nameless = worked("x", Some(1), 5, "PROD1");
        nameless.employee_name = Some("  ".to_string());

        let rows = aggregate(
            &[
                worked("Ana", Some(1), 10, "PROD1"),
                worked("Luis", Some(1), 20, "PROD1"),
                later,
                nameless,
            ],
            &NonProductive::default(),
        );

        let keys: Vec<_> = rows
            .iter()
            .map(|r| (r.date.to_string(), r.employee_key.clone()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("2025-01-10".to_string(), "Ana".to_string()),
                ("2025-01-10".to_string(), "Luis".to_string()),
                ("2025-01-11".to_string(), "Ana".to_string()),
                ("2025-01-10".to_string(), "id-x".to_string()),
            ]
        );
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let store = PlantStore::open_in_memory().unwrap();
        punch(&store, "2025-01-10", "Ana", 1, "01:00:00");
        punch(&store, "2025-01-10", "Ana", 2, "00:30:00");
        punch(&store, "2025-01-10", "Luis", 3, "");

        let aggregator =
            UtilizationAggregator::new(&store, NonProductive::new(DEFAULT_NON_PRODUCTIVE));
        assert_eq!(aggregator.run(Scope::All).unwrap(), 2);
        let first = store.utilization_rows(None, None, None).unwrap();
        assert_eq!(aggregator.run(Scope::All).unwrap(), 2);
        let second = store.utilization_rows(None, None, None).unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        let ana = second.iter().find(|r| r.employee_key == "Ana").unwrap();
        assert_eq!(ana.total_secs, 5400);
        assert_eq!(ana.productive_secs, Some(5400));
        let luis = second.iter().find(|r| r.employee_key == "Luis").unwrap();
        assert_eq!(luis.total_secs, 0);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.employee_key, b.employee_key);
            assert_eq!(a.total_secs, b.total_secs);
            assert_eq!(a.dominant_shift, b.dominant_shift);
        }
    }

    #[test]
    fn test_pending_queue_drains_every_date() {
        let store = PlantStore::open_in_memory().unwrap();
        punch(&store, "2025-01-10", "Ana", 1, "01:00:00");
        punch(&store, "2025-01-11", "Ana", 1, "02:00:00");
        store.enqueue_recalc(date("2025-01-10")).unwrap();
        store.enqueue_recalc(date("2025-01-11")).unwrap();

        let aggregator = UtilizationAggregator::new(&store, NonProductive::default());
        assert_eq!(aggregator.process_pending_queue().unwrap(), 2);

        assert!(store.pending_recalc_dates().unwrap().is_empty());
        let rows = store.utilization_rows(None, None, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(aggregator.process_pending_queue().unwrap(), 0);
    }

    #[test]
    fn test_pending_queue_failure_keeps_earlier_dates() {
        let store = PlantStore::open_in_memory().unwrap();
        punch(&store, "2025-01-10", "Ana", 1, "01:00:00");
        punch(&store, "2025-01-11", "Ana", 1, "02:00:00");
        store.enqueue_recalc(date("2025-01-10")).unwrap();
        store.enqueue_recalc(date("2025-01-11")).unwrap();
        store
            .conn()
            .execute_batch(
                "CREATE TRIGGER fail_second_day BEFORE INSERT ON ttc
                 WHEN NEW.work_date = '2025-01-11'
                 BEGIN SELECT RAISE(ABORT, 'disk on fire'); END;",
            )
            .unwrap();

        let aggregator = UtilizationAggregator::new(&store, NonProductive::default());
        let err = aggregator.process_pending_queue().unwrap_err();
        assert!(format!("{:#}", err).contains("2025-01-11"));

        assert_eq!(store.pending_recalc_dates().unwrap(), vec![date("2025-01-11")]);
        let rows = store.utilization_rows(None, None, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, date("2025-01-10"));
        assert_eq!(rows[0].total_secs, 3600);
    }
}
