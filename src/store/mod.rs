//! Plant datastore with SQLite
//!
//! Every job receives a `&PlantStore`; there is no shared global handle.
//! All summary writes are upserts keyed on the tables' UNIQUE constraints,
//! so re-running a job over the same punches converges to the same rows.

mod schema;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;

use crate::aggregate::productivity::{
    ProductionGroup, ProductivitySummary, MAX_PRODUCT_COUNT, UNKNOWN_AREA_KEY,
};
use crate::aggregate::rebuild::RangeFilter;
use crate::aggregate::utilization::{UtilizationSummary, WorkedPunch};
use crate::ingest::NewPunch;
use crate::shift::ShiftWindow;

pub use schema::SCHEMA;

/// Employee key used by the range rebuild: raw id first, then the name
const REBUILD_EMPLOYEE_KEY: &str = "COALESCE(NULLIF(TRIM(p.employee), ''), p.employee_name, '')";

pub struct PlantStore {
    conn: Connection,
}

impl PlantStore {
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("opening database {}", path.display()))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    // ============================================
    // SHIFT WINDOWS
    // ============================================

    pub fn upsert_shift_window(
        &self,
        id: i64,
        entry_time: &str,
        exit_time: &str,
        active: bool,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO shift_windows (id, entry_time, exit_time, active) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 entry_time = excluded.entry_time,
                 exit_time = excluded.exit_time,
                 active = excluded.active",
            params![id, entry_time, exit_time, active],
        )?;
        Ok(())
    }

    pub fn shift_windows(&self) -> Result<Vec<ShiftWindowRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, entry_time, exit_time, active FROM shift_windows ORDER BY id")?;

        let rows = stmt.query_map([], |row| {
            Ok(ShiftWindowRow {
                id: row.get(0)?,
                entry_time: row.get(1)?,
                exit_time: row.get(2)?,
                active: row.get(3)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Active windows in table order
    pub fn active_shift_windows(&self) -> Result<Vec<ShiftWindow>> {
        Ok(self
            .shift_windows()?
            .into_iter()
            .filter(|w| w.active)
            .map(|w| ShiftWindow::new(w.id, &w.entry_time, &w.exit_time))
            .collect())
    }

    // ============================================
    // PUNCHES
    // ============================================

    /// Insert a punch, or refresh its clocked time if the same content was
    /// imported before
    pub fn upsert_punch(&self, punch: &NewPunch) -> Result<()> {
        self.conn.execute(
            r#"INSERT INTO punches
               (work_date, employee, employee_name, cost_center, area_id, job, phase,
                start_time, end_time, shift_id, time_clocked, clocked_seconds,
                product_number, uniq_hash, imported_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))
               ON CONFLICT(uniq_hash) DO UPDATE SET
                   time_clocked = excluded.time_clocked,
                   clocked_seconds = excluded.clocked_seconds"#,
            params![
                punch.work_date,
                punch.employee,
                punch.employee_name,
                punch.cost_center,
                punch.area_id,
                punch.job,
                punch.phase,
                punch.start_time,
                punch.end_time,
                punch.shift_id,
                punch.time_clocked,
                punch.clocked_seconds(),
                punch.product_number,
                punch.content_hash(),
            ],
        )?;
        Ok(())
    }

    /// Punches still waiting for a shift: `(id, start_time)`
    pub fn unassigned_punches(&self) -> Result<Vec<(i64, Option<String>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, start_time FROM punches WHERE shift_id IS NULL ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Write `(punch id, shift id)` pairs in one transaction. Either every
    /// update commits or none does.
    pub fn apply_shift_assignments(&self, assignments: &[(i64, i64)]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare("UPDATE punches SET shift_id = ?1 WHERE id = ?2")?;
            for (punch_id, shift_id) in assignments {
                updated += stmt.execute(params![shift_id, punch_id])?;
            }
        }
        // dropping an uncommitted transaction rolls it back
        tx.commit()?;
        Ok(updated)
    }

    pub fn punch_shift(&self, punch_id: i64) -> Result<Option<i64>> {
        let shift = self
            .conn
            .query_row(
                "SELECT shift_id FROM punches WHERE id = ?",
                params![punch_id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?;
        Ok(shift.flatten())
    }

    pub fn punch_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM punches", [], |row| row.get(0))?)
    }

    // ============================================
    // PRODUCTIVITY
    // ============================================

    /// Production count per (date, area, shift). Blank or non-numeric counts
    /// add zero; each count is clamped to `0..=MAX_PRODUCT_COUNT`.
    pub fn production_by_shift(&self, date: Option<NaiveDate>) -> Result<Vec<ProductionGroup>> {
        let sql = format!(
            r#"SELECT work_date, area_id, shift_id,
                      SUM(MIN(MAX(CAST(COALESCE(NULLIF(TRIM(product_number), ''), '0') AS INTEGER), 0), {cap}))
               FROM punches
               WHERE ?1 IS NULL OR work_date = ?1
               GROUP BY work_date, area_id, shift_id
               ORDER BY work_date, area_id, shift_id"#,
            cap = MAX_PRODUCT_COUNT
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let rows = stmt.query_map(params![date], |row| {
            Ok(ProductionGroup {
                date: row.get(0)?,
                area: row.get(1)?,
                shift: row.get(2)?,
                count: row.get(3)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn upsert_productivity(&self, summary: &ProductivitySummary) -> Result<()> {
        self.conn.execute(
            r#"INSERT INTO productnb
               (work_date, area_id, area_key, shift1, shift2, shift3, total, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))
               ON CONFLICT(work_date, area_key) DO UPDATE SET
                   shift1 = excluded.shift1,
                   shift2 = excluded.shift2,
                   shift3 = excluded.shift3,
                   total = excluded.total,
                   updated_at = datetime('now')"#,
            params![
                summary.date,
                summary.area,
                summary.area.unwrap_or(UNKNOWN_AREA_KEY),
                summary.shift1,
                summary.shift2,
                summary.shift3,
                summary.total,
            ],
        )?;
        Ok(())
    }

    pub fn productivity_rows(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<ProductivitySummary>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT work_date, area_id, shift1, shift2, shift3, total
               FROM productnb
               WHERE (?1 IS NULL OR work_date >= ?1) AND (?2 IS NULL OR work_date <= ?2)
               ORDER BY work_date DESC, area_key"#,
        )?;

        let rows = stmt.query_map(params![from, to], |row| {
            Ok(ProductivitySummary {
                date: row.get(0)?,
                area: row.get(1)?,
                shift1: row.get(2)?,
                shift2: row.get(3)?,
                shift3: row.get(4)?,
                total: row.get(5)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ============================================
    // UTILIZATION (TTC)
    // ============================================

    /// Worked punches in id order, so grouping sees them deterministically
    pub fn worked_punches(&self, date: Option<NaiveDate>) -> Result<Vec<WorkedPunch>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT work_date, employee, employee_name, shift_id, clocked_seconds, cost_center
               FROM punches
               WHERE ?1 IS NULL OR work_date = ?1
               ORDER BY id"#,
        )?;

        let rows = stmt.query_map(params![date], |row| {
            Ok(WorkedPunch {
                date: row.get(0)?,
                employee: row.get(1)?,
                employee_name: row.get(2)?,
                shift: row.get(3)?,
                seconds: row.get(4)?,
                cost_center: row.get(5)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Overwrite the sums for one (date, employee) row. Derived fractions are
    /// cleared because their inputs changed.
    pub fn upsert_utilization(&self, summary: &UtilizationSummary) -> Result<()> {
        self.conn.execute(
            r#"INSERT INTO ttc
               (work_date, employee_key, employee, employee_name, shift1_secs, shift2_secs,
                shift3_secs, total_secs, productive_secs, dominant_shift, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))
               ON CONFLICT(work_date, employee_key) DO UPDATE SET
                   employee = excluded.employee,
                   employee_name = excluded.employee_name,
                   shift1_secs = excluded.shift1_secs,
                   shift2_secs = excluded.shift2_secs,
                   shift3_secs = excluded.shift3_secs,
                   total_secs = excluded.total_secs,
                   productive_secs = excluded.productive_secs,
                   dominant_shift = excluded.dominant_shift,
                   tu_shift1 = NULL,
                   tu_shift2 = NULL,
                   tu_shift3 = NULL,
                   pu_shift1 = NULL,
                   pu_shift2 = NULL,
                   pu_shift3 = NULL,
                   updated_at = datetime('now')"#,
            params![
                summary.date,
                summary.employee_key,
                summary.employee,
                summary.employee_name,
                summary.shift1_secs,
                summary.shift2_secs,
                summary.shift3_secs,
                summary.total_secs,
                summary.productive_secs,
                summary.dominant_shift,
            ],
        )?;
        Ok(())
    }

    /// Bulk aggregate-and-upsert of ttc rows for a date range, keyed by raw
    /// employee id. Returns the number of rows inserted or updated.
    ///
    /// The rebuild computes neither the productive total nor the dominant
    /// shift, so both are cleared on rows it overwrites.
    pub fn rebuild_utilization(&self, filter: &RangeFilter) -> Result<usize> {
        let sql = format!(
            r#"INSERT INTO ttc
               (work_date, employee_key, employee, employee_name, shift1_secs, shift2_secs,
                shift3_secs, total_secs, updated_at)
               SELECT p.work_date,
                      {key} AS rebuild_key,
                      MAX(p.employee),
                      MAX(COALESCE(p.employee_name, p.employee)),
                      SUM(CASE WHEN p.shift_id = 1 THEN p.clocked_seconds ELSE 0 END),
                      SUM(CASE WHEN p.shift_id = 2 THEN p.clocked_seconds ELSE 0 END),
                      SUM(CASE WHEN p.shift_id = 3 THEN p.clocked_seconds ELSE 0 END),
                      SUM(p.clocked_seconds),
                      datetime('now')
               FROM punches p
               WHERE p.work_date BETWEEN ?1 AND ?2
                 AND (?3 IS NULL OR p.area_id = ?3)
                 AND (?4 IS NULL OR p.cost_center = ?4)
               GROUP BY p.work_date, rebuild_key
               ON CONFLICT(work_date, employee_key) DO UPDATE SET
                   employee = excluded.employee,
                   employee_name = COALESCE(excluded.employee_name, ttc.employee_name),
                   shift1_secs = excluded.shift1_secs,
                   shift2_secs = excluded.shift2_secs,
                   shift3_secs = excluded.shift3_secs,
                   total_secs = excluded.total_secs,
                   productive_secs = NULL,
                   dominant_shift = NULL,
                   tu_shift1 = NULL,
                   tu_shift2 = NULL,
                   tu_shift3 = NULL,
                   pu_shift1 = NULL,
                   pu_shift2 = NULL,
                   pu_shift3 = NULL,
                   updated_at = datetime('now')"#,
            key = REBUILD_EMPLOYEE_KEY
        );

        let affected = self.conn.execute(
            &sql,
            params![filter.from, filter.to, filter.area, filter.cost_center],
        )?;
        Ok(affected)
    }

    /// Recompute derived fractions for ttc rows in a date range. A fraction
    /// is NULL when its shift or the row total is zero.
    pub fn recompute_utilization_ratios(&self, filter: &RangeFilter) -> Result<usize> {
        let sql = format!(
            r#"UPDATE ttc SET
                   tu_shift1 = CASE WHEN shift1_secs > 0 AND total_secs > 0
                                    THEN CAST(shift1_secs AS REAL) / total_secs END,
                   tu_shift2 = CASE WHEN shift2_secs > 0 AND total_secs > 0
                                    THEN CAST(shift2_secs AS REAL) / total_secs END,
                   pu_shift1 = CASE WHEN shift1_secs > 0 AND total_secs > 0
                                    THEN CAST(shift1_secs AS REAL) / total_secs END,
                   pu_shift2 = CASE WHEN shift2_secs > 0 AND total_secs > 0
                                    THEN CAST(shift2_secs AS REAL) / total_secs END,
                   tu_shift3 = CASE WHEN shift3_secs > 0 AND total_secs > 0
                                    THEN CAST(shift3_secs AS REAL) / total_secs END,
                   pu_shift3 = CASE WHEN shift3_secs > 0 AND total_secs > 0
                                    THEN CAST(shift3_secs AS REAL) / total_secs END
               WHERE work_date BETWEEN ?1 AND ?2
                 AND ((?3 IS NULL AND ?4 IS NULL) OR EXISTS (
                     SELECT 1 FROM punches p
                     WHERE p.work_date = ttc.work_date
                       AND {key} = ttc.employee_key
                       AND (?3 IS NULL OR p.area_id = ?3)
                       AND (?4 IS NULL OR p.cost_center = ?4)))"#,
            key = REBUILD_EMPLOYEE_KEY
        );

        let updated = self.conn.execute(
            &sql,
            params![filter.from, filter.to, filter.area, filter.cost_center],
        )?;
        Ok(updated)
    }

    pub fn utilization_rows(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        employee: Option<&str>,
    ) -> Result<Vec<UtilizationRow>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT work_date, employee_key, employee, employee_name, shift1_secs,
                      shift2_secs, shift3_secs, total_secs, productive_secs, dominant_shift,
                      tu_shift1, tu_shift2, tu_shift3, pu_shift1, pu_shift2, pu_shift3
               FROM ttc
               WHERE (?1 IS NULL OR work_date >= ?1)
                 AND (?2 IS NULL OR work_date <= ?2)
                 AND (?3 IS NULL OR employee_key = ?3 OR employee_name = ?3)
               ORDER BY work_date DESC, employee_key"#,
        )?;

        let rows = stmt.query_map(params![from, to, employee], |row| {
            Ok(UtilizationRow {
                date: row.get(0)?,
                employee_key: row.get(1)?,
                employee: row.get(2)?,
                employee_name: row.get(3)?,
                shift1_secs: row.get(4)?,
                shift2_secs: row.get(5)?,
                shift3_secs: row.get(6)?,
                total_secs: row.get(7)?,
                productive_secs: row.get(8)?,
                dominant_shift: row.get(9)?,
                tu_shift1: row.get(10)?,
                tu_shift2: row.get(11)?,
                tu_shift3: row.get(12)?,
                pu_shift1: row.get(13)?,
                pu_shift2: row.get(14)?,
                pu_shift3: row.get(15)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ============================================
    // RECALCULATION QUEUE
    // ============================================

    /// Mark a date for recalculation, re-arming it if it was already drained
    pub fn enqueue_recalc(&self, date: NaiveDate) -> Result<()> {
        self.conn.execute(
            "INSERT INTO recalc_queue (work_date, pending, queued_at) VALUES (?1, TRUE, datetime('now'))
             ON CONFLICT(work_date) DO UPDATE SET pending = TRUE, queued_at = datetime('now')",
            params![date],
        )?;
        Ok(())
    }

    pub fn pending_recalc_dates(&self) -> Result<Vec<NaiveDate>> {
        let mut stmt = self
            .conn
            .prepare("SELECT work_date FROM recalc_queue WHERE pending = TRUE ORDER BY work_date")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn clear_recalc(&self, date: NaiveDate) -> Result<()> {
        self.conn.execute(
            "UPDATE recalc_queue SET pending = FALSE WHERE work_date = ?",
            params![date],
        )?;
        Ok(())
    }

    pub fn recalc_entries(&self) -> Result<Vec<RecalcEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT work_date, pending FROM recalc_queue ORDER BY work_date")?;
        let rows = stmt.query_map([], |row| {
            Ok(RecalcEntry {
                date: row.get(0)?,
                pending: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

// ============================================
// ROW TYPES
// ============================================

#[derive(Debug, Clone, Serialize)]
pub struct ShiftWindowRow {
    pub id: i64,
    pub entry_time: String,
    pub exit_time: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UtilizationRow {
    pub date: NaiveDate,
    pub employee_key: String,
    pub employee: Option<String>,
    pub employee_name: Option<String>,
    pub shift1_secs: i64,
    pub shift2_secs: i64,
    pub shift3_secs: i64,
    pub total_secs: i64,
    pub productive_secs: Option<i64>,
    pub dominant_shift: Option<i64>,
    pub tu_shift1: Option<f64>,
    pub tu_shift2: Option<f64>,
    pub tu_shift3: Option<f64>,
    pub pu_shift1: Option<f64>,
    pub pu_shift2: Option<f64>,
    pub pu_shift3: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecalcEntry {
    pub date: NaiveDate,
    pub pending: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_schema_is_reentrant() {
        let store = PlantStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        assert_eq!(store.punch_count().unwrap(), 0);
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/plant.db");
        PlantStore::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_shift_windows_roundtrip_and_active_filter() {
        let store = PlantStore::open_in_memory().unwrap();
        store.upsert_shift_window(2, "14:00:00", "21:59:59", true).unwrap();
        store.upsert_shift_window(1, "06:00:00", "13:59:59", true).unwrap();
        store.upsert_shift_window(9, "00:00:00", "23:59:59", false).unwrap();

        let all = store.shift_windows().unwrap();
        assert_eq!(all.iter().map(|w| w.id).collect::<Vec<_>>(), vec![1, 2, 9]);

        let active = store.active_shift_windows().unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0], ShiftWindow::new(1, "06:00:00", "13:59:59"));

        store.upsert_shift_window(9, "00:00:00", "23:59:59", true).unwrap();
        assert_eq!(store.active_shift_windows().unwrap().len(), 3);
    }

    #[test]
    fn test_reimport_is_idempotent() {
        let store = PlantStore::open_in_memory().unwrap();
        let mut punch = NewPunch::new(date("2025-01-10"));
        punch.employee = Some("E1".to_string());
        punch.product_number = Some("4".to_string());
        punch.time_clocked = Some("01:00:00".to_string());

        store.upsert_punch(&punch).unwrap();
        punch.time_clocked = Some("02:00:00".to_string());
        store.upsert_punch(&punch).unwrap();

        assert_eq!(store.punch_count().unwrap(), 1);
        let worked = store.worked_punches(None).unwrap();
        assert_eq!(worked[0].seconds, 7200);
    }

    #[test]
    fn test_production_counts_are_coerced() {
        let store = PlantStore::open_in_memory().unwrap();
        for (i, count) in ["5", "", "abc", "-3", " 7 ", "2.9"].iter().enumerate() {
            let mut punch = NewPunch::new(date("2025-01-10"));
            punch.area_id = Some(1);
            punch.shift_id = Some(1);
            punch.job = Some(format!("J{}", i));
            punch.product_number = Some(count.to_string());
            store.upsert_punch(&punch).unwrap();
        }

        let groups = store.production_by_shift(None).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].count, 5 + 7 + 2);
    }

    #[test]
    fn test_recalc_queue_rearms() {
        let store = PlantStore::open_in_memory().unwrap();
        let d = date("2025-01-10");
        store.enqueue_recalc(d).unwrap();
        store.clear_recalc(d).unwrap();
        assert!(store.pending_recalc_dates().unwrap().is_empty());

        store.enqueue_recalc(d).unwrap();
        assert_eq!(store.pending_recalc_dates().unwrap(), vec![d]);
        assert_eq!(
            store.recalc_entries().unwrap(),
            vec![RecalcEntry {
                date: d,
                pending: true
            }]
        );
    }
}
