//! Punch ingestion
//!
//! Loads a JSON array of punches, upserts them by content hash, queues every
//! touched date for utilization recalculation and then runs the shift
//! assigner so new punches are classified straight away.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

use crate::shift::{leading_number, ShiftAssigner, WindowResolution};
use crate::store::PlantStore;

/// A raw time-clock punch as delivered by the importer
#[derive(Debug, Clone, Deserialize)]
pub struct NewPunch {
    pub work_date: NaiveDate,
    #[serde(default, deserialize_with = "text_or_number")]
    pub employee: Option<String>,
    #[serde(default)]
    pub employee_name: Option<String>,
    #[serde(default)]
    pub cost_center: Option<String>,
    #[serde(default, deserialize_with = "optional_int")]
    pub area_id: Option<i64>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub job: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub phase: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default, deserialize_with = "optional_int")]
    pub shift_id: Option<i64>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub time_clocked: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub product_number: Option<String>,
}

impl NewPunch {
    pub fn new(work_date: NaiveDate) -> Self {
        Self {
            work_date,
            employee: None,
            employee_name: None,
            cost_center: None,
            area_id: None,
            job: None,
            phase: None,
            start_time: None,
            end_time: None,
            shift_id: None,
            time_clocked: None,
            product_number: None,
        }
    }

    /// Identity of a punch across re-imports: SHA-256 over date, product
    /// number, start, end, cost center, employee, job and phase. Absent
    /// fields hash as empty strings.
    pub fn content_hash(&self) -> String {
        let date = self.work_date.format("%Y-%m-%d").to_string();
        let fields = [
            Some(date.as_str()),
            self.product_number.as_deref(),
            self.start_time.as_deref(),
            self.end_time.as_deref(),
            self.cost_center.as_deref(),
            self.employee.as_deref(),
            self.job.as_deref(),
            self.phase.as_deref(),
        ];
        let joined = fields
            .iter()
            .map(|f| f.unwrap_or("").trim())
            .collect::<Vec<_>>()
            .join("|");

        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn clocked_seconds(&self) -> i64 {
        self.time_clocked.as_deref().map(duration_secs).unwrap_or(0)
    }

    fn has_product_number(&self) -> bool {
        self.product_number
            .as_deref()
            .map_or(false, |p| !p.trim().is_empty())
    }
}

/// Longest duration a single punch may carry: one week
pub const MAX_CLOCKED_SECS: i64 = 7 * 24 * 3600;

/// Parse a clocked duration: `H:MM:SS` (hours may exceed 24) or a plain
/// number of seconds. Blank or unreadable values are zero; anything longer
/// than [`MAX_CLOCKED_SECS`] is capped.
pub fn duration_secs(value: &str) -> i64 {
    let value = value.trim();
    let secs = if value.contains(':') {
        let mut parts = value.split(':').map(|p| i64::from(leading_number(p)));
        let h = parts.next().unwrap_or(0);
        let m = parts.next().unwrap_or(0);
        let s = parts.next().unwrap_or(0);
        h * 3600 + m * 60 + s
    } else {
        value
            .parse::<f64>()
            .ok()
            .filter(|s| s.is_finite() && *s > 0.0)
            .map_or(0, |s| s.min(MAX_CLOCKED_SECS as f64) as i64)
    };
    secs.min(MAX_CLOCKED_SECS)
}

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Integer given as a number or numeric text; blank text is absent
fn optional_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("expected an integer, got {}", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected an integer, got '{}'", s))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected an integer, got {}",
            other
        ))),
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct IngestReport {
    pub read: usize,
    pub skipped: usize,
    pub upserted: usize,
    pub dates_queued: Vec<NaiveDate>,
    pub shifts_assigned: usize,
}

pub fn read_punches(path: &Path) -> Result<Vec<NewPunch>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let punches: Vec<NewPunch> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing punches from {}", path.display()))?;
    Ok(punches)
}

/// Upsert punches and queue their dates. Punches without a product number
/// are skipped.
pub fn ingest_punches(store: &PlantStore, punches: &[NewPunch]) -> Result<IngestReport> {
    let mut report = IngestReport {
        read: punches.len(),
        ..Default::default()
    };
    let mut dates = BTreeSet::new();

    for punch in punches {
        if !punch.has_product_number() {
            report.skipped += 1;
            continue;
        }
        store.upsert_punch(punch)?;
        report.upserted += 1;
        dates.insert(punch.work_date);
    }

    for date in &dates {
        store.enqueue_recalc(*date)?;
    }
    report.dates_queued = dates.into_iter().collect();

    info!(
        read = report.read,
        upserted = report.upserted,
        skipped = report.skipped,
        dates = report.dates_queued.len(),
        "punches ingested"
    );
    Ok(report)
}

/// Ingest a file and classify whatever is still unassigned
pub fn ingest_file(
    store: &PlantStore,
    path: &Path,
    resolution: WindowResolution,
) -> Result<IngestReport> {
    let punches = read_punches(path)?;
    let mut report = ingest_punches(store, &punches)?;
    report.shifts_assigned = ShiftAssigner::new(store, resolution).assign()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_duration_secs() {
        assert_eq!(duration_secs("01:30:00"), 5400);
        assert_eq!(duration_secs("26:00:00"), 26 * 3600);
        assert_eq!(duration_secs("0:45"), 45 * 60);
        assert_eq!(duration_secs("900"), 900);
        assert_eq!(duration_secs(""), 0);
        assert_eq!(duration_secs("  "), 0);
        assert_eq!(duration_secs("n/a"), 0);
        assert_eq!(duration_secs("-20"), 0);
        assert_eq!(duration_secs("1e300"), MAX_CLOCKED_SECS);
        assert_eq!(duration_secs("4294967295:59:59"), MAX_CLOCKED_SECS);
    }

    #[test]
    fn test_content_hash_tracks_identity_fields() {
        let mut a = NewPunch::new(date("2025-01-10"));
        a.employee = Some("E1".to_string());
        a.product_number = Some("5".to_string());
        let mut b = a.clone();
        b.time_clocked = Some("01:00:00".to_string());
        b.area_id = Some(3);
        assert_eq!(a.content_hash(), b.content_hash());

        b.phase = Some("20".to_string());
        assert_ne!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }

    #[test]
    fn test_deserialize_numbers_as_text() {
        let json = r#"[{
            "work_date": "2025-01-10",
            "employee": 1042,
            "employee_name": "Ana Ruiz",
            "area_id": 7,
            "product_number": 12,
            "time_clocked": "02:00:00",
            "start_time": "06:15:00"
        }]"#;
        let punches: Vec<NewPunch> = serde_json::from_str(json).unwrap();
        assert_eq!(punches[0].employee.as_deref(), Some("1042"));
        assert_eq!(punches[0].product_number.as_deref(), Some("12"));
        assert_eq!(punches[0].clocked_seconds(), 7200);
        assert_eq!(punches[0].job, None);
    }

    #[test]
    fn test_blank_ids_read_as_absent() {
        let json = r#"[
            {"work_date": "2025-01-10", "shift_id": "", "area_id": "12"},
            {"work_date": "2025-01-10", "shift_id": 2, "area_id": null}
        ]"#;
        let punches: Vec<NewPunch> = serde_json::from_str(json).unwrap();
        assert_eq!((punches[0].shift_id, punches[0].area_id), (None, Some(12)));
        assert_eq!((punches[1].shift_id, punches[1].area_id), (Some(2), None));

        let bad = r#"[{"work_date": "2025-01-10", "shift_id": "night"}]"#;
        assert!(serde_json::from_str::<Vec<NewPunch>>(bad).is_err());
    }

    #[test]
    fn test_ingest_file_queues_dates_and_assigns() {
        let store = PlantStore::open_in_memory().unwrap();
        store.upsert_shift_window(1, "06:00:00", "13:59:59", true).unwrap();
        store.upsert_shift_window(3, "22:00:00", "05:59:59", true).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"work_date": "2025-01-10", "employee": "E1", "product_number": "4", "start_time": "07:00:00"}},
                {{"work_date": "2025-01-10", "employee": "E1", "product_number": "4", "start_time": "07:00:00"}},
                {{"work_date": "2025-01-11", "employee": "E2", "product_number": "1", "start_time": "23:10:00"}},
                {{"work_date": "2025-01-11", "employee": "E3", "product_number": "", "start_time": "08:00:00"}},
                {{"work_date": "2025-01-12", "employee": "E4", "product_number": "2", "start_time": "16:00:00"}}
            ]"#
        )
        .unwrap();

        let report = ingest_file(&store, file.path(), WindowResolution::FirstMatch).unwrap();
        assert_eq!(report.read, 5);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.upserted, 4);
        assert_eq!(store.punch_count().unwrap(), 3);
        assert_eq!(
            report.dates_queued,
            vec![date("2025-01-10"), date("2025-01-11"), date("2025-01-12")]
        );
        // 16:00 falls in no active window
        assert_eq!(report.shifts_assigned, 2);
        assert_eq!(store.unassigned_punches().unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let store = PlantStore::open_in_memory().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(ingest_file(&store, file.path(), WindowResolution::FirstMatch).is_err());
    }
}
