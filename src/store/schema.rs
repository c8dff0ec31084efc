//! SQLite schema definition
//!
//! - punches: raw time-clock rows written by ingestion
//! - shift_windows: operator-configured shifts
//! - productnb / ttc: summaries rebuilt by the aggregation jobs
//! - recalc_queue: dates whose ttc rows must be recomputed

pub const SCHEMA: &str = r#"
-- ============================================
-- RAW PUNCHES
-- ============================================

CREATE TABLE IF NOT EXISTS punches (
    id INTEGER PRIMARY KEY,
    work_date TEXT NOT NULL,               -- YYYY-MM-DD
    employee TEXT,                         -- raw employee identifier
    employee_name TEXT,
    cost_center TEXT,
    area_id INTEGER,                       -- NULL = unknown area
    job TEXT,
    phase TEXT,
    start_time TEXT,                       -- HH:MM:SS
    end_time TEXT,
    shift_id INTEGER,                      -- NULL until classified
    time_clocked TEXT,                     -- raw duration as imported
    clocked_seconds INTEGER NOT NULL DEFAULT 0,
    product_number TEXT,                   -- raw count, may be blank
    uniq_hash TEXT NOT NULL UNIQUE,        -- content hash, re-import key
    imported_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

-- ============================================
-- SHIFT WINDOWS
-- ============================================

-- exit_time < entry_time means the window crosses midnight
CREATE TABLE IF NOT EXISTS shift_windows (
    id INTEGER PRIMARY KEY,
    entry_time TEXT NOT NULL,
    exit_time TEXT NOT NULL,
    active BOOLEAN NOT NULL DEFAULT TRUE
);

-- ============================================
-- PRODUCTIVITY SUMMARY
-- ============================================

CREATE TABLE IF NOT EXISTS productnb (
    id INTEGER PRIMARY KEY,
    work_date TEXT NOT NULL,
    area_id INTEGER,
    area_key INTEGER NOT NULL,             -- area_id, or -1 for unknown area
    shift1 INTEGER NOT NULL DEFAULT 0,
    shift2 INTEGER NOT NULL DEFAULT 0,
    shift3 INTEGER NOT NULL DEFAULT 0,
    total INTEGER NOT NULL DEFAULT 0,
    updated_at DATETIME,
    UNIQUE(work_date, area_key)
);

-- ============================================
-- UTILIZATION SUMMARY (TTC)
-- ============================================

CREATE TABLE IF NOT EXISTS ttc (
    id INTEGER PRIMARY KEY,
    work_date TEXT NOT NULL,
    employee_key TEXT NOT NULL,            -- employee name (jobs) or raw id (rebuild)
    employee TEXT,
    employee_name TEXT,
    shift1_secs INTEGER NOT NULL DEFAULT 0,
    shift2_secs INTEGER NOT NULL DEFAULT 0,
    shift3_secs INTEGER NOT NULL DEFAULT 0,
    total_secs INTEGER NOT NULL DEFAULT 0,
    productive_secs INTEGER,               -- total minus non-productive cost centers
    dominant_shift INTEGER,
    tu_shift1 REAL,                        -- derived, NULL until the rebuild ratio pass
    tu_shift2 REAL,
    tu_shift3 REAL,
    pu_shift1 REAL,
    pu_shift2 REAL,
    pu_shift3 REAL,
    updated_at DATETIME,
    UNIQUE(work_date, employee_key)
);

-- ============================================
-- RECALCULATION QUEUE
-- ============================================

CREATE TABLE IF NOT EXISTS recalc_queue (
    work_date TEXT PRIMARY KEY,
    pending BOOLEAN NOT NULL DEFAULT TRUE,
    queued_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

-- ============================================
-- INDEXES
-- ============================================

CREATE INDEX IF NOT EXISTS idx_punches_date ON punches(work_date);
CREATE INDEX IF NOT EXISTS idx_punches_unassigned ON punches(id) WHERE shift_id IS NULL;
CREATE INDEX IF NOT EXISTS idx_punches_employee ON punches(employee, work_date);
CREATE INDEX IF NOT EXISTS idx_ttc_date ON ttc(work_date);
CREATE INDEX IF NOT EXISTS idx_recalc_pending ON recalc_queue(pending) WHERE pending = TRUE;
"#;
