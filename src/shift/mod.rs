//! Shift windows and punch classification
//!
//! A shift window is a daily time range. When the exit time is earlier than
//! the entry time the window crosses midnight (e.g. 22:00 → 06:00).

pub mod assigner;

pub use assigner::ShiftAssigner;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::PlantError;

pub const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

/// How a time is resolved when more than one window matches it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowResolution {
    /// Windows are tried in table order; the first match wins
    #[default]
    FirstMatch,
    /// The shortest matching window wins, ties in table order
    Narrowest,
    /// Overlapping windows are refused when the table is loaded
    RejectOverlaps,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftWindow {
    pub id: i64,
    /// Seconds since midnight
    pub entry: u32,
    /// Seconds since midnight
    pub exit: u32,
}

impl ShiftWindow {
    /// Times past `24:00:00` wrap into the next day (`25:00:00` is `01:00:00`)
    pub fn new(id: i64, entry: &str, exit: &str) -> Self {
        Self {
            id,
            entry: seconds_since_midnight(entry) % SECONDS_PER_DAY,
            exit: seconds_since_midnight(exit) % SECONDS_PER_DAY,
        }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.entry > self.exit
    }

    pub fn contains(&self, t: u32) -> bool {
        if self.wraps_midnight() {
            t >= self.entry || t <= self.exit
        } else {
            self.entry <= t && t <= self.exit
        }
    }

    /// Window length in seconds
    pub fn span(&self) -> u32 {
        if self.wraps_midnight() {
            SECONDS_PER_DAY - self.entry + self.exit
        } else {
            self.exit - self.entry
        }
    }

    /// The window as non-wrapping `[start, end]` ranges within one day
    fn ranges(&self) -> Vec<(u32, u32)> {
        if self.wraps_midnight() {
            vec![(self.entry, SECONDS_PER_DAY), (0, self.exit)]
        } else {
            vec![(self.entry, self.exit)]
        }
    }

    /// True when both windows cover a common stretch of positive length.
    /// Sharing a single boundary instant does not count.
    pub fn overlaps(&self, other: &ShiftWindow) -> bool {
        self.ranges().iter().any(|&(a_start, a_end)| {
            other
                .ranges()
                .iter()
                .any(|&(b_start, b_end)| a_start.max(b_start) < a_end.min(b_end))
        })
    }
}

/// The active shift windows, in table order, with their resolution rule
#[derive(Debug, Clone)]
pub struct ShiftTable {
    windows: Vec<ShiftWindow>,
    resolution: WindowResolution,
}

impl ShiftTable {
    pub fn new(
        windows: Vec<ShiftWindow>,
        resolution: WindowResolution,
    ) -> Result<Self, PlantError> {
        if resolution == WindowResolution::RejectOverlaps {
            for (i, a) in windows.iter().enumerate() {
                if let Some(b) = windows[i + 1..].iter().find(|b| a.overlaps(b)) {
                    return Err(PlantError::OverlappingShiftWindows {
                        first: a.id,
                        second: b.id,
                    });
                }
            }
        }
        Ok(Self {
            windows,
            resolution,
        })
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Shift id for a clock time given in seconds since midnight
    pub fn classify_secs(&self, t: u32) -> Option<i64> {
        let mut matching = self.windows.iter().filter(|w| w.contains(t));
        match self.resolution {
            WindowResolution::FirstMatch | WindowResolution::RejectOverlaps => {
                matching.next().map(|w| w.id)
            }
            // min_by_key keeps the first of equal elements
            WindowResolution::Narrowest => matching.min_by_key(|w| w.span()).map(|w| w.id),
        }
    }

    /// Shift id for a `HH:MM:SS` clock time. Missing or malformed times are
    /// read as midnight.
    pub fn classify(&self, time: Option<&str>) -> Option<i64> {
        self.classify_secs(time.map(seconds_since_midnight).unwrap_or(0))
    }
}

/// Convert `HH:MM:SS` to seconds since midnight.
///
/// Every component that fails to parse counts as zero, so garbage reads as
/// midnight. Components are read up to the first non-digit (`"07x"` → 7).
pub fn seconds_since_midnight(value: &str) -> u32 {
    let mut parts = value.trim().split(':').map(leading_number);
    let h = parts.next().unwrap_or(0);
    let m = parts.next().unwrap_or(0);
    let s = parts.next().unwrap_or(0);
    h.saturating_mul(3600)
        .saturating_add(m.saturating_mul(60))
        .saturating_add(s)
}

pub(crate) fn leading_number(part: &str) -> u32 {
    let digits: String = part
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// Validate a clock time given as `HH:MM:SS` or `HH:MM`, normalized to
/// `HH:MM:SS`
pub fn parse_clock_time(value: &str) -> Result<String, PlantError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map(|t| t.format("%H:%M:%S").to_string())
        .map_err(|_| PlantError::InvalidTime(value.to_string()))
}

/// Format seconds since midnight back to `HH:MM:SS`
pub fn format_secs(secs: u32) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
