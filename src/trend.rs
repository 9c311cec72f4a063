//! Marks trend inference.
//!
//! Rules, first match wins:
//! 1. a `marks_trend` column already present is authoritative;
//! 2. `marks` and `previous_marks` present: compare the two per row;
//! 3. only `marks` present: below 50 reads as `down`, anything else `up`;
//! 4. no `marks` column: every row is `stable`.

use crate::models::{field, numeric, Record, RecordSet, Value, MARKS, MARKS_TREND, PREVIOUS_MARKS};

pub const MARKS_DOWN_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Stable => "stable",
        }
    }
}

impl From<Trend> for Value {
    fn from(trend: Trend) -> Self {
        Value::Text(trend.as_str().to_string())
    }
}

pub fn infer_trend(marks: &RecordSet) -> RecordSet {
    let mut out = marks.clone();
    if marks.has_column(MARKS_TREND) {
        return out;
    }

    let has_marks = marks.has_column(MARKS);
    let has_previous = marks.has_column(PREVIOUS_MARKS);
    let rule: fn(&Record) -> Trend = match (has_marks, has_previous) {
        (true, true) => compare_trend,
        (true, false) => threshold_trend,
        (false, _) => |_: &Record| Trend::Stable,
    };
    out.set_column(MARKS_TREND, |row| Some(rule(row).into()));
    out
}

/// Current against previous marks. A missing or non-numeric side is `stable`.
pub fn compare_trend(record: &Record) -> Trend {
    match (numeric(record, MARKS), numeric(record, PREVIOUS_MARKS)) {
        (Some(current), Some(previous)) if current < previous => Trend::Down,
        (Some(current), Some(previous)) if current > previous => Trend::Up,
        _ => Trend::Stable,
    }
}

/// Single-column heuristic. A null mark reads as `up` (the two-column rule
/// reads it as `stable`); only a present but non-numeric mark is `stable`.
pub fn threshold_trend(record: &Record) -> Trend {
    match field(record, MARKS) {
        None => Trend::Up,
        Some(value) => match value.as_f64() {
            Some(mark) if mark < MARKS_DOWN_THRESHOLD => Trend::Down,
            Some(_) => Trend::Up,
            None => Trend::Stable,
        },
    }
}
