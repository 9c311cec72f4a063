use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

pub const STUDENT_ID: &str = "student_id";
pub const ATTENDANCE: &str = "attendance";
pub const MARKS: &str = "marks";
pub const PREVIOUS_MARKS: &str = "previous_marks";
pub const MARKS_TREND: &str = "marks_trend";
pub const FEES_DUE: &str = "fees_due";
pub const NAME: &str = "name";
pub const EMAIL: &str = "email";
pub const MENTOR_EMAIL: &str = "mentor_email";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Numeric view of the cell. NaN and text that does not parse are `None`.
    pub fn as_f64(&self) -> Option<f64> {
        let number = match self {
            Value::Int(value) => *value as f64,
            Value::Float(value) => *value,
            Value::Text(text) => text.trim().parse::<f64>().ok()?,
        };
        (!number.is_nan()).then_some(number)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) if value.fract() == 0.0 && value.is_finite() => {
                write!(f, "{value:.1}")
            }
            Value::Float(value) => write!(f, "{value}"),
            Value::Text(text) => f.write_str(text),
        }
    }
}

pub type Record = BTreeMap<String, Option<Value>>;

/// Non-null cell lookup. Absent columns and null cells both read as `None`.
pub fn field<'a>(record: &'a Record, column: &str) -> Option<&'a Value> {
    record.get(column).and_then(Option::as_ref)
}

pub fn numeric(record: &Record, column: &str) -> Option<f64> {
    field(record, column).and_then(Value::as_f64)
}

pub fn text(record: &Record, column: &str) -> Option<String> {
    field(record, column)
        .map(ToString::to_string)
        .filter(|value| !value.trim().is_empty())
}

/// Ordered columns plus rows. Every row holds an entry for every column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSet {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl RecordSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a set from positional rows. Short rows are padded with nulls,
    /// extra cells are dropped.
    pub fn from_rows<C: Into<String>>(
        columns: impl IntoIterator<Item = C>,
        rows: impl IntoIterator<Item = Vec<Option<Value>>>,
    ) -> Self {
        let mut set = Self::new(columns.into_iter().map(Into::into).collect());
        for cells in rows {
            let mut cells = cells.into_iter();
            let record = set
                .columns
                .iter()
                .map(|column| (column.clone(), cells.next().flatten()))
                .collect();
            set.rows.push(record);
        }
        set
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|existing| existing == column)
    }

    pub fn push(&mut self, mut record: Record) {
        let row = self
            .columns
            .iter()
            .map(|column| (column.clone(), record.remove(column).flatten()))
            .collect();
        self.rows.push(row);
    }

    pub fn set_column<F>(&mut self, column: &str, mut derive: F)
    where
        F: FnMut(&Record) -> Option<Value>,
    {
        if !self.has_column(column) {
            self.columns.push(column.to_string());
        }
        for row in &mut self.rows {
            let value = derive(row);
            row.insert(column.to_string(), value);
        }
    }

    pub fn values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.rows.iter().map(move |row| field(row, column))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Attendance,
    Marks,
    Fees,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Attendance => "attendance",
            Role::Marks => "marks",
            Role::Fees => "fees",
        })
    }
}

/// Declaration order doubles as report order: High first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RiskLabel {
    High,
    Medium,
    Low,
}

impl RiskLabel {
    pub const ALL: [RiskLabel; 3] = [RiskLabel::High, RiskLabel::Medium, RiskLabel::Low];

    pub fn from_score(score: u8) -> Self {
        match score {
            0 => RiskLabel::Low,
            1 => RiskLabel::Medium,
            _ => RiskLabel::High,
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLabel::High => "High",
            RiskLabel::Medium => "Medium",
            RiskLabel::Low => "Low",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RiskFactors {
    pub low_attendance: bool,
    pub declining_marks: bool,
    pub fees_outstanding: bool,
}

impl RiskFactors {
    pub fn score(&self) -> u8 {
        [self.low_attendance, self.declining_marks, self.fees_outstanding]
            .into_iter()
            .filter(|met| *met)
            .count() as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    #[serde(skip)]
    pub student_id: Option<Value>,
    pub risk_score: u8,
    #[serde(rename = "risk")]
    pub risk_label: RiskLabel,
    #[serde(rename = "risk_factors")]
    pub factors: RiskFactors,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub record: Record,
    #[serde(flatten)]
    pub assessment: RiskAssessment,
}
