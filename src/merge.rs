use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{KeyKind, MergeError};
use crate::models::{field, Record, RecordSet, Value, ATTENDANCE, FEES_DUE, MARKS_TREND, STUDENT_ID};
use crate::trend::Trend;

const LEFT_SUFFIX: &str = "_x";
const RIGHT_SUFFIX: &str = "_y";

/// Join key. Integers compare exactly, and an integral float is an integer,
/// so `1` meets `1.0`. Nulls meet nulls and sort last.
#[derive(Debug, Clone)]
enum JoinKey {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl JoinKey {
    fn of(value: Option<&Value>) -> Self {
        match value {
            None => JoinKey::Null,
            Some(Value::Int(value)) => JoinKey::Int(*value),
            Some(Value::Float(value)) if value.is_nan() => JoinKey::Null,
            // i64::MAX as f64 rounds up to 2^63, which is out of range.
            Some(Value::Float(value))
                if value.fract() == 0.0 && *value >= i64::MIN as f64 && *value < i64::MAX as f64 =>
            {
                JoinKey::Int(*value as i64)
            }
            Some(Value::Float(value)) => JoinKey::Float(*value),
            Some(Value::Text(text)) => JoinKey::Text(text.clone()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            JoinKey::Int(_) | JoinKey::Float(_) => 0,
            JoinKey::Text(_) => 1,
            JoinKey::Null => 2,
        }
    }
}

/// A `Float` key is never integral within i64 range, so it never equals an
/// `Int`; a tie after widening puts the integer first.
fn int_float_cmp(int: i64, float: f64) -> Ordering {
    (int as f64).total_cmp(&float).then(Ordering::Less)
}

impl Ord for JoinKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (JoinKey::Int(a), JoinKey::Int(b)) => a.cmp(b),
            (JoinKey::Float(a), JoinKey::Float(b)) => a.total_cmp(b),
            (JoinKey::Int(a), JoinKey::Float(b)) => int_float_cmp(*a, *b),
            (JoinKey::Float(a), JoinKey::Int(b)) => int_float_cmp(*b, *a).reverse(),
            (JoinKey::Text(a), JoinKey::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for JoinKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for JoinKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for JoinKey {}

fn key_kind(set: &RecordSet) -> Option<KeyKind> {
    let mut kind = None;
    for key in set.values(STUDENT_ID).map(JoinKey::of) {
        match key {
            JoinKey::Text(_) => return Some(KeyKind::Text),
            JoinKey::Int(_) | JoinKey::Float(_) => kind = Some(KeyKind::Numeric),
            JoinKey::Null => {}
        }
    }
    kind
}

fn output_name(column: &str, other: &RecordSet, suffix: &str) -> String {
    if other.has_column(column) {
        format!("{column}{suffix}")
    } else {
        column.to_string()
    }
}

/// Full outer join on `student_id`. Duplicate keys yield one row per
/// combination; rows come out ordered by key.
pub fn outer_join(
    left: &RecordSet,
    left_name: &str,
    right: &RecordSet,
    right_name: &str,
) -> Result<RecordSet, MergeError> {
    for (name, set) in [(left_name, left), (right_name, right)] {
        if !set.has_column(STUDENT_ID) {
            return Err(MergeError::MissingKey {
                source_name: name.to_string(),
                column: STUDENT_ID,
            });
        }
    }

    if let (Some(left_kind), Some(right_kind)) = (key_kind(left), key_kind(right)) {
        if left_kind != right_kind {
            return Err(MergeError::IncompatibleKeys {
                column: STUDENT_ID,
                left: left_name.to_string(),
                left_kind,
                right: right_name.to_string(),
                right_kind,
            });
        }
    }

    let left_columns: Vec<(&String, String)> = left
        .columns()
        .iter()
        .filter(|column| column.as_str() != STUDENT_ID)
        .map(|column| (column, output_name(column, right, LEFT_SUFFIX)))
        .collect();
    let right_columns: Vec<(&String, String)> = right
        .columns()
        .iter()
        .filter(|column| column.as_str() != STUDENT_ID)
        .map(|column| (column, output_name(column, left, RIGHT_SUFFIX)))
        .collect();

    let mut columns = vec![STUDENT_ID.to_string()];
    columns.extend(left_columns.iter().map(|(_, name)| name.clone()));
    columns.extend(right_columns.iter().map(|(_, name)| name.clone()));
    let mut joined = RecordSet::new(columns);

    let mut groups: BTreeMap<JoinKey, (Vec<&Record>, Vec<&Record>)> = BTreeMap::new();
    for row in left.rows() {
        let key = JoinKey::of(field(row, STUDENT_ID));
        groups.entry(key).or_default().0.push(row);
    }
    for row in right.rows() {
        let key = JoinKey::of(field(row, STUDENT_ID));
        groups.entry(key).or_default().1.push(row);
    }

    for (left_rows, right_rows) in groups.into_values() {
        let lefts = sides(left_rows);
        let rights = sides(right_rows);
        for left_row in &lefts {
            for right_row in &rights {
                let student_id = left_row
                    .and_then(|row| field(row, STUDENT_ID))
                    .or_else(|| right_row.and_then(|row| field(row, STUDENT_ID)))
                    .cloned();

                let mut record = Record::new();
                record.insert(STUDENT_ID.to_string(), student_id);
                copy_side(&mut record, *left_row, &left_columns);
                copy_side(&mut record, *right_row, &right_columns);
                joined.push(record);
            }
        }
    }

    debug!(
        left = left_name,
        right = right_name,
        left_rows = left.len(),
        right_rows = right.len(),
        joined_rows = joined.len(),
        "outer join complete"
    );
    Ok(joined)
}

fn sides(rows: Vec<&Record>) -> Vec<Option<&Record>> {
    if rows.is_empty() {
        vec![None]
    } else {
        rows.into_iter().map(Some).collect()
    }
}

fn copy_side(record: &mut Record, source: Option<&Record>, columns: &[(&String, String)]) {
    for (column, name) in columns {
        let value = source.and_then(|row| field(row, column)).cloned();
        record.insert(name.clone(), value);
    }
}

pub fn merge_sources(
    attendance: &RecordSet,
    marks: &RecordSet,
    fees: &RecordSet,
) -> Result<RecordSet, MergeError> {
    let joined = outer_join(attendance, "attendance", marks, "marks")?;
    let joined = outer_join(&joined, "attendance+marks", fees, "fees")?;
    Ok(backfill(joined))
}

/// Whole-column defaults only; a null cell in a present column stays null.
fn backfill(mut set: RecordSet) -> RecordSet {
    let defaults = [
        (ATTENDANCE, Value::Int(100)),
        (MARKS_TREND, Value::from(Trend::Stable)),
        (FEES_DUE, Value::Int(0)),
    ];
    for (column, default) in defaults {
        if !set.has_column(column) {
            debug!(column, default = %default, "back-filling absent column");
            set.set_column(column, |_| Some(default.clone()));
        }
    }
    set
}
