use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context};

use crate::models::{RecordSet, Value};

const MISSING_TOKENS: [&str; 10] = ["", "NA", "N/A", "n/a", "NaN", "nan", "NULL", "null", "None", "#N/A"];

enum ColumnType {
    Int,
    Float,
    Text,
}

pub fn read_csv(path: &Path) -> anyhow::Result<RecordSet> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_records(file).with_context(|| format!("failed to read CSV {}", path.display()))
}

/// Parses CSV with a header row. Column types are inferred from the whole
/// column: all integers, else all numbers, else raw text.
pub fn read_records<R: Read>(reader: R) -> anyhow::Result<RecordSet> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let columns = dedupe_headers(reader.headers()?.iter());

    let mut cells: Vec<Vec<Option<String>>> = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result?;
        if record.len() > columns.len() {
            bail!(
                "row {} has {} fields but the header has {}",
                index + 2,
                record.len(),
                columns.len()
            );
        }
        let mut row: Vec<Option<String>> = record
            .iter()
            .map(|cell| (!MISSING_TOKENS.contains(&cell)).then(|| cell.to_string()))
            .collect();
        row.resize(columns.len(), None);
        cells.push(row);
    }

    let types: Vec<ColumnType> = (0..columns.len())
        .map(|index| infer_type(cells.iter().filter_map(|row| row[index].as_deref())))
        .collect();

    let rows = cells.into_iter().map(|row| {
        row.into_iter()
            .zip(&types)
            .map(|(cell, column_type)| cell.map(|raw| typed(raw, column_type)))
            .collect::<Vec<_>>()
    });
    Ok(RecordSet::from_rows(columns, rows))
}

fn infer_type<'a>(cells: impl Iterator<Item = &'a str> + Clone) -> ColumnType {
    if cells.clone().all(|cell| cell.trim().parse::<i64>().is_ok()) {
        ColumnType::Int
    } else if cells.clone().all(|cell| cell.trim().parse::<f64>().is_ok()) {
        ColumnType::Float
    } else {
        ColumnType::Text
    }
}

fn typed(raw: String, column_type: &ColumnType) -> Value {
    let parsed = match column_type {
        ColumnType::Int => raw.trim().parse().ok().map(Value::Int),
        ColumnType::Float => raw.trim().parse().ok().map(Value::Float),
        ColumnType::Text => None,
    };
    parsed.unwrap_or(Value::Text(raw))
}

fn dedupe_headers<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .map(|header| {
            let count = seen.entry(header.to_string()).or_insert(0);
            let name = if *count == 0 {
                header.to_string()
            } else {
                format!("{header}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}
