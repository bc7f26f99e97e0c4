//! Tabular input rows for ingestion.
//!
//! A spreadsheet workbook is read from its first sheet, whose first row names
//! the columns. Any other file is either a JSON array of objects or JSON lines
//! with one object per line.

use crate::error::{Result, VidseekError};
use calamine::{open_workbook_auto, Data, Reader};
use serde_json::{Map, Number, Value};
use std::collections::BTreeSet;
use std::path::Path;

/// One input row: column name to cell value.
pub type Row = Map<String, Value>;

/// Placeholder written for cells that are missing or null.
pub const NOT_AVAILABLE: &str = "Not available";

/// Extensions read as spreadsheet workbooks.
const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Load rows from a workbook, JSON or JSON-lines file.
pub fn load_rows(path: &Path) -> Result<Vec<Row>> {
    let is_workbook = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| WORKBOOK_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    if is_workbook {
        return load_workbook(path);
    }

    let text = std::fs::read_to_string(path)?;
    parse_rows(&text)
}

/// Load rows from the first sheet of a workbook.
///
/// Blank header cells are named `Unnamed: <column>`, empty cells become null
/// and rows with no value at all are skipped.
pub fn load_workbook(path: &Path) -> Result<Vec<Row>> {
    let mut workbook = open_workbook_auto(path).map_err(workbook_error)?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };
    let range = workbook.worksheet_range(&sheet).map_err(workbook_error)?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell_to_value(cell) {
            Value::Null => format!("Unnamed: {}", i),
            Value::String(name) => name,
            other => other.to_string(),
        })
        .collect();

    Ok(rows
        .filter(|cells| cells.iter().any(|cell| !matches!(cell, Data::Empty)))
        .map(|cells| {
            columns
                .iter()
                .cloned()
                .zip(cells.iter().map(cell_to_value))
                .collect()
        })
        .collect())
}

fn workbook_error(e: calamine::Error) -> VidseekError {
    VidseekError::Ingest(format!("Failed to read workbook: {}", e))
}

/// Convert a worksheet cell to a JSON value.
///
/// Whole floats become integers so a length of `42.0` reads back as `42`.
fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Bool(b) => Value::Bool(*b),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::from(*f as i64),
        Data::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        other => Value::String(other.to_string()),
    }
}

/// Parse rows from JSON array or JSON-lines text.
pub fn parse_rows(text: &str) -> Result<Vec<Row>> {
    if text.trim_start().starts_with('[') {
        let values: Vec<Value> = serde_json::from_str(text)?;
        return values
            .into_iter()
            .enumerate()
            .map(|(i, value)| into_row(i, value))
            .collect();
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| into_row(i, serde_json::from_str(line)?))
        .collect()
}

fn into_row(position: usize, value: Value) -> Result<Row> {
    match value {
        Value::Object(row) => Ok(row),
        other => Err(VidseekError::Ingest(format!(
            "Row {} is not an object: {}",
            position, other
        ))),
    }
}

/// Union of the column names of all rows.
pub fn collect_columns(rows: &[Row]) -> BTreeSet<String> {
    rows.iter().flat_map(|row| row.keys().cloned()).collect()
}

/// Render a cell as metadata text.
pub fn cell_to_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => NOT_AVAILABLE.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Non-blank content of a row's content column.
pub fn row_content(row: &Row, column: &str) -> Option<String> {
    match row.get(column) {
        None | Some(Value::Null) => None,
        value => {
            let text = cell_to_string(value);
            (!text.trim().is_empty()).then_some(text)
        }
    }
}
