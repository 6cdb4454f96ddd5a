//! Rendering of the 24-row daily table as CSV or JSON lines.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::scoring::{QodDayResult, QodHourRow};
use crate::station::OUTPUT_VARIABLES;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported output extension for {0} (expected .csv or .jsonl)")]
    UnsupportedExtension(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    JsonLines,
}

pub fn output_format_for_path(path: &Path) -> Result<OutputFormat, ExportError> {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => Ok(OutputFormat::Csv),
        "jsonl" | "ndjson" => Ok(OutputFormat::JsonLines),
        _ => Err(ExportError::UnsupportedExtension(path.display().to_string())),
    }
}

/// Output column names in table order.
pub fn output_columns() -> Vec<String> {
    let mut columns = Vec::with_capacity(OUTPUT_VARIABLES.len() * 3 + 9);
    for variable in OUTPUT_VARIABLES {
        columns.push(format!("{}_score", variable.as_str()));
        columns.push(format!("{}_annotation", variable.as_str()));
    }
    for variable in OUTPUT_VARIABLES {
        columns.push(format!("daily_{}_annotation", variable.as_str()));
    }
    for name in [
        "daily_annotation",
        "model",
        "qod_score",
        "hourly_score",
        "qod_version",
        "year",
        "month",
        "day",
        "hour",
    ] {
        columns.push(name.to_string());
    }
    columns
}

/// Cell values of one output row, aligned with `output_columns`.
/// Annotation payloads are structured JSON values.
pub fn output_row_values(result: &QodDayResult, row: &QodHourRow) -> Result<Vec<Value>, ExportError> {
    let mut values = Vec::with_capacity(OUTPUT_VARIABLES.len() * 3 + 9);
    for variable in OUTPUT_VARIABLES {
        match row.variables.iter().find(|v| v.variable == variable) {
            Some(score) => {
                values.push(optional_number(score.score));
                values.push(serde_json::to_value(&score.annotation)?);
            }
            None => {
                values.push(Value::Null);
                values.push(Value::Array(Vec::new()));
            }
        }
    }
    for variable in OUTPUT_VARIABLES {
        let daily = match result.daily_variable(variable) {
            Some(daily) => serde_json::to_value(&daily.annotation)?,
            None => Value::Array(Vec::new()),
        };
        values.push(daily);
    }
    values.push(serde_json::to_value(&result.daily_annotation)?);
    values.push(Value::String(result.model.as_str().to_string()));
    values.push(optional_number(result.qod_score));
    values.push(optional_number(row.hourly_score));
    values.push(Value::String(result.qod_version.clone()));
    values.push(Value::from(row.year));
    values.push(Value::from(row.month));
    values.push(Value::from(row.day));
    values.push(Value::from(row.hour));
    Ok(values)
}

fn optional_number(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// CSV cell text: strings as-is, null empty, nested values as compact JSON.
fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub fn write_daily_csv<W: Write>(writer: W, result: &QodDayResult) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(output_columns())?;
    for row in &result.rows {
        let cells: Vec<String> = output_row_values(result, row)?.iter().map(csv_cell).collect();
        csv_writer.write_record(&cells)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_daily_json_lines<W: Write>(mut writer: W, result: &QodDayResult) -> Result<(), ExportError> {
    let columns = output_columns();
    for row in &result.rows {
        let values = output_row_values(result, row)?;
        let object: Map<String, Value> = columns.iter().cloned().zip(values).collect();
        serde_json::to_writer(&mut writer, &Value::Object(object))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the daily table to `path`, picking the format from its extension.
pub fn write_daily_output(path: &Path, result: &QodDayResult) -> Result<OutputFormat, ExportError> {
    let format = output_format_for_path(path)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let writer = BufWriter::new(File::create(path)?);
    match format {
        OutputFormat::Csv => write_daily_csv(writer, result)?,
        OutputFormat::JsonLines => write_daily_json_lines(writer, result)?,
    }

    info!(
        component = "output",
        event = "output.daily.written",
        path = %path.display(),
        format = ?format,
        rows = result.rows.len()
    );
    Ok(format)
}
