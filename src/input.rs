//! CSV loading of raw device observations.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::series::Observation;
use crate::station::{parse_station_model, ConfigError, OUTPUT_VARIABLES, VARIABLE_COUNT};

const TIMESTAMP_COLUMN: &str = "utc_datetime";
const MODEL_COLUMN: &str = "model";
const DEVICE_COLUMN: &str = "device_id";
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Error)]
pub enum InputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column: {0}")]
    MissingColumn(&'static str),
    #[error("failed to parse field {field}: {value}")]
    ParseField { field: &'static str, value: String },
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("station config error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvLoadReport {
    pub rows_read: u64,
    pub rows_kept: u64,
    pub rows_other_device: u64,
}

#[derive(Debug, Clone)]
struct ColumnIndex {
    timestamp: usize,
    model: usize,
    device: Option<usize>,
    values: [usize; VARIABLE_COUNT],
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Result<Self, InputError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let timestamp = find(TIMESTAMP_COLUMN).ok_or(InputError::MissingColumn(TIMESTAMP_COLUMN))?;
        let model = find(MODEL_COLUMN).ok_or(InputError::MissingColumn(MODEL_COLUMN))?;
        let device = find(DEVICE_COLUMN);

        let mut values = [0usize; VARIABLE_COUNT];
        for variable in OUTPUT_VARIABLES {
            values[variable.index()] =
                find(variable.as_str()).ok_or(InputError::MissingColumn(variable.as_str()))?;
        }

        Ok(Self {
            timestamp,
            model,
            device,
            values,
        })
    }
}

pub fn load_observations_csv(
    path: &Path,
    device_id: Option<&str>,
) -> Result<(Vec<Observation>, CsvLoadReport), InputError> {
    let file = File::open(path)?;
    let (observations, report) = read_observations(file, device_id)?;
    info!(
        component = "input",
        event = "input.csv.loaded",
        path = %path.display(),
        rows_read = report.rows_read,
        rows_kept = report.rows_kept,
        rows_other_device = report.rows_other_device
    );
    Ok((observations, report))
}

/// Reads observations from CSV with a header row. When `device_id` is set
/// and the file has a `device_id` column, other devices' rows are skipped.
pub fn read_observations<R: Read>(
    reader: R,
    device_id: Option<&str>,
) -> Result<(Vec<Observation>, CsvLoadReport), InputError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let columns = ColumnIndex::from_headers(reader.headers()?)?;

    if device_id.is_some() && columns.device.is_none() {
        warn!(
            component = "input",
            event = "input.csv.no_device_column",
            "device filter requested but input has no device_id column"
        );
    }

    let mut observations = Vec::new();
    let mut report = CsvLoadReport {
        rows_read: 0,
        rows_kept: 0,
        rows_other_device: 0,
    };

    for record in reader.records() {
        let record = record?;
        report.rows_read += 1;

        if let (Some(wanted), Some(idx)) = (device_id, columns.device) {
            if record.get(idx).unwrap_or_default() != wanted {
                report.rows_other_device += 1;
                continue;
            }
        }

        observations.push(parse_observation(&record, &columns)?);
        report.rows_kept += 1;
    }

    Ok((observations, report))
}

fn parse_observation(record: &StringRecord, columns: &ColumnIndex) -> Result<Observation, InputError> {
    let ts_ms_utc = parse_timestamp_ms(record.get(columns.timestamp).unwrap_or_default())?;
    let model = parse_station_model(record.get(columns.model).unwrap_or_default())?;
    let mut values = [None; VARIABLE_COUNT];
    for variable in OUTPUT_VARIABLES {
        values[variable.index()] =
            parse_optional_f64(record, columns.values[variable.index()], variable.as_str())?;
    }
    Ok(Observation {
        ts_ms_utc,
        model,
        values,
    })
}

/// RFC 3339, or a naive `YYYY-MM-DD HH:MM:SS` read as UTC.
pub fn parse_timestamp_ms(raw: &str) -> Result<i64, InputError> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.timestamp_millis());
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc().timestamp_millis());
        }
    }
    Err(InputError::InvalidTimestamp(raw.to_string()))
}

fn is_missing_cell(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "" | "nan" | "na" | "null" | "none"
    )
}

fn parse_optional_f64(
    record: &StringRecord,
    idx: usize,
    field: &'static str,
) -> Result<Option<f64>, InputError> {
    let raw = record.get(idx).unwrap_or_default();
    if is_missing_cell(raw) {
        return Ok(None);
    }
    raw.trim()
        .parse::<f64>()
        .map(Some)
        .map_err(|_| InputError::ParseField {
            field,
            value: raw.to_string(),
        })
}
