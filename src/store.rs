//! SQLite store for daily QoD rows, one row per device and calendar hour.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::scoring::{LabelShare, QodDayResult, QodHourRow, VariableDaily};
use crate::station::{parse_station_model, ConfigError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stored row has invalid model: {0}")]
    Config(#[from] ConfigError),
    #[error("stored rows disagree on {0} for one device-day")]
    InconsistentDay(&'static str),
}

/// Day-level payload repeated on every hourly row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DailyPayload {
    variables: Vec<VariableDaily>,
    daily_annotation: BTreeMap<String, Vec<LabelShare>>,
}

pub struct QodStore {
    conn: Connection,
}

impl QodStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            ",
        )?;
        create_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Inserts or replaces the 24 rows of `result` for `device_id`.
    pub fn upsert_day(&mut self, device_id: &str, result: &QodDayResult) -> Result<usize, StoreError> {
        if result.rows.is_empty() {
            return Ok(0);
        }

        let daily_json = serde_json::to_string(&DailyPayload {
            variables: result.variables.clone(),
            daily_annotation: result.daily_annotation.clone(),
        })?;

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO qod_hourly (
                    device_id,
                    year,
                    month,
                    day,
                    hour,
                    start_ts_ms_utc,
                    model,
                    qod_version,
                    config_fingerprint,
                    qod_score,
                    hourly_score,
                    row_json,
                    daily_json
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                ON CONFLICT(device_id, year, month, day, hour) DO UPDATE SET
                    start_ts_ms_utc = excluded.start_ts_ms_utc,
                    model = excluded.model,
                    qod_version = excluded.qod_version,
                    config_fingerprint = excluded.config_fingerprint,
                    qod_score = excluded.qod_score,
                    hourly_score = excluded.hourly_score,
                    row_json = excluded.row_json,
                    daily_json = excluded.daily_json
                ",
            )?;

            for row in &result.rows {
                stmt.execute(params![
                    device_id,
                    row.year,
                    row.month,
                    row.day,
                    row.hour,
                    row.start_ts_ms_utc,
                    result.model.as_str(),
                    result.qod_version,
                    result.config_fingerprint,
                    result.qod_score,
                    row.hourly_score,
                    serde_json::to_string(row)?,
                    daily_json,
                ])?;
            }
        }
        tx.commit()?;

        info!(
            component = "store",
            event = "store.upsert",
            device_id,
            day = %result.day,
            rows = result.rows.len(),
            config_fingerprint = %result.config_fingerprint
        );
        Ok(result.rows.len())
    }

    /// Rebuilds a stored device-day, or `None` when nothing is stored.
    pub fn load_day(&self, device_id: &str, day: NaiveDate) -> Result<Option<QodDayResult>, StoreError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT model, qod_version, config_fingerprint, qod_score, row_json, daily_json
            FROM qod_hourly
            WHERE device_id = ?1 AND year = ?2 AND month = ?3 AND day = ?4
            ORDER BY hour
            ",
        )?;
        let mut rows = stmt.query(params![device_id, day.year(), day.month(), day.day()])?;

        let mut result: Option<QodDayResult> = None;
        while let Some(row) = rows.next()? {
            let model: String = row.get(0)?;
            let qod_version: String = row.get(1)?;
            let config_fingerprint: String = row.get(2)?;
            let qod_score: Option<f64> = row.get(3)?;
            let row_json: String = row.get(4)?;
            let hour_row: QodHourRow = serde_json::from_str(&row_json)?;

            match result.as_mut() {
                Some(existing) => {
                    if existing.config_fingerprint != config_fingerprint {
                        return Err(StoreError::InconsistentDay("config_fingerprint"));
                    }
                    existing.rows.push(hour_row);
                }
                None => {
                    let daily_json: String = row.get(5)?;
                    let daily: DailyPayload = serde_json::from_str(&daily_json)?;
                    result = Some(QodDayResult {
                        day,
                        model: parse_station_model(&model)?,
                        qod_version,
                        config_fingerprint,
                        qod_score,
                        variables: daily.variables,
                        daily_annotation: daily.daily_annotation,
                        rows: vec![hour_row],
                    });
                }
            }
        }

        Ok(result)
    }

    pub fn count_rows(&self, device_id: &str) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM qod_hourly WHERE device_id = ?1",
            params![device_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn create_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS qod_hourly (
            device_id TEXT NOT NULL,
            year INTEGER NOT NULL,
            month INTEGER NOT NULL,
            day INTEGER NOT NULL,
            hour INTEGER NOT NULL,
            start_ts_ms_utc INTEGER NOT NULL,
            model TEXT NOT NULL,
            qod_version TEXT NOT NULL,
            config_fingerprint TEXT NOT NULL,
            qod_score REAL,
            hourly_score REAL,
            row_json TEXT NOT NULL,
            daily_json TEXT NOT NULL,
            PRIMARY KEY(device_id, year, month, day, hour)
        ) WITHOUT ROWID;
        ",
    )?;
    Ok(())
}
