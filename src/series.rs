//! Fixed-cadence normalized series for one device-day plus look-back.

use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::station::{StationConfig, StationModel, WeatherVariable, ALL_VARIABLES, VARIABLE_COUNT};

pub const MS_PER_MINUTE: i64 = 60_000;
pub const MS_PER_HOUR: i64 = 3_600_000;
pub const MS_PER_DAY: i64 = 86_400_000;

/// One raw reading row as delivered by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub ts_ms_utc: i64,
    pub model: StationModel,
    /// Indexed by `WeatherVariable::index`.
    pub values: [Option<f64>; VARIABLE_COUNT],
}

impl Observation {
    pub fn value(&self, variable: WeatherVariable) -> Option<f64> {
        self.values[variable.index()]
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("no observations to normalize")]
    NoObservations,
    #[error("observations mix station models {first:?} and {other:?}")]
    MixedModels {
        first: StationModel,
        other: StationModel,
    },
    #[error("observation model {found:?} does not match configured model {expected:?}")]
    ModelMismatch {
        expected: StationModel,
        found: StationModel,
    },
    #[error("invalid UTC day: {0}")]
    InvalidDay(NaiveDate),
    #[error("invalid series: {0}")]
    InvalidSeries(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub input_rows: u64,
    pub placed_rows: u64,
    pub out_of_window_rows: u64,
    pub duplicate_rows: u64,
    pub expected_slots: u64,
    pub empty_slots: u64,
}

/// Uniform grid `first_ts, first_ts + step, ...` with one optional value
/// per variable and slot. `None` is a missing reading.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSeries {
    first_ts_ms_utc: i64,
    step_ms: i64,
    timestamps: Vec<i64>,
    columns: [Vec<Option<f64>>; VARIABLE_COUNT],
}

impl NormalizedSeries {
    pub fn from_columns(
        first_ts_ms_utc: i64,
        step_ms: i64,
        columns: [Vec<Option<f64>>; VARIABLE_COUNT],
    ) -> Result<Self, NormalizeError> {
        if step_ms <= 0 {
            return Err(NormalizeError::InvalidSeries(
                "step_ms must be > 0".to_string(),
            ));
        }
        let len = columns[0].len();
        if columns.iter().any(|column| column.len() != len) {
            return Err(NormalizeError::InvalidSeries(
                "all variable columns must have the same length".to_string(),
            ));
        }
        let timestamps = (0..len as i64)
            .map(|idx| first_ts_ms_utc + idx * step_ms)
            .collect();

        Ok(Self {
            first_ts_ms_utc,
            step_ms,
            timestamps,
            columns,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn first_ts_ms_utc(&self) -> i64 {
        self.first_ts_ms_utc
    }

    pub fn step_ms(&self) -> i64 {
        self.step_ms
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn column(&self, variable: WeatherVariable) -> &[Option<f64>] {
        &self.columns[variable.index()]
    }

    /// Blanks every weather value of rows where any one is missing. Returns
    /// the blanked series and the number of rows touched.
    pub fn blank_incomplete_rows(&self) -> (Self, u64) {
        let mut out = self.clone();
        let mut blanked = 0u64;
        for row in 0..self.len() {
            let present = ALL_VARIABLES
                .iter()
                .filter(|variable| self.columns[variable.index()][row].is_some())
                .count();
            if present > 0 && present < VARIABLE_COUNT {
                for column in out.columns.iter_mut() {
                    column[row] = None;
                }
                blanked += 1;
            }
        }
        (out, blanked)
    }
}

pub fn day_start_ms(day: NaiveDate) -> Result<i64, NormalizeError> {
    Utc.with_ymd_and_hms(day.year(), day.month(), day.day(), 0, 0, 0)
        .single()
        .map(|dt| dt.timestamp_millis())
        .ok_or(NormalizeError::InvalidDay(day))
}

pub fn detect_station_model(observations: &[Observation]) -> Result<StationModel, NormalizeError> {
    let first = observations
        .first()
        .map(|obs| obs.model)
        .ok_or(NormalizeError::NoObservations)?;
    if let Some(other) = observations.iter().map(|obs| obs.model).find(|m| *m != first) {
        return Err(NormalizeError::MixedModels { first, other });
    }
    Ok(first)
}

/// Snaps observations onto the grid `(day - warmup, day + 24h]` at the
/// station cadence. Each observation goes to its nearest slot; the first
/// observation claiming a slot wins.
pub fn normalize_observations(
    observations: &[Observation],
    day: NaiveDate,
    cfg: &StationConfig,
) -> Result<(NormalizedSeries, NormalizationReport), NormalizeError> {
    if observations.is_empty() {
        return Err(NormalizeError::NoObservations);
    }
    if let Some(obs) = observations.iter().find(|obs| obs.model != cfg.model) {
        return Err(NormalizeError::ModelMismatch {
            expected: cfg.model,
            found: obs.model,
        });
    }

    let step_ms = cfg.timestep_ms();
    let day_start = day_start_ms(day)?;
    let window_start = day_start - i64::from(cfg.warmup_minutes) * MS_PER_MINUTE;
    let window_end = day_start + MS_PER_DAY;
    let slot_count = ((window_end - window_start) / step_ms) as usize;

    info!(
        component = "series",
        event = "normalize.start",
        day = %day,
        model = cfg.model.as_str(),
        input_rows = observations.len(),
        slot_count
    );

    let mut columns: [Vec<Option<f64>>; VARIABLE_COUNT] =
        std::array::from_fn(|_| vec![None; slot_count]);
    let mut occupied = vec![false; slot_count];
    let mut report = NormalizationReport {
        input_rows: observations.len() as u64,
        placed_rows: 0,
        out_of_window_rows: 0,
        duplicate_rows: 0,
        expected_slots: slot_count as u64,
        empty_slots: 0,
    };

    for obs in observations {
        let offset = obs.ts_ms_utc - window_start;
        // Nearest slot; ties round away from the window start.
        let slot = (offset + cfg.time_tolerance_ms()).div_euclid(step_ms);
        if slot < 1 || slot > slot_count as i64 {
            report.out_of_window_rows += 1;
            continue;
        }
        let idx = (slot - 1) as usize;
        if occupied[idx] {
            report.duplicate_rows += 1;
            continue;
        }
        occupied[idx] = true;
        report.placed_rows += 1;
        for variable in ALL_VARIABLES {
            columns[variable.index()][idx] = obs.value(variable).filter(|v| v.is_finite());
        }
    }

    report.empty_slots = occupied.iter().filter(|taken| !**taken).count() as u64;

    if report.duplicate_rows > 0 {
        warn!(
            component = "series",
            event = "normalize.duplicate_slots",
            duplicate_rows = report.duplicate_rows
        );
    }

    info!(
        component = "series",
        event = "normalize.finish",
        placed_rows = report.placed_rows,
        out_of_window_rows = report.out_of_window_rows,
        duplicate_rows = report.duplicate_rows,
        empty_slots = report.empty_slots
    );

    let series = NormalizedSeries::from_columns(window_start + step_ms, step_ms, columns)?;
    Ok((series, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(ts_ms_utc: i64, value: f64) -> Observation {
        Observation {
            ts_ms_utc,
            model: StationModel::Ws2000,
            values: [Some(value); VARIABLE_COUNT],
        }
    }

    #[test]
    fn snaps_to_nearest_slot_and_reports_drops() {
        let cfg = StationConfig::for_model(StationModel::Ws2000).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let day_start = day_start_ms(day).unwrap();
        let window_start = day_start - 6 * MS_PER_HOUR;

        let observations = vec![
            obs(window_start + 180_000 + 40_000, 1.0),
            obs(window_start + 180_000 - 20_000, 2.0),
            obs(window_start, 3.0),
            obs(day_start + MS_PER_DAY + 120_000, 4.0),
            obs(day_start, 5.0),
        ];

        let (series, report) = normalize_observations(&observations, day, &cfg).unwrap();

        assert_eq!(series.len(), 600);
        assert_eq!(series.first_ts_ms_utc(), window_start + 180_000);
        assert_eq!(series.column(WeatherVariable::Pressure)[0], Some(1.0));
        assert_eq!(report.duplicate_rows, 1);
        assert_eq!(report.out_of_window_rows, 2);
        assert_eq!(report.placed_rows, 2);
        assert_eq!(report.empty_slots, 598);
        assert_eq!(series.column(WeatherVariable::Humidity)[119], Some(5.0));
        assert_eq!(series.timestamps()[119], day_start);
    }

    #[test]
    fn model_mismatch_and_mixed_models_are_rejected() {
        let cfg = StationConfig::for_model(StationModel::Ws1000).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let err = normalize_observations(&[obs(0, 1.0)], day, &cfg).unwrap_err();
        assert!(matches!(err, NormalizeError::ModelMismatch { .. }));

        let mut other = obs(0, 1.0);
        other.model = StationModel::Ws1000;
        let err = detect_station_model(&[obs(0, 1.0), other]).unwrap_err();
        assert!(matches!(err, NormalizeError::MixedModels { .. }));
        assert!(matches!(
            detect_station_model(&[]).unwrap_err(),
            NormalizeError::NoObservations
        ));
    }

    #[test]
    fn incomplete_rows_are_blanked_across_all_variables() {
        let mut columns: [Vec<Option<f64>>; VARIABLE_COUNT] =
            std::array::from_fn(|_| vec![Some(1.0), Some(2.0), None]);
        columns[WeatherVariable::Pressure.index()][1] = None;
        let series = NormalizedSeries::from_columns(0, 16_000, columns).unwrap();

        let (blanked, count) = series.blank_incomplete_rows();

        assert_eq!(count, 1);
        assert_eq!(blanked.column(WeatherVariable::Humidity), &[Some(1.0), None, None]);
        assert_eq!(series.column(WeatherVariable::Humidity)[1], Some(2.0));
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        let mut columns: [Vec<Option<f64>>; VARIABLE_COUNT] = std::array::from_fn(|_| vec![None; 3]);
        columns[2].push(Some(1.0));
        assert!(NormalizedSeries::from_columns(0, 1_000, columns).is_err());
    }
}
