//! Hourly and daily scores plus the fault-percentage breakdowns.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::aggregate::{round_to, Bucket};
use crate::annotation::RawAnnotations;
use crate::series::MS_PER_HOUR;
use crate::station::{FaultKind, StationModel, WeatherVariable, OUTPUT_VARIABLES, QOD_VERSION, RAW_FAULTS};

pub const HOURS_PER_DAY: usize = 24;

/// One `[label, percentage]` pair of a breakdown.
pub type LabelShare = (String, f64);

/// What the scorer needs from one variable's pipeline.
#[derive(Debug, Clone, Copy)]
pub struct VariableScoringInput<'a> {
    pub variable: WeatherVariable,
    pub timestamps: &'a [i64],
    pub annotations: &'a RawAnnotations,
    pub minute_buckets: &'a [Bucket],
    pub hour_buckets: &'a [Bucket],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableHourScore {
    pub variable: WeatherVariable,
    pub score: Option<f64>,
    pub annotation: Vec<LabelShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QodHourRow {
    pub start_ts_ms_utc: i64,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub hourly_score: Option<f64>,
    /// In output column order.
    pub variables: Vec<VariableHourScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDaily {
    pub variable: WeatherVariable,
    pub score: Option<f64>,
    pub annotation: Vec<LabelShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QodDayResult {
    pub day: NaiveDate,
    pub model: StationModel,
    pub qod_version: String,
    pub config_fingerprint: String,
    /// Mean daily variable score as a fraction in `[0, 1]`.
    pub qod_score: Option<f64>,
    pub variables: Vec<VariableDaily>,
    /// `{label: [[variable, pct], ...]}` with labels sorted.
    pub daily_annotation: BTreeMap<String, Vec<LabelShare>>,
    pub rows: Vec<QodHourRow>,
}

impl QodDayResult {
    pub fn daily_annotation_json(&self) -> String {
        json_or_empty(&self.daily_annotation, "{}")
    }

    pub fn daily_variable(&self, variable: WeatherVariable) -> Option<&VariableDaily> {
        self.variables.iter().find(|v| v.variable == variable)
    }
}

impl VariableHourScore {
    pub fn annotation_json(&self) -> String {
        json_or_empty(&self.annotation, "[]")
    }
}

impl VariableDaily {
    pub fn annotation_json(&self) -> String {
        json_or_empty(&self.annotation, "[]")
    }
}

fn json_or_empty<T: Serialize>(value: &T, empty: &str) -> String {
    match serde_json::to_string(value) {
        Ok(json) => json,
        Err(err) => {
            warn!(
                component = "scoring",
                event = "scoring.annotation.serialize_failed",
                error = %err
            );
            empty.to_string()
        }
    }
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_to(count as f64 * 100.0 / total as f64, 1)
}

/// Per-category share of raw rows in `(hour_start, hour_end]`, zeros omitted.
pub fn raw_hour_breakdown(
    timestamps: &[i64],
    annotations: &RawAnnotations,
    hour_start_ms_utc: i64,
    hour_end_ms_utc: i64,
) -> Vec<LabelShare> {
    let rows: Vec<usize> = timestamps
        .iter()
        .enumerate()
        .filter(|(_, ts)| **ts > hour_start_ms_utc && **ts <= hour_end_ms_utc)
        .map(|(idx, _)| idx)
        .collect();

    RAW_FAULTS
        .iter()
        .filter_map(|kind| {
            let count = rows.iter().filter(|idx| annotations.has(*kind, **idx)).count();
            let pct = percentage(count, rows.len());
            (pct > 0.0).then(|| (kind.label().to_string(), pct))
        })
        .collect()
}

/// Share of minute buckets in the hour flagged as anomalous increases.
pub fn minute_hour_breakdown(
    minute_buckets: &[Bucket],
    hour_start_ms_utc: i64,
    hour_end_ms_utc: i64,
) -> Vec<LabelShare> {
    let in_hour: Vec<&Bucket> = minute_buckets
        .iter()
        .filter(|b| b.end_ts_ms_utc > hour_start_ms_utc && b.end_ts_ms_utc <= hour_end_ms_utc)
        .collect();
    let count = in_hour.iter().filter(|b| b.anomalous).count();
    let pct = percentage(count, in_hour.len());
    if pct > 0.0 {
        vec![(FaultKind::AnomalousIncrease.label().to_string(), pct)]
    } else {
        Vec::new()
    }
}

fn hour_score(hour_buckets: &[Bucket], hour_end_ms_utc: i64) -> Option<f64> {
    hour_buckets
        .iter()
        .find(|b| b.end_ts_ms_utc == hour_end_ms_utc && b.slots > 0)
        .map(|b| b.valid_percentage_rewards)
}

fn mean_defined(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let defined: Vec<f64> = values.flatten().collect();
    if defined.is_empty() {
        return None;
    }
    Some(defined.iter().sum::<f64>() / defined.len() as f64)
}

/// Builds the 24 output rows and the daily summaries for one device-day.
pub fn score_day(
    day: NaiveDate,
    day_start_ms_utc: i64,
    model: StationModel,
    config_fingerprint: &str,
    inputs: &[VariableScoringInput<'_>],
) -> QodDayResult {
    let ordered: Vec<&VariableScoringInput<'_>> = OUTPUT_VARIABLES
        .iter()
        .filter_map(|variable| inputs.iter().find(|input| input.variable == *variable))
        .collect();

    let mut rows = Vec::with_capacity(HOURS_PER_DAY);
    for hour in 0..HOURS_PER_DAY {
        let hour_start = day_start_ms_utc + hour as i64 * MS_PER_HOUR;
        let hour_end = hour_start + MS_PER_HOUR;

        let variables: Vec<VariableHourScore> = ordered
            .iter()
            .map(|input| {
                let mut annotation =
                    raw_hour_breakdown(input.timestamps, input.annotations, hour_start, hour_end);
                annotation.extend(minute_hour_breakdown(input.minute_buckets, hour_start, hour_end));
                let score = hour_score(input.hour_buckets, hour_end);
                if score.is_none() {
                    warn!(
                        component = "scoring",
                        event = "scoring.hour.empty",
                        variable = input.variable.as_str(),
                        hour
                    );
                }
                VariableHourScore {
                    variable: input.variable,
                    score,
                    annotation,
                }
            })
            .collect();

        let hourly_score = mean_defined(variables.iter().map(|v| v.score));
        let start = Utc.timestamp_millis_opt(hour_start).single();
        rows.push(QodHourRow {
            start_ts_ms_utc: hour_start,
            year: start.map_or(day.year(), |dt| dt.year()),
            month: start.map_or(day.month(), |dt| dt.month()),
            day: start.map_or(day.day(), |dt| dt.day()),
            hour: start.map_or(hour as u32, |dt| dt.hour()),
            hourly_score,
            variables,
        });
    }

    let variables: Vec<VariableDaily> = ordered
        .iter()
        .enumerate()
        .map(|(pos, input)| {
            let score = mean_defined(rows.iter().map(|row| row.variables[pos].score));
            let mut totals: Vec<LabelShare> = Vec::new();
            for row in &rows {
                for (label, pct) in &row.variables[pos].annotation {
                    match totals.iter_mut().find(|(l, _)| l == label) {
                        Some((_, sum)) => *sum += pct / HOURS_PER_DAY as f64,
                        None => totals.push((label.clone(), pct / HOURS_PER_DAY as f64)),
                    }
                }
            }
            VariableDaily {
                variable: input.variable,
                score,
                annotation: totals,
            }
        })
        .collect();

    let mut daily_annotation: BTreeMap<String, Vec<LabelShare>> = BTreeMap::new();
    for daily in &variables {
        for (label, pct) in &daily.annotation {
            daily_annotation
                .entry(label.clone())
                .or_default()
                .push((daily.variable.as_str().to_string(), *pct));
        }
    }

    let qod_score = mean_defined(variables.iter().map(|v| v.score)).map(|s| s / 100.0);

    QodDayResult {
        day,
        model,
        qod_version: QOD_VERSION.to_string(),
        config_fingerprint: config_fingerprint.to_string(),
        qod_score,
        variables,
        daily_annotation,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations(no_datum: Vec<u8>) -> RawAnnotations {
        let len = no_datum.len();
        let total: Vec<bool> = no_datum.iter().map(|c| *c != 0).collect();
        RawAnnotations {
            out_of_bounds: vec![0; len],
            invalid_datum: vec![0; len],
            unidentified_spike: vec![0; len],
            no_datum,
            constant: vec![0; len],
            constant_long: vec![0; len],
            constant_frozen: vec![0; len],
            reward: total.clone(),
            total,
        }
    }

    fn hour_bucket(end: i64, valid: f64, anomalous: bool) -> Bucket {
        Bucket {
            end_ts_ms_utc: end,
            slots: 60,
            present: 60,
            missing: 0,
            faulty: 0,
            reward_faulty: 0,
            labels: Vec::new(),
            mean: Some(1.0),
            corrected_mean: Some(1.0),
            wind: None,
            corrected_wind: None,
            valid_percentage: valid,
            valid_percentage_rewards: valid,
            unavailable: false,
            unavailable_rewards: false,
            jump: None,
            anomalous,
            total: anomalous,
            total_rewards: anomalous,
        }
    }

    #[test]
    fn raw_breakdown_uses_right_closed_hours() {
        let ts = [0, 1_000, 2_000, 3_000];
        let ann = annotations(vec![3, 3, 0, 0]);

        let shares = raw_hour_breakdown(&ts, &ann, 0, 3_000);
        assert_eq!(shares, vec![("NO_DATA".to_string(), 33.3)]);
        assert!(raw_hour_breakdown(&ts, &ann, 1_000, 3_000).is_empty());
    }

    #[test]
    fn day_has_24_rows_and_fractional_score() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let day_start = crate::series::day_start_ms(day).unwrap();
        let timestamps: Vec<i64> = (1..=24).map(|h| day_start + h * MS_PER_HOUR).collect();
        let mut codes = vec![0; 24];
        codes[0] = 3;
        let ann = annotations(codes);
        let hours: Vec<Bucket> = (1..=24)
            .map(|h| hour_bucket(day_start + h * MS_PER_HOUR, if h == 1 { 0.0 } else { 100.0 }, false))
            .collect();
        let mut minutes = hours.clone();
        minutes[5].anomalous = true;
        let clean = annotations(vec![0; 24]);

        let inputs = [
            VariableScoringInput {
                variable: WeatherVariable::Pressure,
                timestamps: &timestamps,
                annotations: &ann,
                minute_buckets: &minutes,
                hour_buckets: &hours,
            },
            VariableScoringInput {
                variable: WeatherVariable::Temperature,
                timestamps: &timestamps,
                annotations: &clean,
                minute_buckets: &hours,
                hour_buckets: &hours,
            },
        ];
        let result = score_day(day, day_start, StationModel::Ws1000, "abc", &inputs);

        assert_eq!(result.rows.len(), 24);
        assert_eq!(result.rows[0].hour, 0);
        assert_eq!(result.rows[23].hour, 23);
        assert_eq!(result.rows[0].variables[0].variable, WeatherVariable::Temperature);
        assert_eq!(result.rows[0].hourly_score, Some(0.0));
        assert_eq!(
            result.rows[0].variables[1].annotation,
            vec![("NO_DATA".to_string(), 100.0)]
        );
        assert_eq!(
            result.rows[5].variables[1].annotation_json(),
            "[[\"ANOMALOUS_INCREASE\",100.0]]"
        );

        let pressure = result.daily_variable(WeatherVariable::Pressure).unwrap();
        assert_eq!(round_to(pressure.score.unwrap(), 4), round_to(2300.0 / 24.0, 4));
        assert_eq!(pressure.annotation.len(), 2);
        assert!((pressure.annotation[0].1 - 100.0 / 24.0).abs() < 1e-9);

        let expected = (2300.0 / 24.0) / 100.0;
        assert!((result.qod_score.unwrap() - expected).abs() < 1e-9);
        assert_eq!(result.daily_annotation.len(), 2);
        assert!(result.daily_annotation_json().starts_with("{\"ANOMALOUS_INCREASE\":[[\"pressure\""));
        assert_eq!(result.qod_version, "1.0.6");
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("not representable"))
        }
    }

    #[derive(Clone, Default)]
    struct Capture(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn unserializable_annotation_falls_back_and_warns() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();

        let json = tracing::subscriber::with_default(subscriber, || {
            json_or_empty(&Unserializable, "[]")
        });

        assert_eq!(json, "[]");
        let logs = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("\"event\":\"scoring.annotation.serialize_failed\""));
        assert!(logs.contains("not representable"));
    }
}
