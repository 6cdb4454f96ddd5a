//! Device-day orchestration: normalize, annotate each variable, aggregate
//! and score.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::aggregate::{aggregate_hours, aggregate_minutes, Bucket, WindRaw};
use crate::annotation::{annotate, AnnotatedVariable};
use crate::constant::{detect_constant, suppress_speed_without_direction, ConstantFlags, ConstantInputs};
use crate::gap_fill::{fill_gaps, GapFilled};
use crate::jump::detect_jumps;
use crate::observability::device_day_span;
use crate::range_check::check_range;
use crate::scoring::{score_day, QodDayResult, VariableScoringInput};
use crate::series::{
    day_start_ms, normalize_observations, NormalizationReport, NormalizeError, NormalizedSeries,
    Observation,
};
use crate::station::{
    ConfigError, StationConfig, StationModel, WeatherVariable, ALL_VARIABLES, VARIABLE_COUNT,
};

#[derive(Debug, Error)]
pub enum QodError {
    #[error("station config error: {0}")]
    Config(#[from] ConfigError),
    #[error("normalization error: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("request model {requested:?} does not match station config model {configured:?}")]
    ModelMismatch {
        requested: StationModel,
        configured: StationModel,
    },
    #[error("series step {found_ms} ms does not match station timestep {expected_ms} ms")]
    StepMismatch { expected_ms: i64, found_ms: i64 },
    #[error("weather variable {0} is not configured")]
    MissingVariable(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDayRequest {
    pub day: NaiveDate,
    pub model: StationModel,
    pub device_id: Option<String>,
}

/// Stage records of one variable's pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRun {
    pub variable: WeatherVariable,
    pub annotated: AnnotatedVariable,
    pub minute_buckets: Vec<Bucket>,
    pub hour_buckets: Vec<Bucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRunSummary {
    pub variable: WeatherVariable,
    pub faulty_rows: u64,
    pub reward_faulty_rows: u64,
    pub minute_buckets: u64,
    pub unavailable_minute_buckets: u64,
    pub hour_buckets: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QodRunReport {
    pub normalization: Option<NormalizationReport>,
    pub blanked_rows: u64,
    pub variables: Vec<VariableRunSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QodRun {
    pub series: NormalizedSeries,
    pub variables: Vec<VariableRun>,
    pub result: QodDayResult,
    pub report: QodRunReport,
}

impl QodRun {
    pub fn variable(&self, variable: WeatherVariable) -> Option<&VariableRun> {
        self.variables.iter().find(|run| run.variable == variable)
    }
}

/// Full run from raw observations: normalization, blanking of incomplete
/// rows, then `process_series`.
pub fn run_qod_day(
    observations: &[Observation],
    req: &DeviceDayRequest,
    cfg: &StationConfig,
) -> Result<QodRun, QodError> {
    if req.model != cfg.model {
        return Err(QodError::ModelMismatch {
            requested: req.model,
            configured: cfg.model,
        });
    }

    let span = device_day_span(
        req.day,
        cfg.model,
        req.device_id.as_deref(),
        &cfg.fingerprint(),
    );
    let _entered = span.enter();

    let (normalized, normalization) = normalize_observations(observations, req.day, cfg)?;
    let (series, blanked_rows) = normalized.blank_incomplete_rows();
    if blanked_rows > 0 {
        warn!(
            component = "pipeline",
            event = "qod.rows.blanked",
            blanked_rows,
            device_id = req.device_id.as_deref().unwrap_or("")
        );
    }

    let mut run = process_series(&series, req.day, cfg)?;
    run.report.normalization = Some(normalization);
    run.report.blanked_rows = blanked_rows;
    Ok(run)
}

/// Runs every stage on an already normalized series covering the day and
/// its warm-up.
pub fn process_series(
    series: &NormalizedSeries,
    day: NaiveDate,
    cfg: &StationConfig,
) -> Result<QodRun, QodError> {
    if series.step_ms() != cfg.timestep_ms() {
        return Err(QodError::StepMismatch {
            expected_ms: cfg.timestep_ms(),
            found_ms: series.step_ms(),
        });
    }
    let day_start = day_start_ms(day)?;
    let fingerprint = cfg.fingerprint();

    info!(
        component = "pipeline",
        event = "qod.run.start",
        day = %day,
        model = cfg.model.as_str(),
        rows = series.len(),
        config_fingerprint = %fingerprint
    );

    let timestamps = series.timestamps();
    let max_fill_rows = cfg.gap_fill_rows();
    let filled: [GapFilled; VARIABLE_COUNT] =
        std::array::from_fn(|idx| fill_gaps(series.column(ALL_VARIABLES[idx]), max_fill_rows));
    let humidity = &filled[WeatherVariable::Humidity.index()].filled;
    let temperature = &filled[WeatherVariable::Temperature.index()].filled;
    let wind = WindRaw {
        speed: series.column(WeatherVariable::WindSpeed),
        direction: series.column(WeatherVariable::WindDirection),
    };

    let mut direction_constant: Option<ConstantFlags> = None;
    let mut runs = Vec::with_capacity(ALL_VARIABLES.len());
    let mut summaries = Vec::with_capacity(ALL_VARIABLES.len());

    for variable in ALL_VARIABLES {
        let var_cfg = cfg
            .variable(variable)
            .ok_or(QodError::MissingVariable(variable.as_str()))?;
        let gap = filled[variable.index()].clone();

        let range = check_range(var_cfg, &gap);
        let mut constant = detect_constant(
            cfg,
            var_cfg,
            ConstantInputs {
                timestamps,
                filled: &gap.filled,
                humidity,
                temperature,
            },
        );
        match variable {
            WeatherVariable::WindDirection => direction_constant = Some(constant.clone()),
            WeatherVariable::WindSpeed if cfg.wind_speed_follows_direction => {
                if let Some(direction) = &direction_constant {
                    constant = suppress_speed_without_direction(&constant, direction);
                }
            }
            _ => {}
        }
        let jump = detect_jumps(cfg, var_cfg, timestamps, &gap.filled);
        let annotated = annotate(cfg, variable, gap, range, constant, jump);

        let wind_raw = variable.is_wind().then_some(wind);
        let minute_buckets =
            aggregate_minutes(cfg, var_cfg, timestamps, &annotated, wind_raw, day_start);
        let hour_buckets = aggregate_hours(cfg, var_cfg, &minute_buckets);

        let summary = VariableRunSummary {
            variable,
            faulty_rows: annotated.annotations.total.iter().filter(|f| **f).count() as u64,
            reward_faulty_rows: annotated.annotations.reward.iter().filter(|f| **f).count() as u64,
            minute_buckets: minute_buckets.len() as u64,
            unavailable_minute_buckets: minute_buckets.iter().filter(|b| b.unavailable).count()
                as u64,
            hour_buckets: hour_buckets.len() as u64,
        };
        info!(
            component = "pipeline",
            event = "qod.variable.finish",
            variable = variable.as_str(),
            faulty_rows = summary.faulty_rows,
            reward_faulty_rows = summary.reward_faulty_rows,
            minute_buckets = summary.minute_buckets,
            unavailable_minute_buckets = summary.unavailable_minute_buckets,
            hour_buckets = summary.hour_buckets
        );

        summaries.push(summary);
        runs.push(VariableRun {
            variable,
            annotated,
            minute_buckets,
            hour_buckets,
        });
    }

    let inputs: Vec<VariableScoringInput<'_>> = runs
        .iter()
        .map(|run| VariableScoringInput {
            variable: run.variable,
            timestamps,
            annotations: &run.annotated.annotations,
            minute_buckets: &run.minute_buckets,
            hour_buckets: &run.hour_buckets,
        })
        .collect();
    let result = score_day(day, day_start, cfg.model, &fingerprint, &inputs);

    info!(
        component = "pipeline",
        event = "qod.run.finish",
        day = %day,
        model = cfg.model.as_str(),
        qod_score = ?result.qod_score,
        rows = result.rows.len()
    );

    Ok(QodRun {
        series: series.clone(),
        variables: runs,
        result,
        report: QodRunReport {
            normalization: None,
            blanked_rows: 0,
            variables: summaries,
        },
    })
}
