//! Station models, per-variable QC parameters and annotation codes.
//!
//! Parameters arrive as a parallel-list table (one list per parameter, one
//! entry per weather variable). `StationParameterTable::into_config` turns
//! that table into one `VariableConfig` record per variable and rejects any
//! table whose lists disagree in length.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

pub const VARIABLE_COUNT: usize = 7;
pub const QOD_VERSION: &str = "1.0.6";

const RH_THRESHOLD: f64 = 95.0;
const RAIN_GAUGE_RESOLUTION_MM: f64 = 0.254;
const HOUR_TIMESLOT_MINUTES: u32 = 60;
const WARMUP_MINUTES: u32 = 360;
const SECONDS_PER_DAY: u32 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StationModel {
    #[serde(rename = "WS1000")]
    Ws1000,
    #[serde(rename = "WS2000")]
    Ws2000,
}

impl StationModel {
    pub fn as_str(self) -> &'static str {
        match self {
            StationModel::Ws1000 => "WS1000",
            StationModel::Ws2000 => "WS2000",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherVariable {
    Humidity,
    Temperature,
    WindDirection,
    WindSpeed,
    Pressure,
    Illuminance,
    PrecipitationAccumulated,
}

/// Processing order. Humidity and temperature come first because later
/// variables gate their constant checks on them.
pub const ALL_VARIABLES: [WeatherVariable; VARIABLE_COUNT] = [
    WeatherVariable::Humidity,
    WeatherVariable::Temperature,
    WeatherVariable::WindDirection,
    WeatherVariable::WindSpeed,
    WeatherVariable::Pressure,
    WeatherVariable::Illuminance,
    WeatherVariable::PrecipitationAccumulated,
];

/// Column order of input files and of the daily output table.
pub const OUTPUT_VARIABLES: [WeatherVariable; VARIABLE_COUNT] = [
    WeatherVariable::Temperature,
    WeatherVariable::Humidity,
    WeatherVariable::WindSpeed,
    WeatherVariable::WindDirection,
    WeatherVariable::Pressure,
    WeatherVariable::Illuminance,
    WeatherVariable::PrecipitationAccumulated,
];

impl WeatherVariable {
    pub fn as_str(self) -> &'static str {
        match self {
            WeatherVariable::Humidity => "humidity",
            WeatherVariable::Temperature => "temperature",
            WeatherVariable::WindDirection => "wind_direction",
            WeatherVariable::WindSpeed => "wind_speed",
            WeatherVariable::Pressure => "pressure",
            WeatherVariable::Illuminance => "illuminance",
            WeatherVariable::PrecipitationAccumulated => "precipitation_accumulated",
        }
    }

    /// Position in `ALL_VARIABLES`; used to index per-variable storage.
    pub fn index(self) -> usize {
        match self {
            WeatherVariable::Humidity => 0,
            WeatherVariable::Temperature => 1,
            WeatherVariable::WindDirection => 2,
            WeatherVariable::WindSpeed => 3,
            WeatherVariable::Pressure => 4,
            WeatherVariable::Illuminance => 5,
            WeatherVariable::PrecipitationAccumulated => 6,
        }
    }

    pub fn is_wind(self) -> bool {
        matches!(
            self,
            WeatherVariable::WindDirection | WeatherVariable::WindSpeed
        )
    }

    pub fn is_precipitation(self) -> bool {
        self == WeatherVariable::PrecipitationAccumulated
    }

    /// Wind direction wraps around and precipitation only accumulates, so
    /// differencing them says nothing about spikes.
    pub fn is_jump_exempt(self) -> bool {
        matches!(
            self,
            WeatherVariable::WindDirection | WeatherVariable::PrecipitationAccumulated
        )
    }
}

pub fn parse_station_model(input: &str) -> Result<StationModel, ConfigError> {
    match input.trim().to_ascii_uppercase().as_str() {
        "WS1000" => Ok(StationModel::Ws1000),
        "WS2000" => Ok(StationModel::Ws2000),
        _ => Err(ConfigError::UnknownModel(input.to_string())),
    }
}

pub fn parse_variable(input: &str) -> Result<WeatherVariable, ConfigError> {
    ALL_VARIABLES
        .iter()
        .copied()
        .find(|variable| variable.as_str() == input.trim())
        .ok_or_else(|| ConfigError::UnknownVariable(input.to_string()))
}

/// Fault categories, raw-level first, then bucket-level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    #[serde(rename = "OBC")]
    OutOfBounds,
    #[serde(rename = "SPIKES_INST")]
    InvalidDatum,
    #[serde(rename = "NO_MEDIAN")]
    UnidentifiedSpike,
    #[serde(rename = "NO_DATA")]
    NoDatum,
    #[serde(rename = "SHORT_CONST")]
    ShortConstant,
    #[serde(rename = "LONG_CONST")]
    LongConstant,
    #[serde(rename = "FROZEN_SENSOR")]
    FrozenSensor,
    #[serde(rename = "ANOMALOUS_INCREASE")]
    AnomalousIncrease,
    #[serde(rename = "NO_DATA_MIN")]
    NoDataMinute,
}

/// Raw-level categories in label order.
pub const RAW_FAULTS: [FaultKind; 7] = [
    FaultKind::OutOfBounds,
    FaultKind::InvalidDatum,
    FaultKind::UnidentifiedSpike,
    FaultKind::NoDatum,
    FaultKind::ShortConstant,
    FaultKind::LongConstant,
    FaultKind::FrozenSensor,
];

impl FaultKind {
    pub fn label(self) -> &'static str {
        match self {
            FaultKind::OutOfBounds => "OBC",
            FaultKind::InvalidDatum => "SPIKES_INST",
            FaultKind::UnidentifiedSpike => "NO_MEDIAN",
            FaultKind::NoDatum => "NO_DATA",
            FaultKind::ShortConstant => "SHORT_CONST",
            FaultKind::LongConstant => "LONG_CONST",
            FaultKind::FrozenSensor => "FROZEN_SENSOR",
            FaultKind::AnomalousIncrease => "ANOMALOUS_INCREASE",
            FaultKind::NoDataMinute => "NO_DATA_MIN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationCodes {
    pub out_of_bounds: u8,
    pub unidentified_spike: u8,
    pub no_datum: u8,
    pub invalid_datum: u8,
    pub constant: u8,
    pub constant_frozen: u8,
    pub constant_long: u8,
}

impl Default for AnnotationCodes {
    fn default() -> Self {
        Self {
            out_of_bounds: 1,
            unidentified_spike: 2,
            no_datum: 3,
            invalid_datum: 4,
            constant: 5,
            constant_frozen: 6,
            constant_long: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableConfig {
    pub variable: WeatherVariable,
    /// Minimum present fraction for a rolling median; `None` disables it.
    pub median_availability: Option<f64>,
    pub minute_availability: f64,
    pub hour_availability: f64,
    pub raw_jump_threshold: Option<f64>,
    pub minute_jump_threshold: Option<f64>,
    pub averaging_period_minutes: u32,
    pub short_constant_window_minutes: Option<u32>,
    pub long_constant_window_minutes: Option<u32>,
    pub lower_limit: f64,
    pub upper_limit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationConfig {
    pub model: StationModel,
    pub timestep_seconds: u32,
    pub median_window_minutes: u32,
    pub ignoring_period_seconds: u32,
    pub hour_timeslot_minutes: u32,
    pub warmup_minutes: u32,
    pub rh_threshold: f64,
    pub rain_gauge_resolution_mm: f64,
    pub codes: AnnotationCodes,
    pub minute_buckets_are_hourly: bool,
    pub wind_speed_follows_direction: bool,
    pub reward_exempt_faults: Vec<FaultKind>,
    pub variables: Vec<VariableConfig>,
}

impl StationConfig {
    pub fn for_model(model: StationModel) -> Result<Self, ConfigError> {
        StationParameterTable::for_model(model).into_config()
    }

    pub fn variable(&self, variable: WeatherVariable) -> Option<&VariableConfig> {
        self.variables.iter().find(|cfg| cfg.variable == variable)
    }

    pub fn timestep_ms(&self) -> i64 {
        i64::from(self.timestep_seconds) * 1_000
    }

    pub fn time_tolerance_ms(&self) -> i64 {
        self.timestep_ms() / 2
    }

    /// Rows a gap may be bridged for, `round(ignoring_period / timestep)`.
    pub fn gap_fill_rows(&self) -> usize {
        (f64::from(self.ignoring_period_seconds) / f64::from(self.timestep_seconds)).round() as usize
    }

    pub fn counts_for_reward(&self, kind: FaultKind) -> bool {
        !self.reward_exempt_faults.contains(&kind)
    }

    pub fn fingerprint(&self) -> String {
        config_fingerprint(self)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown station model: {0}")]
    UnknownModel(String),
    #[error("unknown weather variable: {0}")]
    UnknownVariable(String),
    #[error("parameter list {parameter} has {found} entries, expected {expected}")]
    MismatchedLength {
        parameter: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("weather variable {0} is configured more than once")]
    DuplicateVariable(String),
    #[error("weather variable {0} is not configured")]
    MissingVariable(String),
    #[error("invalid station config: {0}")]
    InvalidConfig(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Station parameters as delivered: one list per parameter, each indexed
/// like `variables`. Not-applicable entries are `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationParameterTable {
    pub model: StationModel,
    pub timestep_seconds: u32,
    pub median_window_minutes: u32,
    pub ignoring_period_seconds: u32,
    pub hour_timeslot_minutes: u32,
    pub warmup_minutes: u32,
    pub rh_threshold: f64,
    pub rain_gauge_resolution_mm: f64,
    #[serde(default)]
    pub codes: AnnotationCodes,
    #[serde(default)]
    pub minute_buckets_are_hourly: bool,
    #[serde(default)]
    pub wind_speed_follows_direction: bool,
    #[serde(default)]
    pub reward_exempt_faults: Vec<FaultKind>,
    pub variables: Vec<String>,
    pub median_availability: Vec<Option<f64>>,
    pub minute_availability: Vec<f64>,
    pub hour_availability: Vec<f64>,
    pub raw_jump_thresholds: Vec<Option<f64>>,
    pub minute_jump_thresholds: Vec<Option<f64>>,
    pub averaging_period_minutes: Vec<u32>,
    pub short_constant_window_minutes: Vec<Option<u32>>,
    pub long_constant_window_minutes: Vec<Option<u32>>,
    pub lower_limits: Vec<f64>,
    pub upper_limits: Vec<f64>,
}

impl StationParameterTable {
    pub fn for_model(model: StationModel) -> Self {
        match model {
            StationModel::Ws1000 => ws1000_table(),
            StationModel::Ws2000 => ws2000_table(),
        }
    }

    pub fn from_json_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let table: StationParameterTable = serde_json::from_str(&raw)?;
        info!(
            component = "station",
            event = "config.loaded",
            path = %path.display(),
            model = table.model.as_str(),
            variables = table.variables.len()
        );
        Ok(table)
    }

    pub fn into_config(self) -> Result<StationConfig, ConfigError> {
        let expected = self.variables.len();
        check_len("median_availability", expected, self.median_availability.len())?;
        check_len("minute_availability", expected, self.minute_availability.len())?;
        check_len("hour_availability", expected, self.hour_availability.len())?;
        check_len("raw_jump_thresholds", expected, self.raw_jump_thresholds.len())?;
        check_len(
            "minute_jump_thresholds",
            expected,
            self.minute_jump_thresholds.len(),
        )?;
        check_len(
            "averaging_period_minutes",
            expected,
            self.averaging_period_minutes.len(),
        )?;
        check_len(
            "short_constant_window_minutes",
            expected,
            self.short_constant_window_minutes.len(),
        )?;
        check_len(
            "long_constant_window_minutes",
            expected,
            self.long_constant_window_minutes.len(),
        )?;
        check_len("lower_limits", expected, self.lower_limits.len())?;
        check_len("upper_limits", expected, self.upper_limits.len())?;

        let mut seen = HashSet::new();
        let mut variables = Vec::with_capacity(expected);
        for (idx, name) in self.variables.iter().enumerate() {
            let variable = parse_variable(name)?;
            if !seen.insert(variable) {
                return Err(ConfigError::DuplicateVariable(name.clone()));
            }
            variables.push(VariableConfig {
                variable,
                median_availability: self.median_availability[idx],
                minute_availability: self.minute_availability[idx],
                hour_availability: self.hour_availability[idx],
                raw_jump_threshold: self.raw_jump_thresholds[idx],
                minute_jump_threshold: self.minute_jump_thresholds[idx],
                averaging_period_minutes: self.averaging_period_minutes[idx],
                short_constant_window_minutes: self.short_constant_window_minutes[idx],
                long_constant_window_minutes: self.long_constant_window_minutes[idx],
                lower_limit: self.lower_limits[idx],
                upper_limit: self.upper_limits[idx],
            });
        }

        for variable in ALL_VARIABLES {
            if !seen.contains(&variable) {
                return Err(ConfigError::MissingVariable(variable.as_str().to_string()));
            }
        }

        let config = StationConfig {
            model: self.model,
            timestep_seconds: self.timestep_seconds,
            median_window_minutes: self.median_window_minutes,
            ignoring_period_seconds: self.ignoring_period_seconds,
            hour_timeslot_minutes: self.hour_timeslot_minutes,
            warmup_minutes: self.warmup_minutes,
            rh_threshold: self.rh_threshold,
            rain_gauge_resolution_mm: self.rain_gauge_resolution_mm,
            codes: self.codes,
            minute_buckets_are_hourly: self.minute_buckets_are_hourly,
            wind_speed_follows_direction: self.wind_speed_follows_direction,
            reward_exempt_faults: self.reward_exempt_faults,
            variables,
        };
        validate_config(&config)?;
        Ok(config)
    }
}

pub fn config_fingerprint(cfg: &StationConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("model:{};", cfg.model.as_str()));
    hasher.update(format!("timestep_seconds:{};", cfg.timestep_seconds));
    hasher.update(format!("median_window_minutes:{};", cfg.median_window_minutes));
    hasher.update(format!(
        "ignoring_period_seconds:{};",
        cfg.ignoring_period_seconds
    ));
    hasher.update(format!("hour_timeslot_minutes:{};", cfg.hour_timeslot_minutes));
    hasher.update(format!("warmup_minutes:{};", cfg.warmup_minutes));
    hasher.update(format!("rh_threshold:{};", cfg.rh_threshold));
    hasher.update(format!(
        "rain_gauge_resolution_mm:{};",
        cfg.rain_gauge_resolution_mm
    ));
    hasher.update(format!("codes:{:?};", cfg.codes));
    hasher.update(format!(
        "minute_buckets_are_hourly:{};wind_speed_follows_direction:{};",
        cfg.minute_buckets_are_hourly, cfg.wind_speed_follows_direction
    ));
    hasher.update("reward_exempt:");
    for kind in &cfg.reward_exempt_faults {
        hasher.update(format!("{},", kind.label()));
    }
    hasher.update(";variables:");
    for var in &cfg.variables {
        hasher.update(format!("{:?};", var));
    }
    hex::encode(hasher.finalize())
}

fn check_len(parameter: &'static str, expected: usize, found: usize) -> Result<(), ConfigError> {
    if found != expected {
        return Err(ConfigError::MismatchedLength {
            parameter,
            expected,
            found,
        });
    }
    Ok(())
}

fn validate_config(cfg: &StationConfig) -> Result<(), ConfigError> {
    if cfg.timestep_seconds == 0 {
        return Err(ConfigError::InvalidConfig(
            "timestep_seconds must be > 0".to_string(),
        ));
    }
    if SECONDS_PER_DAY % cfg.timestep_seconds != 0 {
        return Err(ConfigError::InvalidConfig(
            "timestep_seconds must divide a day".to_string(),
        ));
    }
    if (cfg.warmup_minutes * 60) % cfg.timestep_seconds != 0 {
        return Err(ConfigError::InvalidConfig(
            "warmup_minutes must be a whole number of timesteps".to_string(),
        ));
    }
    if cfg.median_window_minutes == 0 {
        return Err(ConfigError::InvalidConfig(
            "median_window_minutes must be > 0".to_string(),
        ));
    }
    if cfg.hour_timeslot_minutes == 0 || 1_440 % cfg.hour_timeslot_minutes != 0 {
        return Err(ConfigError::InvalidConfig(
            "hour_timeslot_minutes must be > 0 and divide a day".to_string(),
        ));
    }
    if !cfg.rh_threshold.is_finite() {
        return Err(ConfigError::InvalidConfig(
            "rh_threshold must be finite".to_string(),
        ));
    }
    if !cfg.rain_gauge_resolution_mm.is_finite() || cfg.rain_gauge_resolution_mm <= 0.0 {
        return Err(ConfigError::InvalidConfig(
            "rain_gauge_resolution_mm must be finite and > 0".to_string(),
        ));
    }

    for var in &cfg.variables {
        let name = var.variable.as_str();
        if var.averaging_period_minutes == 0
            || cfg.hour_timeslot_minutes % var.averaging_period_minutes != 0
        {
            return Err(ConfigError::InvalidConfig(format!(
                "{name}: averaging_period_minutes must be > 0 and divide hour_timeslot_minutes"
            )));
        }
        if cfg.minute_buckets_are_hourly && var.averaging_period_minutes != cfg.hour_timeslot_minutes
        {
            return Err(ConfigError::InvalidConfig(format!(
                "{name}: hourly minute buckets require averaging_period_minutes == hour_timeslot_minutes"
            )));
        }
        if !var.lower_limit.is_finite()
            || !var.upper_limit.is_finite()
            || var.lower_limit > var.upper_limit
        {
            return Err(ConfigError::InvalidConfig(format!(
                "{name}: limits must be finite with lower <= upper"
            )));
        }
        // A single gauge tick must pass the delta check.
        if var.variable.is_precipitation() && var.upper_limit < cfg.rain_gauge_resolution_mm {
            return Err(ConfigError::InvalidConfig(format!(
                "{name}: upper limit is below one rain gauge tick"
            )));
        }
        let fractions = [
            var.median_availability,
            Some(var.minute_availability),
            Some(var.hour_availability),
        ];
        for fraction in fractions.into_iter().flatten() {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(ConfigError::InvalidConfig(format!(
                    "{name}: availability thresholds must be within [0, 1]"
                )));
            }
        }
        for threshold in [var.raw_jump_threshold, var.minute_jump_threshold]
            .into_iter()
            .flatten()
        {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "{name}: jump thresholds must be finite and >= 0"
                )));
            }
        }
        for window in [
            var.short_constant_window_minutes,
            var.long_constant_window_minutes,
        ]
        .into_iter()
        .flatten()
        {
            if window == 0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "{name}: constant windows must be > 0"
                )));
            }
        }
    }

    Ok(())
}

fn variable_names() -> Vec<String> {
    ALL_VARIABLES
        .iter()
        .map(|variable| variable.as_str().to_string())
        .collect()
}

fn ws1000_table() -> StationParameterTable {
    let timestep_seconds = 16;
    StationParameterTable {
        model: StationModel::Ws1000,
        timestep_seconds,
        median_window_minutes: 10,
        ignoring_period_seconds: 60,
        hour_timeslot_minutes: HOUR_TIMESLOT_MINUTES,
        warmup_minutes: WARMUP_MINUTES,
        rh_threshold: RH_THRESHOLD,
        rain_gauge_resolution_mm: RAIN_GAUGE_RESOLUTION_MM,
        codes: AnnotationCodes::default(),
        minute_buckets_are_hourly: false,
        wind_speed_follows_direction: false,
        reward_exempt_faults: Vec::new(),
        variables: variable_names(),
        median_availability: vec![
            Some(0.67),
            Some(0.67),
            Some(0.75),
            Some(0.75),
            Some(0.67),
            Some(0.67),
            None,
        ],
        minute_availability: vec![0.25; VARIABLE_COUNT],
        hour_availability: vec![0.67, 0.67, 0.75, 0.75, 0.67, 0.67, 0.85],
        raw_jump_thresholds: vec![
            Some(5.0),
            Some(2.0),
            None,
            Some(20.0),
            Some(0.3),
            Some(97_600.0),
            None,
        ],
        minute_jump_thresholds: vec![
            Some(10.0),
            Some(3.0),
            None,
            Some(10.0),
            Some(0.5),
            Some(97_600.0),
            None,
        ],
        averaging_period_minutes: vec![1, 1, 2, 2, 1, 1, 1],
        short_constant_window_minutes: vec![
            Some(360),
            Some(240),
            Some(360),
            Some(360),
            Some(120),
            Some(120),
            None,
        ],
        long_constant_window_minutes: vec![
            None,
            Some(1_440),
            Some(1_440),
            Some(1_440),
            Some(1_440),
            None,
            None,
        ],
        lower_limits: vec![10.0, -40.0, 0.0, 0.0, 300.0, 0.0, 0.0],
        upper_limits: vec![
            99.0,
            60.0,
            359.0,
            50.0,
            1_100.0,
            400_000.0,
            RAIN_GAUGE_RESOLUTION_MM * f64::from(timestep_seconds),
        ],
    }
}

fn ws2000_table() -> StationParameterTable {
    let timestep_seconds = 180;
    let base_thresholds = [
        Some(10.0),
        Some(3.0),
        Some(10.0),
        Some(10.0),
        Some(0.5),
        Some(97_600.0),
        None,
    ];
    let threshold_caps = [
        Some(80.0),
        Some(15.0),
        None,
        Some(15.0),
        Some(15.0),
        Some(146_400.0),
        None,
    ];
    let base_periods_minutes = [1.0, 1.0, 2.0, 2.0, 1.0, 1.0, 1.0];
    let raw_jump_thresholds = (0..VARIABLE_COUNT)
        .map(|idx| {
            scale_threshold(
                base_thresholds[idx],
                threshold_caps[idx],
                base_periods_minutes[idx],
                timestep_seconds,
            )
        })
        .collect();

    StationParameterTable {
        model: StationModel::Ws2000,
        timestep_seconds,
        median_window_minutes: 60,
        ignoring_period_seconds: 180,
        hour_timeslot_minutes: HOUR_TIMESLOT_MINUTES,
        warmup_minutes: WARMUP_MINUTES,
        rh_threshold: RH_THRESHOLD,
        rain_gauge_resolution_mm: RAIN_GAUGE_RESOLUTION_MM,
        codes: AnnotationCodes::default(),
        minute_buckets_are_hourly: true,
        wind_speed_follows_direction: true,
        reward_exempt_faults: Vec::new(),
        variables: variable_names(),
        median_availability: vec![
            Some(0.67),
            Some(0.67),
            Some(0.75),
            Some(0.75),
            Some(0.67),
            Some(0.67),
            None,
        ],
        minute_availability: vec![0.25; VARIABLE_COUNT],
        hour_availability: vec![0.67, 0.67, 0.75, 0.75, 0.67, 0.67, 0.85],
        raw_jump_thresholds,
        minute_jump_thresholds: vec![None; VARIABLE_COUNT],
        averaging_period_minutes: vec![HOUR_TIMESLOT_MINUTES; VARIABLE_COUNT],
        short_constant_window_minutes: vec![
            Some(360),
            Some(240),
            Some(360),
            Some(360),
            Some(120),
            Some(120),
            None,
        ],
        long_constant_window_minutes: vec![
            None,
            Some(1_440),
            Some(1_440),
            Some(1_440),
            Some(1_440),
            None,
            None,
        ],
        lower_limits: vec![1.0, -40.0, 0.0, 0.0, 540.0, 0.0, 0.0],
        upper_limits: vec![
            99.0,
            80.0,
            359.0,
            50.0,
            1_100.0,
            200_000.0,
            RAIN_GAUGE_RESOLUTION_MM * f64::from(timestep_seconds),
        ],
    }
}

/// Scales a per-minute jump threshold to a coarser cadence, capped.
fn scale_threshold(
    base: Option<f64>,
    cap: Option<f64>,
    base_period_minutes: f64,
    timestep_seconds: u32,
) -> Option<f64> {
    let (base, cap) = (base?, cap?);
    let scaled = base * (f64::from(timestep_seconds) / 60.0) / base_period_minutes;
    Some(cap.min(scaled))
}
