//! Constant-value and frozen-sensor detection over trailing time windows.
//!
//! Detection runs in two passes. The first walks the series forward and
//! records every window `[ts - length, ts]` whose contents are constant and
//! pass the variable's gate. The second stamps each recorded verdict onto
//! all rows of its window in discovery order, so the most recent window
//! wins wherever windows overlap.

use serde::{Deserialize, Serialize};

use crate::rolling::RollingWindow;
use crate::series::MS_PER_MINUTE;
use crate::station::{StationConfig, VariableConfig, WeatherVariable};

/// Above this humidity a still wind sensor is more likely badly deployed
/// than frozen or stuck.
const WIND_HUMIDITY_GATE: f64 = 85.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantFlags {
    pub short_constant: Vec<bool>,
    pub long_constant: Vec<bool>,
    pub frozen: Vec<bool>,
}

impl ConstantFlags {
    pub fn none(len: usize) -> Self {
        Self {
            short_constant: vec![false; len],
            long_constant: vec![false; len],
            frozen: vec![false; len],
        }
    }

    pub fn len(&self) -> usize {
        self.short_constant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.short_constant.is_empty()
    }
}

/// Columns a constant check may consult. All slices share the grid.
#[derive(Debug, Clone, Copy)]
pub struct ConstantInputs<'a> {
    pub timestamps: &'a [i64],
    pub filled: &'a [Option<f64>],
    pub humidity: &'a [Option<f64>],
    pub temperature: &'a [Option<f64>],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Constant,
    Frozen,
    LongConstant,
}

#[derive(Debug, Clone, Copy)]
struct ConstantWindow {
    start: usize,
    end: usize,
    verdict: Verdict,
}

#[derive(Debug, Clone, Copy)]
struct WindowContext {
    value: f64,
    humidity_median: Option<f64>,
    temperature_median: Option<f64>,
}

pub fn detect_constant(
    cfg: &StationConfig,
    var_cfg: &VariableConfig,
    inputs: ConstantInputs<'_>,
) -> ConstantFlags {
    let len = inputs.filled.len();
    let mut flags = ConstantFlags::none(len);
    if var_cfg.variable.is_precipitation() || len == 0 {
        return flags;
    }

    let run_start = constant_run_starts(inputs.filled);

    if let Some(minutes) = var_cfg.short_constant_window_minutes {
        let windows = scan_windows(inputs, &run_start, minutes, |ctx| {
            short_verdict(var_cfg.variable, cfg.rh_threshold, ctx)
        });
        let mut short: Vec<Option<Verdict>> = vec![None; len];
        for window in &windows {
            for slot in &mut short[window.start..=window.end] {
                *slot = Some(window.verdict);
            }
        }
        for (idx, verdict) in short.iter().enumerate() {
            match verdict {
                Some(Verdict::Constant) => flags.short_constant[idx] = true,
                Some(Verdict::Frozen) => flags.frozen[idx] = true,
                _ => {}
            }
        }
    }

    if let Some(minutes) = var_cfg.long_constant_window_minutes {
        let windows = scan_windows(inputs, &run_start, minutes, |ctx| {
            long_verdict(var_cfg.variable, ctx)
        });
        for window in &windows {
            for slot in &mut flags.long_constant[window.start..=window.end] {
                *slot = true;
            }
        }
    }

    if var_cfg.variable.is_wind() {
        apply_wind_precedence(&mut flags);
    }

    flags
}

/// Clears each wind-speed constant flag wherever wind direction lacks the
/// same flag: a still cup under a moving vane is not a fault.
pub fn suppress_speed_without_direction(
    speed: &ConstantFlags,
    direction: &ConstantFlags,
) -> ConstantFlags {
    let mut out = speed.clone();
    for idx in 0..out.len().min(direction.len()) {
        out.short_constant[idx] &= direction.short_constant[idx];
        out.long_constant[idx] &= direction.long_constant[idx];
        out.frozen[idx] &= direction.frozen[idx];
    }
    out
}

/// Frozen beats long constant, long beats short.
fn apply_wind_precedence(flags: &mut ConstantFlags) {
    for idx in 0..flags.len() {
        if flags.frozen[idx] {
            flags.long_constant[idx] = false;
            flags.short_constant[idx] = false;
        } else if flags.long_constant[idx] {
            flags.short_constant[idx] = false;
        }
    }
}

/// Index where the run of identical present values ending at each row
/// begins; `None` for missing rows.
fn constant_run_starts(filled: &[Option<f64>]) -> Vec<Option<usize>> {
    let mut out: Vec<Option<usize>> = Vec::with_capacity(filled.len());
    for idx in 0..filled.len() {
        let start = match filled[idx] {
            None => None,
            Some(value) => {
                let continues = idx > 0 && filled[idx - 1] == Some(value);
                if continues {
                    out[idx - 1]
                } else {
                    Some(idx)
                }
            }
        };
        out.push(start);
    }
    out
}

fn scan_windows<F>(
    inputs: ConstantInputs<'_>,
    run_start: &[Option<usize>],
    window_minutes: u32,
    verdict: F,
) -> Vec<ConstantWindow>
where
    F: Fn(WindowContext) -> Option<Verdict>,
{
    let timestamps = inputs.timestamps;
    let length_ms = i64::from(window_minutes) * MS_PER_MINUTE;
    let Some(first_ts) = timestamps.first().copied() else {
        return Vec::new();
    };

    let mut humidity = RollingWindow::new();
    let mut temperature = RollingWindow::new();
    let mut start = 0usize;
    let mut windows = Vec::new();

    for (end, ts) in timestamps.iter().copied().enumerate() {
        let window_start_ts = ts - length_ms;
        humidity.push(ts, inputs.humidity[end]);
        temperature.push(ts, inputs.temperature[end]);
        humidity.evict_before(window_start_ts);
        temperature.evict_before(window_start_ts);
        while timestamps[start] < window_start_ts {
            start += 1;
        }

        if window_start_ts < first_ts {
            continue;
        }
        let Some(value) = inputs.filled[end] else {
            continue;
        };
        let is_constant = matches!(run_start[end], Some(run) if run <= start);
        if !is_constant {
            continue;
        }

        let ctx = WindowContext {
            value,
            humidity_median: humidity.median(),
            temperature_median: temperature.median(),
        };
        if let Some(verdict) = verdict(ctx) {
            windows.push(ConstantWindow {
                start,
                end,
                verdict,
            });
        }
    }

    windows
}

fn below(median: Option<f64>, threshold: f64) -> bool {
    matches!(median, Some(m) if m < threshold)
}

fn at_or_above(median: Option<f64>, threshold: f64) -> bool {
    matches!(median, Some(m) if m >= threshold)
}

fn freezing(median: Option<f64>) -> bool {
    matches!(median, Some(m) if m <= 0.0)
}

fn thawed(median: Option<f64>) -> bool {
    matches!(median, Some(m) if m > 0.0)
}

fn short_verdict(variable: WeatherVariable, rh_threshold: f64, ctx: WindowContext) -> Option<Verdict> {
    let hum = ctx.humidity_median;
    let temp = ctx.temperature_median;
    match variable {
        WeatherVariable::Humidity | WeatherVariable::Temperature => {
            below(hum, rh_threshold).then_some(Verdict::Constant)
        }
        WeatherVariable::WindDirection => {
            if freezing(temp) {
                Some(Verdict::Frozen)
            } else if thawed(temp) && below(hum, WIND_HUMIDITY_GATE) {
                Some(Verdict::Constant)
            } else {
                None
            }
        }
        WeatherVariable::WindSpeed => {
            if ctx.value != 0.0 {
                Some(Verdict::Constant)
            } else if freezing(temp) {
                if at_or_above(hum, WIND_HUMIDITY_GATE) {
                    Some(Verdict::Constant)
                } else {
                    Some(Verdict::Frozen)
                }
            } else if thawed(temp) && below(hum, WIND_HUMIDITY_GATE) {
                Some(Verdict::Constant)
            } else {
                None
            }
        }
        WeatherVariable::Illuminance => (ctx.value != 0.0).then_some(Verdict::Constant),
        WeatherVariable::Pressure => Some(Verdict::Constant),
        WeatherVariable::PrecipitationAccumulated => None,
    }
}

fn long_verdict(variable: WeatherVariable, ctx: WindowContext) -> Option<Verdict> {
    match variable {
        WeatherVariable::Temperature => Some(Verdict::LongConstant),
        WeatherVariable::WindDirection | WeatherVariable::WindSpeed => {
            thawed(ctx.temperature_median).then_some(Verdict::LongConstant)
        }
        _ => None,
    }
}
