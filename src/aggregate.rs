//! Minute and hour buckets built from annotated raw rows.
//!
//! Buckets are right-closed `(end - period, end]` and aligned to the wall
//! clock. Minute buckets read raw rows; hour buckets read minute buckets
//! with the same rules one level up.

use serde::{Deserialize, Serialize};

use crate::annotation::{merge_labels, AnnotatedVariable};
use crate::jump::{consecutive_diff_abs, distance_from_median, mark_jumps};
use crate::range_check::precipitation_delta_ceiling;
use crate::rolling::rolling_median;
use crate::series::MS_PER_MINUTE;
use crate::station::{FaultKind, StationConfig, VariableConfig, WeatherVariable};

/// Mean wind vector; `u` points east, `v` north, both toward the source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindComponents {
    pub u: f64,
    pub v: f64,
}

impl WindComponents {
    pub fn from_speed_direction(speed: f64, direction_deg: f64) -> Self {
        let rad = direction_deg.to_radians();
        Self {
            u: -speed * rad.sin(),
            v: -speed * rad.cos(),
        }
    }

    pub fn mean(components: &[WindComponents]) -> Option<Self> {
        if components.is_empty() {
            return None;
        }
        let n = components.len() as f64;
        Some(Self {
            u: components.iter().map(|c| c.u).sum::<f64>() / n,
            v: components.iter().map(|c| c.v).sum::<f64>() / n,
        })
    }

    pub fn speed(&self) -> f64 {
        (self.u * self.u + self.v * self.v).sqrt()
    }

    /// Meteorological direction in degrees, within `[0, 360]`.
    pub fn direction(&self) -> f64 {
        let deg = self.u.atan2(self.v).to_degrees();
        if deg < 180.0 {
            deg + 180.0
        } else if deg > 180.0 {
            deg - 180.0
        } else {
            deg
        }
    }

    fn value_for(&self, variable: WeatherVariable) -> f64 {
        if variable == WeatherVariable::WindDirection {
            self.direction()
        } else {
            self.speed()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketJump {
    pub rolling_median: Option<f64>,
    pub diff_abs: Option<f64>,
    pub median_diff_abs: Option<f64>,
    pub jump_couple: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub end_ts_ms_utc: i64,
    pub slots: u32,
    pub present: u32,
    pub missing: u32,
    pub faulty: u32,
    pub reward_faulty: u32,
    pub labels: Vec<FaultKind>,
    pub mean: Option<f64>,
    pub corrected_mean: Option<f64>,
    pub wind: Option<WindComponents>,
    pub corrected_wind: Option<WindComponents>,
    pub valid_percentage: f64,
    pub valid_percentage_rewards: f64,
    pub unavailable: bool,
    pub unavailable_rewards: bool,
    /// Bucket-level jump columns; `None` when the variable is not checked.
    pub jump: Option<BucketJump>,
    pub anomalous: bool,
    pub total: bool,
    pub total_rewards: bool,
}

/// Raw wind columns shared by both wind pipelines.
#[derive(Debug, Clone, Copy)]
pub struct WindRaw<'a> {
    pub speed: &'a [Option<f64>],
    pub direction: &'a [Option<f64>],
}

impl WindRaw<'_> {
    fn components(&self, idx: usize) -> Option<WindComponents> {
        match (self.speed[idx], self.direction[idx]) {
            (Some(s), Some(d)) => Some(WindComponents::from_speed_direction(s, d)),
            _ => None,
        }
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// End of the right-closed bucket of length `period_ms` holding `ts`.
pub fn bucket_end(ts_ms_utc: i64, period_ms: i64) -> i64 {
    let floor = ts_ms_utc.div_euclid(period_ms) * period_ms;
    if floor == ts_ms_utc {
        floor
    } else {
        floor + period_ms
    }
}

/// Consecutive index ranges sharing one bucket end.
fn group_by_bucket(timestamps: &[i64], period_ms: i64) -> Vec<(i64, std::ops::Range<usize>)> {
    let mut groups: Vec<(i64, std::ops::Range<usize>)> = Vec::new();
    for (idx, ts) in timestamps.iter().enumerate() {
        let end = bucket_end(*ts, period_ms);
        match groups.last_mut() {
            Some((last_end, range)) if *last_end == end => range.end = idx + 1,
            _ => groups.push((end, idx..idx + 1)),
        }
    }
    groups
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn fraction(count: u32, slots: u32) -> f64 {
    if slots == 0 {
        0.0
    } else {
        f64::from(count) / f64::from(slots)
    }
}

fn fill_availability(bucket: &mut Bucket, availability: f64) {
    let slots = bucket.slots;
    let good = slots.saturating_sub(bucket.faulty);
    let good_rewards = slots.saturating_sub(bucket.reward_faulty);
    bucket.valid_percentage = round_to(fraction(good, slots) * 100.0, 2);
    bucket.valid_percentage_rewards = round_to(fraction(good_rewards, slots) * 100.0, 2);
    bucket.unavailable = fraction(good, slots) < availability;
    bucket.unavailable_rewards = fraction(good_rewards, slots) < availability;
}

fn empty_bucket(end_ts_ms_utc: i64) -> Bucket {
    Bucket {
        end_ts_ms_utc,
        slots: 0,
        present: 0,
        missing: 0,
        faulty: 0,
        reward_faulty: 0,
        labels: Vec::new(),
        mean: None,
        corrected_mean: None,
        wind: None,
        corrected_wind: None,
        valid_percentage: 0.0,
        valid_percentage_rewards: 0.0,
        unavailable: false,
        unavailable_rewards: false,
        jump: None,
        anomalous: false,
        total: false,
        total_rewards: false,
    }
}

/// Aggregates annotated raw rows into `averaging_period` buckets, runs the
/// bucket-level jump check and drops buckets ending at or before
/// `report_start_ms_utc`.
pub fn aggregate_minutes(
    cfg: &StationConfig,
    var_cfg: &VariableConfig,
    timestamps: &[i64],
    annotated: &AnnotatedVariable,
    wind: Option<WindRaw<'_>>,
    report_start_ms_utc: i64,
) -> Vec<Bucket> {
    let period_ms = i64::from(var_cfg.averaging_period_minutes) * MS_PER_MINUTE;
    let variable = var_cfg.variable;
    let ann = &annotated.annotations;
    let raw = &annotated.gap.raw;

    let mut buckets = Vec::new();
    for (end, range) in group_by_bucket(timestamps, period_ms) {
        let mut bucket = empty_bucket(end);
        let mut values = Vec::new();
        let mut good_values = Vec::new();
        let mut components = Vec::new();
        let mut good_components = Vec::new();
        let mut precipitation_sum = 0.0;

        for idx in range {
            bucket.slots += 1;
            if raw[idx].is_some() {
                bucket.present += 1;
            } else {
                bucket.missing += 1;
            }
            if ann.total[idx] {
                bucket.faulty += 1;
            }
            if ann.reward[idx] {
                bucket.reward_faulty += 1;
            }
            merge_labels(&mut bucket.labels, &ann.labels_at(idx));

            if let Some(v) = raw[idx] {
                values.push(v);
                if !ann.total[idx] {
                    good_values.push(v);
                }
            }
            if let Some(wind) = &wind {
                if let Some(c) = wind.components(idx) {
                    components.push(c);
                    if !ann.total[idx] {
                        good_components.push(c);
                    }
                }
            }
            if let Some(deltas) = &annotated.range.precipitation_delta {
                if let Some(delta) = deltas[idx] {
                    let ceiling =
                        precipitation_delta_ceiling(var_cfg.upper_limit, annotated.gap.fill_count[idx]);
                    if delta > 0.0 && delta <= ceiling {
                        precipitation_sum += delta;
                    }
                }
            }
        }

        let non_faulty = bucket.slots - bucket.faulty;
        let corrected_allowed = fraction(non_faulty, bucket.slots) > var_cfg.minute_availability;

        if variable.is_precipitation() {
            let sum = round_to(precipitation_sum, 2);
            bucket.mean = Some(sum);
            bucket.corrected_mean = Some(sum);
        } else if variable.is_wind() && wind.is_some() {
            bucket.wind = WindComponents::mean(&components);
            bucket.mean = bucket.wind.map(|w| round_to(w.value_for(variable), 2));
            if corrected_allowed {
                bucket.corrected_wind = WindComponents::mean(&good_components);
                bucket.corrected_mean = bucket
                    .corrected_wind
                    .map(|w| round_to(w.value_for(variable), 2));
            }
        } else {
            bucket.mean = mean(&values).map(|m| round_to(m, 2));
            if corrected_allowed {
                bucket.corrected_mean = mean(&good_values).map(|m| round_to(m, 2));
            }
        }

        fill_availability(&mut bucket, var_cfg.minute_availability);
        buckets.push(bucket);
    }

    apply_bucket_jumps(cfg, var_cfg, period_ms, &mut buckets);

    for bucket in &mut buckets {
        if bucket.anomalous {
            merge_labels(&mut bucket.labels, &[FaultKind::AnomalousIncrease]);
        }
        if bucket.unavailable {
            merge_labels(&mut bucket.labels, &[FaultKind::NoDataMinute]);
        }
        bucket.total = bucket.unavailable || bucket.anomalous;
        bucket.total_rewards = bucket.unavailable_rewards || bucket.anomalous;
    }

    buckets.retain(|bucket| bucket.end_ts_ms_utc > report_start_ms_utc);
    buckets
}

fn apply_bucket_jumps(
    cfg: &StationConfig,
    var_cfg: &VariableConfig,
    period_ms: i64,
    buckets: &mut [Bucket],
) {
    if var_cfg.variable.is_jump_exempt() {
        return;
    }
    let Some(threshold) = var_cfg.minute_jump_threshold else {
        return;
    };

    let ends: Vec<i64> = buckets.iter().map(|b| b.end_ts_ms_utc).collect();
    let means: Vec<Option<f64>> = buckets.iter().map(|b| b.mean).collect();
    let window_ms = i64::from(cfg.median_window_minutes) * MS_PER_MINUTE;
    let capacity = window_ms as f64 / period_ms as f64;
    let median = rolling_median(&ends, &means, window_ms, capacity, var_cfg.median_availability);
    let diff_abs = consecutive_diff_abs(&means);
    let median_diff_abs = distance_from_median(&means, &median);
    let marks = mark_jumps(&means, &diff_abs, &median_diff_abs, threshold);

    for (idx, bucket) in buckets.iter_mut().enumerate() {
        bucket.anomalous = marks.invalid[idx];
        bucket.jump = Some(BucketJump {
            rolling_median: median[idx],
            diff_abs: diff_abs[idx],
            median_diff_abs: median_diff_abs[idx],
            jump_couple: marks.jump_couple[idx],
        });
    }
}

/// Rolls minute buckets up into `hour_timeslot` buckets.
pub fn aggregate_hours(
    cfg: &StationConfig,
    var_cfg: &VariableConfig,
    minutes: &[Bucket],
) -> Vec<Bucket> {
    if cfg.minute_buckets_are_hourly {
        return minutes.to_vec();
    }

    let period_ms = i64::from(cfg.hour_timeslot_minutes) * MS_PER_MINUTE;
    let variable = var_cfg.variable;
    let ends: Vec<i64> = minutes.iter().map(|b| b.end_ts_ms_utc).collect();

    let mut hours = Vec::new();
    for (end, range) in group_by_bucket(&ends, period_ms) {
        let members = &minutes[range];
        let mut bucket = empty_bucket(end);
        for minute in members {
            bucket.slots += 1;
            if minute.mean.is_some() {
                bucket.present += 1;
            } else {
                bucket.missing += 1;
            }
            if minute.total {
                bucket.faulty += 1;
            }
            if minute.total_rewards {
                bucket.reward_faulty += 1;
            }
            merge_labels(&mut bucket.labels, &minute.labels);
        }

        let good: Vec<&Bucket> = members.iter().filter(|m| !m.total).collect();
        let corrected_allowed =
            fraction(bucket.slots - bucket.faulty, bucket.slots) > var_cfg.hour_availability;

        if variable.is_precipitation() {
            let sum: f64 = members.iter().filter_map(|m| m.mean).sum();
            bucket.mean = Some(round_to(sum, 2));
            if corrected_allowed {
                let good_sum: f64 = good.iter().filter_map(|m| m.corrected_mean).sum();
                bucket.corrected_mean = Some(round_to(good_sum, 2));
            }
        } else if variable.is_wind() && members.iter().any(|m| m.wind.is_some()) {
            let components: Vec<WindComponents> = members.iter().filter_map(|m| m.wind).collect();
            bucket.wind = WindComponents::mean(&components);
            bucket.mean = bucket.wind.map(|w| round_to(w.value_for(variable), 2));
            if corrected_allowed {
                let good_components: Vec<WindComponents> =
                    good.iter().filter_map(|m| m.corrected_wind).collect();
                bucket.corrected_wind = WindComponents::mean(&good_components);
                bucket.corrected_mean = bucket
                    .corrected_wind
                    .map(|w| round_to(w.value_for(variable), 2));
            }
        } else {
            let means: Vec<f64> = members.iter().filter_map(|m| m.mean).collect();
            bucket.mean = mean(&means).map(|m| round_to(m, 2));
            if corrected_allowed {
                let good_means: Vec<f64> = good.iter().filter_map(|m| m.corrected_mean).collect();
                bucket.corrected_mean = mean(&good_means).map(|m| round_to(m, 2));
            }
        }

        fill_availability(&mut bucket, var_cfg.hour_availability);
        bucket.total = bucket.unavailable;
        bucket.total_rewards = bucket.unavailable_rewards;
        hours.push(bucket);
    }

    hours
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::annotate;
    use crate::constant::ConstantFlags;
    use crate::gap_fill::fill_gaps;
    use crate::range_check::check_range;
    use crate::station::StationModel;

    #[test]
    fn opposite_winds_cancel_out() {
        let components = [
            WindComponents::from_speed_direction(5.0, 0.0),
            WindComponents::from_speed_direction(5.0, 180.0),
        ];
        let avg = WindComponents::mean(&components).unwrap();
        assert!(avg.speed() < 1e-9);
    }

    #[test]
    fn direction_round_trips_through_components() {
        for dir in [10.0, 90.0, 200.0, 350.0] {
            let c = WindComponents::from_speed_direction(3.0, dir);
            assert!((c.direction() - dir).abs() < 1e-9, "{dir}");
            assert!((c.speed() - 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn bucket_end_is_right_closed() {
        assert_eq!(bucket_end(60_000, 60_000), 60_000);
        assert_eq!(bucket_end(60_001, 60_000), 120_000);
        assert_eq!(bucket_end(16_000, 60_000), 60_000);
    }

    fn annotated_pressure(raw: &[Option<f64>]) -> (StationConfig, AnnotatedVariable) {
        let cfg = StationConfig::for_model(StationModel::Ws1000).unwrap();
        let var_cfg = cfg.variable(WeatherVariable::Pressure).unwrap().clone();
        let gap = fill_gaps(raw, 0);
        let range = check_range(&var_cfg, &gap);
        let constant = ConstantFlags::none(raw.len());
        let annotated = annotate(&cfg, WeatherVariable::Pressure, gap, range, constant, None);
        (cfg, annotated)
    }

    #[test]
    fn minute_buckets_count_slots_and_filter_faults() {
        let raw = vec![
            Some(1000.0),
            Some(1002.0),
            None,
            Some(1004.0),
            Some(1010.0),
            Some(5000.0),
            Some(1012.0),
            Some(1014.0),
        ];
        let (cfg, annotated) = annotated_pressure(&raw);
        let timestamps: Vec<i64> = (1..=8).map(|i| i * 15_000).collect();
        let var_cfg = cfg.variable(WeatherVariable::Pressure).unwrap();

        let buckets = aggregate_minutes(&cfg, var_cfg, &timestamps, &annotated, None, 0);

        assert_eq!(buckets.len(), 2);
        let first = &buckets[0];
        assert_eq!(first.end_ts_ms_utc, 60_000);
        assert_eq!((first.slots, first.present, first.missing), (4, 3, 1));
        assert_eq!(first.faulty, 1);
        assert_eq!(first.mean, Some(1002.0));
        assert_eq!(first.corrected_mean, Some(1002.0));
        assert_eq!(first.valid_percentage, 75.0);
        assert_eq!(first.labels, vec![FaultKind::NoDatum]);

        let second = &buckets[1];
        assert_eq!(second.labels, vec![FaultKind::OutOfBounds]);
        assert_eq!(second.mean, Some(2009.0));
        assert_eq!(second.corrected_mean, Some(1012.0));
        for bucket in &buckets {
            assert_eq!(bucket.present + bucket.missing, bucket.slots);
        }
    }

    #[test]
    fn mostly_faulty_bucket_is_unavailable() {
        let mut raw = vec![None; 4];
        raw[0] = Some(1000.0);
        let (cfg, annotated) = annotated_pressure(&raw);
        let timestamps: Vec<i64> = (1..=4).map(|i| i * 15_000).collect();
        let mut var_cfg = cfg.variable(WeatherVariable::Pressure).unwrap().clone();
        var_cfg.minute_availability = 0.5;

        let buckets = aggregate_minutes(&cfg, &var_cfg, &timestamps, &annotated, None, 0);

        assert!(buckets[0].unavailable);
        assert!(buckets[0].total);
        assert_eq!(buckets[0].corrected_mean, None);
        assert_eq!(
            buckets[0].labels,
            vec![FaultKind::NoDatum, FaultKind::NoDataMinute]
        );
    }

    #[test]
    fn hour_with_forty_faulty_minutes_is_unavailable() {
        let cfg = StationConfig::for_model(StationModel::Ws1000).unwrap();
        let var_cfg = cfg.variable(WeatherVariable::Temperature).unwrap();
        let minutes: Vec<Bucket> = (1..=60)
            .map(|m| {
                let mut b = empty_bucket(m * MS_PER_MINUTE);
                b.slots = 4;
                b.present = 4;
                b.mean = Some(10.0);
                b.corrected_mean = Some(10.0);
                b.total = m <= 40;
                b.total_rewards = m <= 40;
                b
            })
            .collect();

        let hours = aggregate_hours(&cfg, var_cfg, &minutes);

        assert_eq!(hours.len(), 1);
        assert_eq!(hours[0].slots, 60);
        assert_eq!(hours[0].faulty, 40);
        assert!(hours[0].unavailable);
        assert_eq!(hours[0].valid_percentage_rewards, 33.33);
        assert_eq!(hours[0].corrected_mean, None);
    }

    #[test]
    fn minute_buckets_stand_in_for_hours_when_configured() {
        let cfg = StationConfig::for_model(StationModel::Ws2000).unwrap();
        let var_cfg = cfg.variable(WeatherVariable::Pressure).unwrap();
        let minutes = vec![empty_bucket(3_600_000)];
        assert_eq!(aggregate_hours(&cfg, var_cfg, &minutes), minutes);
    }
}
