//! Rolling-median jump and spike detection.

use serde::{Deserialize, Serialize};

use crate::rolling::rolling_median;
use crate::series::MS_PER_MINUTE;
use crate::station::{StationConfig, VariableConfig};

/// Per-row jump columns. Absent for variables exempt from the check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JumpColumns {
    pub rolling_median: Vec<Option<f64>>,
    pub diff_abs: Vec<Option<f64>>,
    pub median_diff_abs: Vec<Option<f64>>,
    pub jump_couple: Vec<bool>,
    pub invalid_datum: Vec<bool>,
    pub unidentified_spike: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpMarks {
    pub jump_couple: Vec<bool>,
    pub invalid: Vec<bool>,
}

/// Runs the raw-cadence jump check on a gap-filled column. Returns `None`
/// for exempt variables or when no raw threshold is configured.
pub fn detect_jumps(
    cfg: &StationConfig,
    var_cfg: &VariableConfig,
    timestamps: &[i64],
    filled: &[Option<f64>],
) -> Option<JumpColumns> {
    if var_cfg.variable.is_jump_exempt() {
        return None;
    }
    let threshold = var_cfg.raw_jump_threshold?;

    let window_ms = i64::from(cfg.median_window_minutes) * MS_PER_MINUTE;
    let capacity = f64::from(cfg.median_window_minutes) * 60.0 / f64::from(cfg.timestep_seconds);
    let median = rolling_median(
        timestamps,
        filled,
        window_ms,
        capacity,
        var_cfg.median_availability,
    );

    let diff_abs = consecutive_diff_abs(filled);
    let median_diff_abs = distance_from_median(filled, &median);
    let marks = mark_jumps(filled, &diff_abs, &median_diff_abs, threshold);
    let unidentified_spike = marks
        .jump_couple
        .iter()
        .zip(&median)
        .map(|(couple, m)| *couple && m.is_none())
        .collect();

    Some(JumpColumns {
        rolling_median: median,
        diff_abs,
        median_diff_abs,
        jump_couple: marks.jump_couple,
        invalid_datum: marks.invalid,
        unidentified_spike,
    })
}

pub fn consecutive_diff_abs(values: &[Option<f64>]) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|idx| {
            if idx == 0 {
                return None;
            }
            match (values[idx - 1], values[idx]) {
                (Some(prev), Some(curr)) => Some((curr - prev).abs()),
                _ => None,
            }
        })
        .collect()
}

pub fn distance_from_median(values: &[Option<f64>], median: &[Option<f64>]) -> Vec<Option<f64>> {
    values
        .iter()
        .zip(median)
        .map(|(value, m)| match (value, m) {
            (Some(v), Some(m)) => Some((v - m).abs()),
            _ => None,
        })
        .collect()
}

/// Marks jump couples and picks the invalid member of each couple.
///
/// A couple is rows `i - 1, i` with `diff_abs[i] > threshold`. The member
/// further from its rolling median is invalid, the earlier one on a tie, and
/// neither when a distance is undefined. A row repeating the value of an
/// invalid predecessor is invalid as well.
pub fn mark_jumps(
    values: &[Option<f64>],
    diff_abs: &[Option<f64>],
    median_diff_abs: &[Option<f64>],
    threshold: f64,
) -> JumpMarks {
    let len = values.len();
    let mut jump_couple = vec![false; len];
    let mut invalid = vec![false; len];

    for idx in 1..len {
        if let Some(diff) = diff_abs[idx] {
            if diff > threshold {
                jump_couple[idx - 1] = true;
                jump_couple[idx] = true;
                if let (Some(prev), Some(curr)) = (median_diff_abs[idx - 1], median_diff_abs[idx]) {
                    if prev >= curr {
                        invalid[idx - 1] = true;
                    } else {
                        invalid[idx] = true;
                    }
                }
            }
        }
    }

    for idx in 1..len {
        let repeats = matches!((values[idx - 1], values[idx]), (Some(prev), Some(curr)) if prev == curr);
        if repeats && invalid[idx - 1] {
            invalid[idx] = true;
        }
    }

    JumpMarks {
        jump_couple,
        invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::{StationModel, WeatherVariable};

    fn values(raw: &[f64]) -> Vec<Option<f64>> {
        raw.iter().copied().map(Some).collect()
    }

    #[test]
    fn spike_far_from_median_is_invalid() {
        let v = values(&[10.0, 10.0, 10.1, 50.0, 10.1]);
        let median = vec![Some(10.0); 5];
        let diff = consecutive_diff_abs(&v);
        let dist = distance_from_median(&v, &median);

        let marks = mark_jumps(&v, &diff, &dist, 2.0);

        assert_eq!(marks.jump_couple, vec![false, false, true, true, true]);
        assert_eq!(marks.invalid, vec![false, false, false, true, false]);
    }

    #[test]
    fn repeats_of_invalid_value_chain() {
        let v = values(&[10.0, 50.0, 50.0, 50.0, 10.2]);
        let median = vec![Some(10.0); 5];
        let marks = mark_jumps(
            &v,
            &consecutive_diff_abs(&v),
            &distance_from_median(&v, &median),
            3.0,
        );
        assert_eq!(marks.invalid, vec![false, true, true, true, false]);
    }

    #[test]
    fn tie_marks_earlier_member_and_undefined_median_marks_nothing() {
        let v = values(&[8.0, 12.0]);
        let median = vec![Some(10.0); 2];
        let marks = mark_jumps(
            &v,
            &consecutive_diff_abs(&v),
            &distance_from_median(&v, &median),
            3.0,
        );
        assert_eq!(marks.invalid, vec![true, false]);

        let median = vec![None, Some(10.0)];
        let marks = mark_jumps(
            &v,
            &consecutive_diff_abs(&v),
            &distance_from_median(&v, &median),
            3.0,
        );
        assert_eq!(marks.jump_couple, vec![true, true]);
        assert_eq!(marks.invalid, vec![false, false]);
    }

    #[test]
    fn exempt_variables_have_no_jump_columns() {
        let cfg = StationConfig::for_model(StationModel::Ws1000).unwrap();
        let ts = [0, 16_000];
        let v = values(&[1.0, 300.0]);
        for variable in [
            WeatherVariable::WindDirection,
            WeatherVariable::PrecipitationAccumulated,
        ] {
            let var_cfg = cfg.variable(variable).unwrap();
            assert!(detect_jumps(&cfg, var_cfg, &ts, &v).is_none());
        }
    }

    #[test]
    fn missing_median_turns_couple_into_unidentified_spike() {
        let cfg = StationConfig::for_model(StationModel::Ws1000).unwrap();
        let var_cfg = cfg.variable(WeatherVariable::Temperature).unwrap();
        let ts: Vec<i64> = (0..3).map(|i| i * 16_000).collect();
        let v = values(&[10.0, 10.0, 25.0]);

        let cols = detect_jumps(&cfg, var_cfg, &ts, &v).unwrap();

        assert!(cols.rolling_median.iter().all(|m| m.is_none()));
        assert_eq!(cols.unidentified_spike, vec![false, true, true]);
        assert_eq!(cols.invalid_datum, vec![false, false, false]);
    }
}
