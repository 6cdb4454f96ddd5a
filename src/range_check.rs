//! Manufacturer-limit checks, with a delta variant for accumulated rain.

use serde::{Deserialize, Serialize};

use crate::gap_fill::GapFilled;
use crate::station::VariableConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeChecked {
    pub out_of_bounds: Vec<bool>,
    /// First difference of the filled column; only set for precipitation.
    pub precipitation_delta: Option<Vec<Option<f64>>>,
}

pub fn check_range(var_cfg: &VariableConfig, gap: &GapFilled) -> RangeChecked {
    if var_cfg.variable.is_precipitation() {
        let deltas = precipitation_deltas(&gap.filled);
        let out_of_bounds = deltas
            .iter()
            .zip(&gap.fill_count)
            .map(|(delta, count)| match delta {
                Some(d) => {
                    *d < var_cfg.lower_limit
                        || *d > precipitation_delta_ceiling(var_cfg.upper_limit, *count)
                }
                None => false,
            })
            .collect();
        return RangeChecked {
            out_of_bounds,
            precipitation_delta: Some(deltas),
        };
    }

    let out_of_bounds = gap
        .raw
        .iter()
        .map(|value| match value {
            Some(v) => *v < var_cfg.lower_limit || *v > var_cfg.upper_limit,
            None => false,
        })
        .collect();
    RangeChecked {
        out_of_bounds,
        precipitation_delta: None,
    }
}

/// Largest plausible accumulation step after `fill_count` bridged rows.
pub fn precipitation_delta_ceiling(upper_limit: f64, fill_count: u32) -> f64 {
    upper_limit * f64::from(fill_count + 1)
}

pub fn precipitation_deltas(filled: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut deltas = Vec::with_capacity(filled.len());
    for idx in 0..filled.len() {
        if idx == 0 {
            deltas.push(None);
            continue;
        }
        deltas.push(match (filled[idx - 1], filled[idx]) {
            (Some(prev), Some(curr)) => Some(curr - prev),
            _ => None,
        });
    }
    deltas
}
