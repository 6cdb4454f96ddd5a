//! Bounded forward fill of short gaps in a raw column.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapFilled {
    pub raw: Vec<Option<f64>>,
    /// Raw values with the leading rows of each gap carried forward.
    pub filled: Vec<Option<f64>>,
    /// Consecutive rows that were filled or directly follow a filled row.
    pub fill_count: Vec<u32>,
}

impl GapFilled {
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn was_filled(&self, idx: usize) -> bool {
        self.raw[idx].is_none() && self.filled[idx].is_some()
    }
}

/// Carries the last valid value into at most `max_fill_rows` leading rows of
/// every missing run. Rows past that limit stay missing, as does a run with
/// no earlier valid value.
pub fn fill_gaps(raw: &[Option<f64>], max_fill_rows: usize) -> GapFilled {
    let mut filled = Vec::with_capacity(raw.len());
    let mut last_valid: Option<f64> = None;
    let mut missing_run = 0usize;

    for value in raw {
        match value {
            Some(v) => {
                last_valid = Some(*v);
                missing_run = 0;
                filled.push(Some(*v));
            }
            None => {
                missing_run += 1;
                if missing_run <= max_fill_rows {
                    filled.push(last_valid);
                } else {
                    filled.push(None);
                }
            }
        }
    }

    let mut fill_count = Vec::with_capacity(raw.len());
    let mut counter = 0u32;
    let mut prev_filled = false;
    for (raw_value, filled_value) in raw.iter().zip(&filled) {
        let is_filled = raw_value.is_none() && filled_value.is_some();
        if is_filled || prev_filled {
            counter += 1;
        } else {
            counter = 0;
        }
        fill_count.push(counter);
        prev_filled = is_filled;
    }

    GapFilled {
        raw: raw.to_vec(),
        filled,
        fill_count,
    }
}
