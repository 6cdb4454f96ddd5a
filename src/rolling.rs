//! Time-anchored sliding window with an on-demand median.

use std::collections::VecDeque;

/// Slots currently inside the window, in time order, plus a sorted copy of
/// the present values for median lookups.
#[derive(Debug, Clone, Default)]
pub struct RollingWindow {
    slots: VecDeque<(i64, Option<f64>)>,
    sorted: Vec<f64>,
}

impl RollingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ts_ms_utc: i64, value: Option<f64>) {
        if let Some(v) = value {
            let pos = self.sorted.partition_point(|x| x.total_cmp(&v).is_lt());
            self.sorted.insert(pos, v);
        }
        self.slots.push_back((ts_ms_utc, value));
    }

    /// Drops every slot stamped before `min_ts_ms_utc`.
    pub fn evict_before(&mut self, min_ts_ms_utc: i64) {
        while let Some((ts, value)) = self.slots.front().copied() {
            if ts >= min_ts_ms_utc {
                break;
            }
            self.slots.pop_front();
            if let Some(v) = value {
                let pos = self.sorted.partition_point(|x| x.total_cmp(&v).is_lt());
                if pos < self.sorted.len() {
                    self.sorted.remove(pos);
                }
            }
        }
    }

    pub fn present_count(&self) -> usize {
        self.sorted.len()
    }

    pub fn median(&self) -> Option<f64> {
        let n = self.sorted.len();
        if n == 0 {
            return None;
        }
        if n % 2 == 1 {
            Some(self.sorted[n / 2])
        } else {
            Some((self.sorted[n / 2 - 1] + self.sorted[n / 2]) / 2.0)
        }
    }
}

/// Median over `(ts - window_ms, ts]` at every row, kept only where
/// `present / capacity >= availability`.
pub fn rolling_median(
    timestamps: &[i64],
    values: &[Option<f64>],
    window_ms: i64,
    capacity: f64,
    availability: Option<f64>,
) -> Vec<Option<f64>> {
    let Some(availability) = availability else {
        return vec![None; values.len()];
    };
    let mut window = RollingWindow::new();
    let mut out = Vec::with_capacity(values.len());
    for (ts, value) in timestamps.iter().zip(values) {
        window.push(*ts, *value);
        window.evict_before(ts - window_ms + 1);
        let fraction = if capacity > 0.0 {
            window.present_count() as f64 / capacity
        } else {
            0.0
        };
        if fraction >= availability {
            out.push(window.median());
        } else {
            out.push(None);
        }
    }
    out
}
