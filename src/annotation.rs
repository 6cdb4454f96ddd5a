//! Per-row annotation codes for one variable and the stage record that
//! carries every raw-level check result forward.

use serde::{Deserialize, Serialize};

use crate::constant::ConstantFlags;
use crate::gap_fill::GapFilled;
use crate::jump::JumpColumns;
use crate::range_check::RangeChecked;
use crate::station::{FaultKind, StationConfig, WeatherVariable, RAW_FAULTS};

/// Parallel `0 / code` columns, one per raw fault category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAnnotations {
    pub out_of_bounds: Vec<u8>,
    pub invalid_datum: Vec<u8>,
    pub unidentified_spike: Vec<u8>,
    pub no_datum: Vec<u8>,
    pub constant: Vec<u8>,
    pub constant_long: Vec<u8>,
    pub constant_frozen: Vec<u8>,
    /// Any code set.
    pub total: Vec<bool>,
    /// Any code set that counts toward rewards.
    pub reward: Vec<bool>,
}

impl RawAnnotations {
    pub fn len(&self) -> usize {
        self.total.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total.is_empty()
    }

    pub fn column(&self, kind: FaultKind) -> Option<&[u8]> {
        match kind {
            FaultKind::OutOfBounds => Some(&self.out_of_bounds),
            FaultKind::InvalidDatum => Some(&self.invalid_datum),
            FaultKind::UnidentifiedSpike => Some(&self.unidentified_spike),
            FaultKind::NoDatum => Some(&self.no_datum),
            FaultKind::ShortConstant => Some(&self.constant),
            FaultKind::LongConstant => Some(&self.constant_long),
            FaultKind::FrozenSensor => Some(&self.constant_frozen),
            FaultKind::AnomalousIncrease | FaultKind::NoDataMinute => None,
        }
    }

    pub fn has(&self, kind: FaultKind, idx: usize) -> bool {
        self.column(kind).is_some_and(|column| column[idx] != 0)
    }

    /// Categories set at `idx`, in label order.
    pub fn labels_at(&self, idx: usize) -> Vec<FaultKind> {
        RAW_FAULTS
            .iter()
            .copied()
            .filter(|kind| self.has(*kind, idx))
            .collect()
    }
}

/// Everything the raw-level checks produced for one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedVariable {
    pub variable: WeatherVariable,
    pub gap: GapFilled,
    pub range: RangeChecked,
    pub constant: ConstantFlags,
    pub jump: Option<JumpColumns>,
    pub annotations: RawAnnotations,
}

pub fn annotate(
    cfg: &StationConfig,
    variable: WeatherVariable,
    gap: GapFilled,
    range: RangeChecked,
    constant: ConstantFlags,
    jump: Option<JumpColumns>,
) -> AnnotatedVariable {
    let codes = cfg.codes;
    let len = gap.len();
    let code_column = |flags: &[bool], code: u8| -> Vec<u8> {
        flags.iter().map(|f| if *f { code } else { 0 }).collect()
    };

    let no_datum_flags: Vec<bool> = gap.raw.iter().map(|v| v.is_none()).collect();
    let (invalid_datum, unidentified_spike) = match &jump {
        Some(cols) => (
            code_column(&cols.invalid_datum, codes.invalid_datum),
            code_column(&cols.unidentified_spike, codes.unidentified_spike),
        ),
        None => (vec![0; len], vec![0; len]),
    };

    let mut annotations = RawAnnotations {
        out_of_bounds: code_column(&range.out_of_bounds, codes.out_of_bounds),
        invalid_datum,
        unidentified_spike,
        no_datum: code_column(&no_datum_flags, codes.no_datum),
        constant: code_column(&constant.short_constant, codes.constant),
        constant_long: code_column(&constant.long_constant, codes.constant_long),
        constant_frozen: code_column(&constant.frozen, codes.constant_frozen),
        total: vec![false; len],
        reward: vec![false; len],
    };

    for idx in 0..len {
        let mut total = false;
        let mut reward = false;
        for kind in RAW_FAULTS {
            if annotations.has(kind, idx) {
                total = true;
                if cfg.counts_for_reward(kind) {
                    reward = true;
                }
            }
        }
        annotations.total[idx] = total;
        annotations.reward[idx] = reward;
    }

    AnnotatedVariable {
        variable,
        gap,
        range,
        constant,
        jump,
        annotations,
    }
}

/// Appends labels not already present, keeping first-seen order.
pub fn merge_labels(into: &mut Vec<FaultKind>, labels: &[FaultKind]) {
    for label in labels {
        if !into.contains(label) {
            into.push(*label);
        }
    }
}
