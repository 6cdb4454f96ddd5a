//! Weather-station quality-of-data (QoD) engine.
//!
//! Per device-day and variable: gap filling, out-of-bounds checks,
//! constant and frozen-sensor detection, rolling-median spike detection,
//! minute/hour aggregation, then one daily score with a fault breakdown.

mod aggregate;
mod annotation;
mod constant;
mod gap_fill;
mod input;
mod jump;
mod observability;
mod output;
mod pipeline;
mod range_check;
mod rolling;
mod scoring;
mod series;
mod station;
mod store;

pub use aggregate::{
    aggregate_hours, aggregate_minutes, bucket_end, round_to, Bucket, BucketJump, WindComponents,
    WindRaw,
};
pub use annotation::{annotate, merge_labels, AnnotatedVariable, RawAnnotations};
pub use constant::{
    detect_constant, suppress_speed_without_direction, ConstantFlags, ConstantInputs,
};
pub use gap_fill::{fill_gaps, GapFilled};
pub use input::{
    load_observations_csv, parse_timestamp_ms, read_observations, CsvLoadReport, InputError,
};
pub use jump::{
    consecutive_diff_abs, detect_jumps, distance_from_median, mark_jumps, JumpColumns, JumpMarks,
};
pub use observability::{
    device_day_span, init_logging, log_app_start, log_run_inputs, logging_config_from,
    logging_config_from_env, LogFormat, LoggingConfig, LoggingInitError,
};
pub use output::{
    output_columns, output_format_for_path, output_row_values, write_daily_csv,
    write_daily_json_lines, write_daily_output, ExportError, OutputFormat,
};
pub use pipeline::{
    process_series, run_qod_day, DeviceDayRequest, QodError, QodRun, QodRunReport, VariableRun,
    VariableRunSummary,
};
pub use range_check::{check_range, precipitation_delta_ceiling, precipitation_deltas, RangeChecked};
pub use rolling::{rolling_median, RollingWindow};
pub use scoring::{
    minute_hour_breakdown, raw_hour_breakdown, score_day, LabelShare, QodDayResult, QodHourRow,
    VariableDaily, VariableHourScore, VariableScoringInput, HOURS_PER_DAY,
};
pub use series::{
    day_start_ms, detect_station_model, normalize_observations, NormalizationReport,
    NormalizeError, NormalizedSeries, Observation, MS_PER_DAY, MS_PER_HOUR, MS_PER_MINUTE,
};
pub use station::{
    config_fingerprint, parse_station_model, parse_variable, AnnotationCodes, ConfigError,
    FaultKind, StationConfig, StationModel, StationParameterTable, VariableConfig,
    WeatherVariable, ALL_VARIABLES, OUTPUT_VARIABLES, QOD_VERSION, RAW_FAULTS, VARIABLE_COUNT,
};
pub use store::{QodStore, StoreError};
