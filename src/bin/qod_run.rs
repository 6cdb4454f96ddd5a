use std::env;
use std::path::PathBuf;

use chrono::NaiveDate;
use qod::{
    detect_station_model, init_logging, load_observations_csv, log_app_start, log_run_inputs,
    logging_config_from_env, run_qod_day, write_daily_output, DeviceDayRequest, QodStore,
    StationConfig, StationParameterTable,
};

const DEFAULT_DEVICE_ID: &str = "default";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log_cfg = logging_config_from_env();
    init_logging(&log_cfg)?;
    log_app_start(&log_cfg);

    let input = required_path("QOD_INPUT_CSV")?;
    let day_raw = env::var("QOD_DAY").map_err(|_| "QOD_DAY is required (YYYY-MM-DD)")?;
    let day = NaiveDate::parse_from_str(day_raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("invalid QOD_DAY {day_raw:?}: {err}"))?;
    let device_id = optional_var("QOD_DEVICE_ID");
    let output = optional_var("QOD_OUTPUT_PATH").map(PathBuf::from);
    let store_path = optional_var("QOD_STORE_PATH").map(PathBuf::from);
    let station_config = optional_var("QOD_STATION_CONFIG").map(PathBuf::from);

    log_run_inputs(
        &input,
        day,
        device_id.as_deref(),
        output.as_deref(),
        store_path.as_deref(),
    );

    let (observations, load_report) = load_observations_csv(&input, device_id.as_deref())?;
    let model = detect_station_model(&observations)?;
    let cfg = match &station_config {
        Some(path) => StationParameterTable::from_json_path(path)?.into_config()?,
        None => StationConfig::for_model(model)?,
    };

    let req = DeviceDayRequest {
        day,
        model,
        device_id: device_id.clone(),
    };
    let run = run_qod_day(&observations, &req, &cfg)?;

    if let Some(path) = &output {
        write_daily_output(path, &run.result)?;
    }

    let mut stored_rows = 0;
    if let Some(path) = &store_path {
        let mut store = QodStore::open(path)?;
        stored_rows = store.upsert_day(device_id.as_deref().unwrap_or(DEFAULT_DEVICE_ID), &run.result)?;
    }

    let faulty_rows: u64 = run.report.variables.iter().map(|v| v.faulty_rows).sum();
    println!(
        "qod day={} model={} device={} rows_read={} rows_kept={} qod_score={} hours={} faulty_rows={} stored_rows={} fingerprint={}",
        day,
        cfg.model.as_str(),
        device_id.as_deref().unwrap_or(DEFAULT_DEVICE_ID),
        load_report.rows_read,
        load_report.rows_kept,
        run.result
            .qod_score
            .map(|score| format!("{score:.4}"))
            .unwrap_or_else(|| "n/a".to_string()),
        run.result.rows.len(),
        faulty_rows,
        stored_rows,
        run.result.config_fingerprint
    );

    Ok(())
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required_path(key: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    optional_var(key)
        .map(PathBuf::from)
        .ok_or_else(|| format!("{key} is required").into())
}
