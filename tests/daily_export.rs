use std::fs;
use std::io::Write;

use chrono::NaiveDate;
use qod::{
    load_observations_csv, output_columns, run_qod_day, write_daily_output, DeviceDayRequest,
    ExportError, OutputFormat, StationConfig, StationModel,
};
use regex::Regex;
use serde_json::Value;
use tempfile::tempdir;

fn test_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 10).expect("valid test day")
}

/// Writes a WS2000 device-day CSV for two devices, `station-a` clean and
/// `station-b` with a stuck pressure sensor.
fn write_input_csv(path: &std::path::Path) {
    let mut file = fs::File::create(path).expect("create input csv");
    writeln!(
        file,
        "utc_datetime,temperature,humidity,wind_speed,wind_direction,pressure,illuminance,precipitation_accumulated,model,device_id"
    )
    .expect("write header");

    let start = chrono::NaiveDate::from_ymd_opt(2024, 3, 9)
        .and_then(|d| d.and_hms_opt(18, 0, 0))
        .expect("valid window start");
    for k in 1..=600i64 {
        let ts = start + chrono::Duration::seconds(k * 180);
        let t = k as f64;
        for device in ["station-a", "station-b"] {
            let pressure = if device == "station-b" {
                1001.5
            } else {
                1001.5 + 0.2 * (t / 17.0).sin()
            };
            writeln!(
                file,
                "{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.2},0.0,WS2000,{}",
                ts.format("%Y-%m-%d %H:%M:%S"),
                16.0 + 0.5 * (t / 11.0).sin(),
                60.0 + (t / 9.0).sin(),
                3.0 + (t / 7.0).sin(),
                150.0 + 40.0 * (t / 13.0).sin(),
                pressure,
                700.0 + 90.0 * (t / 5.0).sin(),
                device
            )
            .expect("write row");
        }
    }
}

fn run_device(input: &std::path::Path, device: &str) -> qod::QodDayResult {
    let (observations, report) =
        load_observations_csv(input, Some(device)).expect("input loads");
    assert_eq!(report.rows_read, 1_200);
    assert_eq!(report.rows_kept, 600);

    let cfg = StationConfig::for_model(StationModel::Ws2000).expect("builtin config");
    let req = DeviceDayRequest {
        day: test_day(),
        model: StationModel::Ws2000,
        device_id: Some(device.to_string()),
    };
    run_qod_day(&observations, &req, &cfg)
        .expect("run should succeed")
        .result
}

#[test]
fn clean_device_exports_full_score_csv() {
    let dir = tempdir().expect("temp dir");
    let input = dir.path().join("input.csv");
    write_input_csv(&input);
    let result = run_device(&input, "station-a");

    let output = dir.path().join("out").join("station-a.csv");
    let format = write_daily_output(&output, &result).expect("csv export");
    assert_eq!(format, OutputFormat::Csv);

    let text = fs::read_to_string(&output).expect("read export");
    let mut lines = text.lines();
    let header = lines.next().expect("header line");
    assert_eq!(header, output_columns().join(","));

    let row_re = Regex::new(r",WS2000,1\.0,100\.0,1\.0\.6,2024,3,10,(\d{1,2})$").expect("regex");
    let hours: Vec<u32> = lines
        .map(|line| {
            let caps = row_re
                .captures(line)
                .unwrap_or_else(|| panic!("unexpected row: {line}"));
            caps[1].parse().expect("hour")
        })
        .collect();
    assert_eq!(hours, (0..24).collect::<Vec<_>>());
    assert!(text.contains("100.0,[]"));
}

#[test]
fn stuck_pressure_shows_in_json_lines_breakdown() {
    let dir = tempdir().expect("temp dir");
    let input = dir.path().join("input.csv");
    write_input_csv(&input);
    let result = run_device(&input, "station-b");

    let output = dir.path().join("station-b.jsonl");
    write_daily_output(&output, &result).expect("jsonl export");

    let text = fs::read_to_string(&output).expect("read export");
    let rows: Vec<Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid json line"))
        .collect();
    assert_eq!(rows.len(), 24);

    let first = &rows[0];
    assert_eq!(first.as_object().map(|o| o.len()), Some(30));
    assert_eq!(first["pressure_score"], Value::from(0.0));
    assert_eq!(first["pressure_annotation"][0][0], Value::from("SHORT_CONST"));
    assert_eq!(first["pressure_annotation"][0][1], Value::from(100.0));
    assert_eq!(first["daily_annotation"]["SHORT_CONST"][0][0], Value::from("pressure"));
    assert_eq!(first["temperature_score"], Value::from(100.0));
    assert_eq!(first["model"], Value::from("WS2000"));
    for (hour, row) in rows.iter().enumerate() {
        assert_eq!(row["hour"], Value::from(hour as u64));
    }
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = tempdir().expect("temp dir");
    let input = dir.path().join("input.csv");
    write_input_csv(&input);
    let result = run_device(&input, "station-a");

    let err = write_daily_output(&dir.path().join("day.xlsx"), &result)
        .expect_err("xlsx is not an export format");
    assert!(matches!(err, ExportError::UnsupportedExtension(_)));
}
