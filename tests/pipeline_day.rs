use chrono::NaiveDate;
use qod::{
    day_start_ms, process_series, run_qod_day, ConfigError, DeviceDayRequest, FaultKind,
    NormalizedSeries, Observation, QodError, QodRun, StationConfig, StationModel,
    StationParameterTable, WeatherVariable, ALL_VARIABLES, MS_PER_HOUR, MS_PER_MINUTE,
    VARIABLE_COUNT,
};

fn test_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 10).expect("valid test day")
}

fn window_start_ms(day: NaiveDate) -> i64 {
    day_start_ms(day).expect("valid day start") - 6 * MS_PER_HOUR
}

/// Smooth, never-repeating readings; the rain gauge ticks every two hours.
fn reading(ms_since_start: i64) -> [Option<f64>; VARIABLE_COUNT] {
    let t = ms_since_start as f64 / MS_PER_MINUTE as f64;
    let mut values = [None; VARIABLE_COUNT];
    values[WeatherVariable::Humidity.index()] = Some(70.0 + 2.0 * (t / 37.0).sin());
    values[WeatherVariable::Temperature.index()] = Some(15.0 + 0.8 * (t / 53.0).sin());
    values[WeatherVariable::WindDirection.index()] = Some(180.0 + 90.0 * (t / 41.0).sin());
    values[WeatherVariable::WindSpeed.index()] = Some(3.0 + (t / 29.0).sin());
    values[WeatherVariable::Pressure.index()] = Some(1010.0 + 0.1 * (t / 61.0).sin());
    values[WeatherVariable::Illuminance.index()] = Some(1000.0 + 500.0 * (t / 47.0).sin());
    values[WeatherVariable::PrecipitationAccumulated.index()] =
        Some(0.254 * (ms_since_start / (120 * MS_PER_MINUTE)) as f64);
    values
}

fn synthetic_day(model: StationModel, keep: impl Fn(i64) -> bool) -> Vec<Observation> {
    let cfg = StationConfig::for_model(model).expect("builtin config");
    let step = cfg.timestep_ms();
    let start = window_start_ms(test_day());
    let slots = 30 * MS_PER_HOUR / step;
    (1..=slots)
        .map(|k| start + k * step)
        .filter(|ts| keep(*ts))
        .map(|ts| Observation {
            ts_ms_utc: ts,
            model,
            values: reading(ts - start),
        })
        .collect()
}

fn run(model: StationModel, observations: &[Observation]) -> QodRun {
    let cfg = StationConfig::for_model(model).expect("builtin config");
    let req = DeviceDayRequest {
        day: test_day(),
        model,
        device_id: Some("station-a".to_string()),
    };
    run_qod_day(observations, &req, &cfg).expect("run should succeed")
}

fn hour_end(hour: i64) -> i64 {
    day_start_ms(test_day()).expect("valid day start") + (hour + 1) * MS_PER_HOUR
}

#[test]
fn clean_ws2000_day_scores_full_marks() {
    let run = run(StationModel::Ws2000, &synthetic_day(StationModel::Ws2000, |_| true));
    let result = &run.result;

    assert_eq!(result.rows.len(), 24);
    for (hour, row) in result.rows.iter().enumerate() {
        assert_eq!(row.hour as usize, hour);
        assert_eq!((row.year, row.month, row.day), (2024, 3, 10));
        assert_eq!(row.hourly_score, Some(100.0));
        assert!(row.variables.iter().all(|v| v.annotation.is_empty()));
    }
    assert_eq!(result.qod_score, Some(1.0));
    assert!(result.daily_annotation.is_empty());
    assert_eq!(result.model, StationModel::Ws2000);
    assert_eq!(result.qod_version, "1.0.6");

    let report = &run.report;
    let normalization = report.normalization.as_ref().expect("normalization report");
    assert_eq!(normalization.placed_rows, 600);
    assert_eq!(normalization.empty_slots, 0);
    assert_eq!(report.blanked_rows, 0);
    assert!(report.variables.iter().all(|v| v.hour_buckets == 24));
}

#[test]
fn clean_ws1000_day_scores_full_marks() {
    let run = run(StationModel::Ws1000, &synthetic_day(StationModel::Ws1000, |_| true));

    assert_eq!(run.result.rows.len(), 24);
    assert_eq!(run.result.qod_score, Some(1.0));

    let temperature = run.variable(WeatherVariable::Temperature).expect("temperature run");
    assert_eq!(temperature.minute_buckets.len(), 1440);
    assert_eq!(temperature.hour_buckets.len(), 24);
    let wind = run.variable(WeatherVariable::WindSpeed).expect("wind speed run");
    assert_eq!(wind.minute_buckets.len(), 720);
    assert!(wind
        .minute_buckets
        .iter()
        .all(|b| b.wind.is_some() && b.mean.is_some() && !b.total));
}

#[test]
fn missing_hour_is_no_data_for_every_variable() {
    let gap_start = hour_end(4);
    let gap_end = hour_end(5);
    let observations = synthetic_day(StationModel::Ws2000, |ts| ts <= gap_start || ts > gap_end);
    let run = run(StationModel::Ws2000, &observations);
    let result = &run.result;

    let row = &result.rows[5];
    assert_eq!(row.hourly_score, Some(0.0));
    for score in &row.variables {
        assert_eq!(score.score, Some(0.0));
        assert_eq!(score.annotation, vec![("NO_DATA".to_string(), 100.0)]);
    }
    for (hour, row) in result.rows.iter().enumerate() {
        if hour != 5 {
            assert_eq!(row.hourly_score, Some(100.0), "hour {hour}");
        }
    }

    let expected_daily = 100.0 / 24.0;
    let qod = result.qod_score.expect("defined qod score");
    assert!((qod - 23.0 / 24.0).abs() < 1e-9);
    let shares = result
        .daily_annotation
        .get("NO_DATA")
        .expect("NO_DATA breakdown");
    assert_eq!(shares.len(), 7);
    assert_eq!(shares[0].0, "temperature");
    assert!(shares.iter().all(|(_, pct)| (pct - expected_daily).abs() < 1e-9));

    for variable_run in &run.variables {
        let ann = &variable_run.annotated.annotations;
        for (idx, raw) in variable_run.annotated.gap.raw.iter().enumerate() {
            assert_eq!(raw.is_none(), ann.no_datum[idx] != 0);
        }
        for bucket in variable_run
            .minute_buckets
            .iter()
            .chain(&variable_run.hour_buckets)
        {
            assert_eq!(bucket.present + bucket.missing, bucket.slots);
        }
    }
}

#[test]
fn single_temperature_spike_is_invalid_datum() {
    let spike_ts = day_start_ms(test_day()).expect("valid day start") + 10 * MS_PER_HOUR
        + 30 * MS_PER_MINUTE;
    let mut observations = synthetic_day(StationModel::Ws2000, |_| true);
    let temperature = WeatherVariable::Temperature.index();
    for obs in observations.iter_mut().filter(|obs| obs.ts_ms_utc == spike_ts) {
        obs.values[temperature] = obs.values[temperature].map(|v| v + 20.0);
    }

    let run = run(StationModel::Ws2000, &observations);
    let temp_run = run.variable(WeatherVariable::Temperature).expect("temperature run");
    let ann = &temp_run.annotated.annotations;
    let flagged: Vec<usize> = (0..ann.len()).filter(|idx| ann.invalid_datum[*idx] != 0).collect();
    assert_eq!(flagged.len(), 1);
    let series_ts = run.series.timestamps();
    assert_eq!(series_ts[flagged[0]], spike_ts);
    assert_eq!(ann.labels_at(flagged[0]), vec![FaultKind::InvalidDatum]);

    let row = &run.result.rows[10];
    let temp_score = row
        .variables
        .iter()
        .find(|v| v.variable == WeatherVariable::Temperature)
        .expect("temperature score");
    assert_eq!(temp_score.score, Some(95.0));
    assert_eq!(temp_score.annotation, vec![("SPIKES_INST".to_string(), 5.0)]);

    let daily = run
        .result
        .daily_variable(WeatherVariable::Temperature)
        .expect("daily temperature");
    let expected = (23.0 * 100.0 + 95.0) / 24.0;
    assert!((daily.score.expect("defined") - expected).abs() < 1e-9);
}

#[test]
fn rain_gauge_ticks_are_summed_per_hour() {
    let run = run(StationModel::Ws2000, &synthetic_day(StationModel::Ws2000, |_| true));
    let precip = run
        .variable(WeatherVariable::PrecipitationAccumulated)
        .expect("precipitation run");

    let bucket = |end: i64| {
        precip
            .hour_buckets
            .iter()
            .find(|b| b.end_ts_ms_utc == end)
            .expect("hour bucket")
    };
    assert_eq!(bucket(hour_end(1)).mean, Some(0.25));
    assert_eq!(bucket(hour_end(0)).mean, Some(0.0));
    assert!(precip.annotated.annotations.out_of_bounds.iter().all(|c| *c == 0));
}

#[test]
fn wind_constant_family_is_mutually_exclusive() {
    // Speed pinned at zero through a freezing, humid stretch of the day.
    let mut observations = synthetic_day(StationModel::Ws1000, |_| true);
    let frozen_from = day_start_ms(test_day()).expect("valid day start");
    for obs in observations.iter_mut().filter(|obs| obs.ts_ms_utc > frozen_from) {
        obs.values[WeatherVariable::WindSpeed.index()] = Some(0.0);
        obs.values[WeatherVariable::Temperature.index()] = obs
            .values[WeatherVariable::Temperature.index()]
            .map(|v| v - 25.0);
        obs.values[WeatherVariable::Humidity.index()] = obs
            .values[WeatherVariable::Humidity.index()]
            .map(|v| v + 20.0);
    }

    let run = run(StationModel::Ws1000, &observations);
    for variable in [WeatherVariable::WindSpeed, WeatherVariable::WindDirection] {
        let ann = &run.variable(variable).expect("wind run").annotated.annotations;
        for idx in 0..ann.len() {
            let set = [ann.constant[idx], ann.constant_long[idx], ann.constant_frozen[idx]]
                .iter()
                .filter(|c| **c != 0)
                .count();
            assert!(set <= 1, "{variable:?} row {idx} has {set} constant codes");
        }
    }
    let speed = &run
        .variable(WeatherVariable::WindSpeed)
        .expect("wind speed run")
        .annotated
        .annotations;
    assert!(speed.constant.iter().any(|c| *c != 0));
}

#[test]
fn rerunning_a_day_is_deterministic() {
    let observations = synthetic_day(StationModel::Ws2000, |ts| ts % (7 * 180_000) != 0);
    let first = run(StationModel::Ws2000, &observations);
    let second = run(StationModel::Ws2000, &observations);

    assert_eq!(first.result, second.result);
    for variable in ALL_VARIABLES {
        assert_eq!(
            first.variable(variable).map(|r| &r.annotated.annotations),
            second.variable(variable).map(|r| &r.annotated.annotations)
        );
    }
    let score = first.result.qod_score.expect("defined score");
    assert!((0.0..=1.0).contains(&score));
}

#[test]
fn reprocessing_the_normalized_series_is_idempotent() {
    let observations = synthetic_day(StationModel::Ws2000, |ts| ts % (11 * 180_000) != 0);
    let first = run(StationModel::Ws2000, &observations);

    let columns: [Vec<Option<f64>>; VARIABLE_COUNT] =
        std::array::from_fn(|idx| first.series.column(ALL_VARIABLES[idx]).to_vec());
    let rebuilt = NormalizedSeries::from_columns(
        first.series.first_ts_ms_utc(),
        first.series.step_ms(),
        columns,
    )
    .expect("rebuilt series");
    assert_eq!(rebuilt, first.series);

    let cfg = StationConfig::for_model(StationModel::Ws2000).expect("builtin config");
    let second = process_series(&rebuilt, test_day(), &cfg).expect("reprocess should succeed");

    for variable in ALL_VARIABLES {
        let before = first.variable(variable).expect("first run");
        let after = second.variable(variable).expect("second run");
        assert_eq!(
            before.annotated.annotations, after.annotated.annotations,
            "{variable:?}"
        );
        assert_eq!(before.minute_buckets, after.minute_buckets, "{variable:?}");
    }
    assert_eq!(first.result, second.result);
}

#[test]
fn partially_missing_rows_are_blanked() {
    let target = hour_end(2);
    let mut observations = synthetic_day(StationModel::Ws2000, |_| true);
    for obs in observations.iter_mut().filter(|obs| obs.ts_ms_utc == target) {
        obs.values[WeatherVariable::Pressure.index()] = None;
    }

    let run = run(StationModel::Ws2000, &observations);
    assert_eq!(run.report.blanked_rows, 1);
    let idx = run
        .series
        .timestamps()
        .iter()
        .position(|ts| *ts == target)
        .expect("target slot");
    for variable in ALL_VARIABLES {
        let ann = &run.variable(variable).expect("variable run").annotated.annotations;
        assert_ne!(ann.no_datum[idx], 0, "{variable:?}");
    }
}

#[test]
fn mismatched_configuration_is_rejected() {
    let mut table = StationParameterTable::for_model(StationModel::Ws1000);
    table.lower_limits.pop();
    assert!(matches!(
        table.into_config(),
        Err(ConfigError::MismatchedLength {
            parameter: "lower_limits",
            ..
        })
    ));

    let observations = synthetic_day(StationModel::Ws2000, |_| true);
    let cfg = StationConfig::for_model(StationModel::Ws1000).expect("builtin config");
    let req = DeviceDayRequest {
        day: test_day(),
        model: StationModel::Ws2000,
        device_id: None,
    };
    let err = run_qod_day(&observations, &req, &cfg).expect_err("model mismatch should fail");
    assert!(matches!(err, QodError::ModelMismatch { .. }));
}
