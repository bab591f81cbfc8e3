mod common;

use std::fs;

use approx::assert_relative_eq;
use common::{Noise, Transit};
use serde_json::Value;
use transitscan_core::types::PipelineParams;
use transitscan_core::{analyze_file, Pipeline, PipelineResult};

fn write_file(name: &str, text: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    (dir, path)
}

fn expect_success(result: &PipelineResult) -> &transitscan_core::PipelineReport {
    match result.report() {
        Some(report) => report,
        None => panic!("expected success, got {result:?}"),
    }
}

#[test]
fn flat_noisy_csv_reports_no_planets() {
    let time = common::times(20.4);
    let mut noise = Noise::new(42, 0.001);
    let flux = common::flux(&time, &[], &mut noise);
    let (_dir, path) = write_file("flat.csv", &common::to_text(&["time", "flux"], &[time, flux], ','));

    let result = analyze_file(&path);
    let report = expect_success(&result);
    assert!(!report.detected);
    assert_eq!(report.num_planets, 0);
    assert_eq!(report.data_points, 1000);
    assert_relative_eq!(report.mean_flux, 1.0, epsilon = 1e-3);
    assert!(report.std_flux > 0.0 && report.std_flux < 0.002);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["detected"], Value::Bool(false));
    assert_eq!(json["planets"], Value::Array(vec![]));
    assert!(json.get("orbital_period").is_none());
}

#[test]
fn constant_flux_file_is_a_clean_non_detection() {
    let time = common::times(10.0);
    let flux = vec![1234.5; time.len()];
    let (_dir, path) = write_file("const.tsv", &common::to_text(&["time", "flux"], &[time, flux], '\t'));

    let result = analyze_file(&path);
    let report = expect_success(&result);
    assert!(!report.detected);
    assert_relative_eq!(report.mean_flux, 1.0);
    assert_eq!(report.std_flux, 0.0);
}

#[test]
fn pdcsap_flux_is_preferred_over_sap_flux() {
    let planet = Transit {
        period: 3.5,
        epoch: 0.8,
        duration: 0.15,
        depth: 0.004,
    };
    let time = common::times(45.0);
    let mut noise = Noise::new(9, 0.0003);
    let pdcsap = common::flux(&time, &[planet], &mut noise);
    let pdcsap_err = vec![0.0003; time.len()];
    let sap: Vec<f64> = common::flux(&time, &[], &mut noise)
        .into_iter()
        .map(|f| f * 45000.0)
        .collect();
    let text = common::to_text(
        &["TIME", "SAP_FLUX", "PDCSAP_FLUX", "PDCSAP_FLUX_ERR"],
        &[time, sap, pdcsap, pdcsap_err],
        ',',
    );

    let result = Pipeline::default().run_str(&text);
    let report = expect_success(&result);
    assert!(report.detected);
    assert_relative_eq!(report.signals[0].orbital_period, planet.period, max_relative = 0.01);

    // The first planet is repeated at the top level.
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["num_planets"], report.num_planets);
    assert_eq!(json["orbital_period"], json["planets"][0]["orbital_period"]);
    assert_eq!(json["snr"], json["planets"][0]["snr"]);
}

#[test]
fn cadence_only_file_gets_a_synthetic_time_axis() {
    let planet = Transit {
        period: 2.9,
        epoch: 0.5,
        duration: 0.12,
        depth: 0.004,
    };
    let time = common::times(40.0);
    let mut noise = Noise::new(21, 0.0003);
    let flux = common::flux(&time, &[planet], &mut noise);
    let cadence: Vec<f64> = (0..time.len()).map(|i| 120_000.0 + i as f64).collect();
    let text = common::to_text(&["cadenceno", "sap_flux"], &[cadence, flux], ';');

    let result = Pipeline::default().run_str(&text);
    let report = expect_success(&result);
    assert_eq!(report.data_points, time.len());
    assert!(report.detected);
    assert_relative_eq!(report.signals[0].orbital_period, planet.period, max_relative = 0.01);
}

#[test]
fn unnamed_columns_fall_back_to_variability() {
    let time = common::times(20.0);
    let mut noise = Noise::new(2, 0.001);
    let flux = common::flux(&time, &[], &mut noise);
    let counter: Vec<f64> = (0..time.len()).map(|i| i as f64).collect();
    let text = common::to_text(&["index", "col_b"], &[counter, flux], '|');

    let result = Pipeline::default().run_str(&text);
    let report = expect_success(&result);
    assert_eq!(report.data_points, time.len());
}

#[test]
fn partial_config_overrides_only_named_fields() {
    let params: PipelineParams = serde_json::from_str(r#"{"extractor": {"max_signals": 0}}"#).unwrap();
    assert_eq!(params.extractor.max_signals, 0);
    assert_eq!(params.search.short_grid_points, 5000);

    let planet = Transit {
        period: 3.0,
        epoch: 0.4,
        duration: 0.15,
        depth: 0.01,
    };
    let time = common::times(30.0);
    let mut noise = Noise::new(4, 0.0005);
    let flux = common::flux(&time, &[planet], &mut noise);
    let text = common::to_text(&["time", "flux"], &[time, flux], ',');

    let result = Pipeline::new(params).run_str(&text);
    assert!(!expect_success(&result).detected);
}

#[test]
fn failure_serializes_error_and_kind_only() {
    let (_dir, path) = write_file("bad.csv", "only one column\n1\n2\n");
    let result = analyze_file(&path);
    assert!(!result.is_success());

    let json = serde_json::to_value(&result).unwrap();
    let obj = json.as_object().unwrap();
    assert_eq!(obj.len(), 2);
    assert_eq!(json["kind"], "parse_error");
    assert!(json["error"].as_str().is_some_and(|e| !e.is_empty()));
}
