//! Integration tests for the claims preparation pipeline.
//!
//! These tests run the full pipeline against the fixture files and check the
//! processed output on disk.

use claims_prep::ingest::is_normalized;
use claims_prep::profiler::{
    CATEGORICAL_SUMMARY_FILE, NUMERIC_SUMMARY_FILE, aggregate_by_group, chi2_test_frequency,
};
use claims_prep::{
    CategoricalImputation, ErrorKind, Pipeline, PipelineConfig, PipelineError, PipelineStage,
    ReportGenerator,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn config_for(input: &str, output: &Path) -> PipelineConfig {
    PipelineConfig::builder()
        .input_path(fixtures_path().join(input))
        .output_path(output)
        .build()
        .expect("valid config")
}

fn run(config: PipelineConfig) -> Result<claims_prep::PipelineResult, PipelineError> {
    Pipeline::builder().config(config).build().unwrap().run()
}

fn load_output(path: &Path) -> DataFrame {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .expect("Failed to create CSV reader")
        .finish()
        .expect("Failed to read CSV file")
}

fn floats(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    df.column(name)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

// ============================================================================
// Full Pipeline Tests
// ============================================================================

#[test]
fn test_full_pipeline_sample_claims() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("processed/claims_clean.csv");

    let result = run(config_for("sample_claims.txt", &output)).unwrap();

    assert!(output.exists());
    assert_eq!(result.output_path, output);

    let summary = &result.summary;
    assert_eq!(summary.rows_before, 5);
    assert_eq!(summary.rows_dropped_critical, 1);
    assert_eq!(summary.rows_after, 4);

    let df = load_output(&output);
    assert_eq!(df.height(), 4);

    // Row with the missing TotalClaims is gone
    let cover_ids = floats(&df, "underwritten_cover_id");
    assert_eq!(cover_ids, vec![Some(1.0), Some(2.0), Some(3.0), Some(5.0)]);

    // Median of the remaining sum_insured values (100000, 300000, 0)
    assert_eq!(floats(&df, "sum_insured")[1], Some(100000.0));
    assert_eq!(floats(&df, "calculated_premium_per_term")[3], Some(25.0));

    // claim_ratio is null where nothing is insured
    assert_eq!(
        floats(&df, "claim_ratio"),
        vec![Some(0.0), Some(0.01), Some(0.0), None]
    );
    assert_eq!(floats(&df, "loss_ratio"), vec![Some(0.0), Some(2.5), Some(0.0), None]);
}

#[test]
fn test_output_headers_are_normalized() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");

    run(config_for("sample_claims.txt", &output)).unwrap();

    let df = load_output(&output);
    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    for name in &names {
        assert!(is_normalized(name), "'{}' is not normalized", name);
    }
    assert_eq!(names[0], "underwritten_cover_id");
    assert!(names.contains(&"calculated_premium_per_term".to_string()));
    assert!(names.contains(&"claim_ratio".to_string()));
    assert!(names.contains(&"loss_ratio".to_string()));
}

#[test]
fn test_no_missing_numeric_values_after_cleaning() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");

    let result = run(config_for("sample_claims.txt", &output)).unwrap();

    for name in [
        "sum_insured",
        "total_premium",
        "total_claims",
        "calculated_premium_per_term",
    ] {
        assert_eq!(
            result.data.column(name).unwrap().null_count(),
            0,
            "{} still has nulls",
            name
        );
    }
    assert_eq!(result.summary.values_imputed(), 2);
}

#[test]
fn test_categorical_values_are_canonicalized() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");

    let result = run(config_for("sample_claims.txt", &output)).unwrap();

    let provinces: Vec<Option<&str>> = result
        .data
        .column("province")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(
        provinces,
        vec![
            Some("Gauteng"),
            Some("Gauteng"),
            Some("Western Cape"),
            Some("Limpopo")
        ]
    );

    // Keep strategy leaves the missing gender empty
    assert_eq!(result.data.column("gender").unwrap().null_count(), 1);
}

#[test]
fn test_constant_categorical_imputation() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");

    let mut config = config_for("sample_claims.txt", &output);
    config.categorical_imputation = CategoricalImputation::Constant;

    let result = run(config).unwrap();

    let gender: Vec<Option<&str>> = result
        .data
        .column("gender")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(gender[1], Some("Unknown"));
    assert_eq!(result.summary.categorical_fills.len(), 1);
}

#[test]
fn test_comma_separated_input() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");

    let config = PipelineConfig::builder()
        .input_path(fixtures_path().join("comma_claims.csv"))
        .output_path(&output)
        .separator(',')
        .build()
        .unwrap();

    let result = run(config).unwrap();

    assert_eq!(result.summary.rows_after, 3);
    assert_eq!(floats(&result.data, "sum_insured")[1], Some(200000.0));
    assert_eq!(
        floats(&result.data, "loss_ratio"),
        vec![Some(0.2), Some(0.0), Some(0.25)]
    );
}

#[test]
fn test_blank_critical_category_drops_row() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");

    let config = PipelineConfig::builder()
        .input_path(fixtures_path().join("quoted_critical.txt"))
        .output_path(&output)
        .critical_columns(["TotalClaims", "Province"])
        .build()
        .unwrap();

    let result = run(config).unwrap();

    assert_eq!(result.summary.rows_dropped_critical, 2);
    let df = load_output(&output);
    assert_eq!(floats(&df, "policy_id"), vec![Some(1.0), Some(4.0)]);
}

#[test]
fn test_repeated_runs_are_byte_identical() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first.csv");
    let second = dir.path().join("second.csv");

    run(config_for("sample_claims.txt", &first)).unwrap();
    run(config_for("sample_claims.txt", &second)).unwrap();

    let first_bytes = std::fs::read(&first).unwrap();
    let second_bytes = std::fs::read(&second).unwrap();
    assert!(!first_bytes.is_empty());
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn test_rerun_overwrites_output() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");
    std::fs::write(&output, "stale").unwrap();

    run(config_for("sample_claims.txt", &output)).unwrap();

    let content = std::fs::read_to_string(&output).unwrap();
    assert!(content.starts_with("underwritten_cover_id,policy_id"));
}

// ============================================================================
// Failure Tests
// ============================================================================

#[test]
fn test_missing_required_column_fails_without_output() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");

    let err = run(config_for("missing_total_claims.txt", &output)).unwrap_err();

    assert!(matches!(err, PipelineError::MissingColumns(ref cols) if cols == &vec!["total_claims".to_string()]));
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(!output.exists());
}

#[test]
fn test_non_numeric_value_fails_without_output() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");

    let err = run(config_for("bad_value.txt", &output)).unwrap_err();

    match &err {
        PipelineError::CoercionFailed {
            column, row, value, ..
        } => {
            assert_eq!(column, "total_premium");
            assert_eq!(*row, 2);
            assert_eq!(value, "abc");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.error_code(), "COERCION_FAILED");
    assert!(!output.exists());
}

#[test]
fn test_negative_sum_insured_is_a_validation_error() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");
    let summary_dir = dir.path().join("summaries");

    let mut config = config_for("negative_sum_insured.txt", &output);
    config.summary_dir = Some(summary_dir.clone());

    let err = run(config).unwrap_err();

    assert!(err.is_validation_error());
    assert!(matches!(err, PipelineError::NegativeValues { count: 1, .. }));
    assert!(!output.exists());
    assert!(!summary_dir.join(NUMERIC_SUMMARY_FILE).exists());
}

#[test]
fn test_missing_input_file() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");

    let err = run(config_for("does_not_exist.txt", &output)).unwrap_err();

    assert!(matches!(err, PipelineError::InputNotFound(_)));
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["code"], "INPUT_NOT_FOUND");
    assert_eq!(json["kind"], "format");
}

// ============================================================================
// Summaries, Reports and KPIs
// ============================================================================

#[test]
fn test_summary_tables_written() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");
    let summary_dir = dir.path().join("summaries");

    let mut config = config_for("sample_claims.txt", &output);
    config.summary_dir = Some(summary_dir.clone());

    let result = run(config).unwrap();

    assert_eq!(result.summary_files.len(), 2);
    let numeric = load_output(&summary_dir.join(NUMERIC_SUMMARY_FILE));
    assert_eq!(numeric.column("statistic").unwrap().len(), 8);
    assert!(numeric.column("sum_insured").is_ok());

    let categorical = load_output(&summary_dir.join(CATEGORICAL_SUMMARY_FILE));
    assert!(categorical.column("province").is_ok());
}

#[test]
fn test_report_written_next_to_output() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");
    let input = fixtures_path().join("sample_claims.txt");

    let result = run(config_for("sample_claims.txt", &output)).unwrap();
    let report = ReportGenerator::build_report(&input, &result);

    let generator = ReportGenerator::new(dir.path().to_path_buf());
    let path = generator
        .write_report_to_file(&report, "sample_claims")
        .unwrap();

    assert_eq!(path, dir.path().join("sample_claims_report.json"));
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["processing_summary"]["rows_dropped_critical"], 1);
    assert_eq!(json["processing_summary"]["rows_after"], 4);
    assert_eq!(json["imputed_columns"][0]["column"], "sum_insured");
}

#[test]
fn test_kpis_from_cleaned_table() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");

    let result = run(config_for("sample_claims.txt", &output)).unwrap();
    let kpis = aggregate_by_group(&result.data, "province", 1).unwrap();

    let groups: Vec<&str> = kpis.iter().map(|k| k.group.as_str()).collect();
    assert_eq!(groups, vec!["Gauteng", "Limpopo", "Western Cape"]);

    let gauteng = &kpis[0];
    // two rows of the same policy
    assert_eq!(gauteng.n_policies, 1);
    assert_eq!(gauteng.n_claims, 1);
    assert_eq!(gauteng.mean_claim_severity, Some(1000.0));
}

#[test]
fn test_claim_frequency_by_province() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");

    let result = run(config_for("sample_claims.txt", &output)).unwrap();
    let chi2 = chi2_test_frequency(&result.data, "province", 1).unwrap();

    assert_eq!(chi2.groups_used, vec!["Gauteng", "Limpopo", "Western Cape"]);
    assert_eq!(chi2.contingency_table, vec![[1, 1], [1, 0], [1, 0]]);
    assert_eq!(chi2.dof, 2);
    assert!((chi2.statistic - 4.0 / 3.0).abs() < 1e-9);
    assert!((chi2.p_value - (-2.0f64 / 3.0).exp()).abs() < 1e-9);

    let err = chi2_test_frequency(&result.data, "province", 2).unwrap_err();
    assert!(matches!(err, PipelineError::InsufficientData { .. }));
}

#[test]
fn test_in_memory_clean_writes_nothing() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");

    let pipeline = Pipeline::builder()
        .config(config_for("sample_claims.txt", &output))
        .build()
        .unwrap();

    let df = pipeline.ingest().unwrap();
    let (cleaned, summary) = pipeline.clean(df).unwrap();

    assert_eq!(cleaned.height(), 4);
    assert_eq!(summary.rows_dropped_critical, 1);
    assert!(!output.exists());
}

#[test]
fn test_progress_stages_in_order() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.csv");

    let stages = Arc::new(Mutex::new(Vec::new()));
    let stages_clone = stages.clone();

    Pipeline::builder()
        .config(config_for("sample_claims.txt", &output))
        .on_progress(move |update| {
            stages_clone.lock().unwrap().push(update.stage);
        })
        .build()
        .unwrap()
        .run()
        .unwrap();

    let mut seen = stages.lock().unwrap().clone();
    seen.dedup();
    assert_eq!(seen.first(), Some(&PipelineStage::Ingestion));
    assert_eq!(seen.last(), Some(&PipelineStage::Complete));
    assert!(seen.contains(&PipelineStage::Writing));
}
