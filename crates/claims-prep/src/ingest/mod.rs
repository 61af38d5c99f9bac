//! Ingestion and validation of the raw policy dataset.
//!
//! Ingestion reads the raw delimited file, normalizes the headers to lower
//! snake case, checks that the required columns are present and coerces
//! every column to its declared type. Any structural problem is a format
//! error; nothing is written to disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use claims_prep::ingest;
//! use claims_prep::config::{IngestOptions, TableSchema};
//!
//! let df = ingest::ingest(
//!     "data/raw/insurance_claims.txt".as_ref(),
//!     &IngestOptions::default(),
//!     &TableSchema::default(),
//! )?;
//! ```

mod coercion;
mod normalize;
mod reader;

pub use coercion::{coerce_categorical, coerce_numeric, coerce_types};
pub use normalize::{is_normalized, normalize_column_name, normalize_headers};
pub use reader::{read_raw, read_raw_str};

use crate::config::{IngestOptions, TableSchema};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::path::Path;
use tracing::info;

/// Check that every required column is present, reporting all that are not.
pub fn check_required_columns(df: &DataFrame, schema: &TableSchema) -> Result<()> {
    let present: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    let missing: Vec<String> = schema
        .required_columns
        .iter()
        .filter(|name| !present.contains(name))
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::MissingColumns(missing))
    }
}

/// Normalize, check and coerce a table of raw values.
pub fn validate_raw_frame(df: DataFrame, schema: &TableSchema) -> Result<DataFrame> {
    let schema = schema.normalized();
    let df = normalize_headers(df)?;
    check_required_columns(&df, &schema)?;
    coerce_types(df, &schema)
}

/// Read the raw file at `path` and return a validated, typed table.
pub fn ingest(path: &Path, options: &IngestOptions, schema: &TableSchema) -> Result<DataFrame> {
    let schema = schema.normalized();
    let raw = read_raw(path, options)?;
    let df = validate_raw_frame(raw, &schema)?;

    let numeric = df
        .get_column_names()
        .into_iter()
        .filter(|name| schema.is_numeric(name.as_str()))
        .count();
    info!(
        "Validated {} rows: {} numeric, {} categorical columns",
        df.height(),
        numeric,
        df.width() - numeric
    );

    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_raw_frame() {
        let raw = df![
            "PolicyID" => ["1", "2"],
            "SumInsured" => ["100", "0"],
            "TotalPremium" => ["10", "5"],
            "TotalClaims" => ["20", ""],
            "Province" => ["Gauteng", " Limpopo"],
        ]
        .unwrap();

        let df = validate_raw_frame(raw, &TableSchema::default()).unwrap();

        assert_eq!(df.column("sum_insured").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("total_claims").unwrap().null_count(), 1);
        assert_eq!(df.column("policy_id").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_missing_required_columns() {
        let raw = df![
            "SumInsured" => ["100"],
            "Province" => ["Gauteng"],
        ]
        .unwrap();

        let err = validate_raw_frame(raw, &TableSchema::default()).unwrap_err();

        match err {
            PipelineError::MissingColumns(ref cols) => {
                assert_eq!(cols, &vec!["total_premium".to_string(), "total_claims".to_string()]);
            }
            ref other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_format_error());
    }

    #[test]
    fn test_schema_names_are_normalized_before_matching() {
        let schema = TableSchema {
            numeric_columns: vec!["CustomValue".to_string()],
            required_columns: vec!["CustomValue".to_string()],
            critical_columns: vec![],
            non_negative_columns: vec![],
        };
        let raw = df![
            "custom value" => ["1.5"],
        ]
        .unwrap();

        let df = validate_raw_frame(raw, &schema).unwrap();
        assert_eq!(df.column("custom_value").unwrap().dtype(), &DataType::Float64);
    }
}
