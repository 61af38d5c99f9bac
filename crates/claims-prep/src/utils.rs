//! Shared utilities for the cleaning pipeline.
//!
//! This module contains common helper functions used across multiple modules
//! to reduce code duplication and ensure consistency.

use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::collections::BTreeMap;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a string-like type.
#[inline]
pub fn is_string_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Categorical(_, _))
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 5] = ['$', '%', '€', '£', ' '];

/// A number whose integer part is grouped in thousands with commas.
static THOUSANDS_GROUPED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?$").expect("Invalid regex: thousands grouping")
});

/// Raw values that mean "no value" in the source data.
pub const MISSING_MARKERS: [&str; 7] = ["na", "n/a", "nan", "null", "none", "#n/a", "missing"];

/// Clean a string for numeric parsing by removing formatting characters.
///
/// Commas are removed only when they group the integer part in threes, so a
/// decimal comma such as `21,93` is left in place and fails to parse.
///
/// # Example
///
/// ```rust,ignore
/// use claims_prep::utils::clean_numeric_string;
///
/// assert_eq!(clean_numeric_string("$1,234.56"), "1234.56");
/// assert_eq!(clean_numeric_string("  42%  "), "42");
/// ```
pub fn clean_numeric_string(s: &str) -> String {
    let mut result = s.trim().to_string();
    for c in NUMERIC_FORMAT_CHARS {
        result = result.replace(c, "");
    }
    if result.contains(',') && THOUSANDS_GROUPED.is_match(&result) {
        result = result.replace(',', "");
    }
    result
}

/// Check if a raw value is empty or a missing-value marker.
pub fn is_missing_marker(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    lower.is_empty() || MISSING_MARKERS.iter().any(|&marker| lower == marker)
}

/// Try to parse a string as a numeric value (f64).
///
/// Handles common formatting like currency symbols, percentages, and thousands separators.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

// =============================================================================
// Series Statistics Utilities
// =============================================================================

/// Non-null values of a numeric Series as f64, in row order.
pub fn f64_values(series: &Series) -> PolarsResult<Vec<f64>> {
    let float_series = series.cast(&DataType::Float64)?;
    Ok(float_series.f64()?.into_iter().flatten().collect())
}

/// Count of non-null values that are NaN or infinite.
pub fn count_non_finite(series: &Series) -> PolarsResult<usize> {
    Ok(f64_values(series)?
        .into_iter()
        .filter(|v| !v.is_finite())
        .count())
}

/// Count of non-null values strictly below zero.
pub fn count_negative(series: &Series) -> PolarsResult<usize> {
    Ok(f64_values(series)?
        .into_iter()
        .filter(|v| *v < 0.0)
        .count())
}

/// Value counts of a string Series, ordered by value.
pub fn string_value_counts(series: &Series) -> PolarsResult<BTreeMap<String, usize>> {
    let str_series = series.cast(&DataType::String)?;
    let mut counts = BTreeMap::new();
    for val in str_series.str()?.into_iter().flatten() {
        *counts.entry(val.to_string()).or_insert(0) += 1;
    }
    Ok(counts)
}

/// Calculate the mode (most frequent value) of a string Series.
///
/// Ties go to the lexicographically smallest value so that repeated runs
/// agree.
pub fn string_mode(series: &Series) -> Option<(String, usize)> {
    let counts = string_value_counts(series).ok()?;
    counts
        .into_iter()
        .max_by(|(a_val, a_count), (b_val, b_count)| {
            a_count.cmp(b_count).then_with(|| b_val.cmp(a_val))
        })
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Fill null values in a numeric Series with a specific value.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64) -> PolarsResult<Series> {
    let float_series = series.cast(&DataType::Float64)?;
    let values: Vec<Option<f64>> = float_series
        .f64()?
        .into_iter()
        .map(|v| Some(v.unwrap_or(fill_value)))
        .collect();

    Ok(Series::new(series.name().clone(), values))
}

/// Fill null values in a string Series with a specific value.
pub fn fill_string_nulls(series: &Series, fill_value: &str) -> PolarsResult<Series> {
    let str_series = series.cast(&DataType::String)?;
    let values: Vec<Option<String>> = str_series
        .str()?
        .into_iter()
        .map(|v| Some(v.unwrap_or(fill_value).to_string()))
        .collect();

    Ok(Series::new(series.name().clone(), values))
}

// =============================================================================
// Tests
// =============================================================================
