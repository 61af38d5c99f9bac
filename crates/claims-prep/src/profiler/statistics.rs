//! Descriptive summary tables.
//!
//! Both tables have a leading `statistic` column naming each row, followed
//! by one column per summarized column. Numeric tables report count, mean,
//! std, min, quartiles and max; categorical tables report count, unique,
//! top and freq.

use crate::error::Result;
use crate::reporting::write_csv_atomic;
use crate::utils::{f64_values, string_mode, string_value_counts};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

pub const NUMERIC_SUMMARY_FILE: &str = "numeric_summary.csv";
pub const CATEGORICAL_SUMMARY_FILE: &str = "categorical_summary.csv";

const STATISTIC: &str = "statistic";
const NUMERIC_STATS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];
const CATEGORICAL_STATS: [&str; 4] = ["count", "unique", "top", "freq"];

/// Sample standard deviation (ddof = 1). `None` for fewer than two values.
pub(crate) fn calculate_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    Some(variance.sqrt())
}

/// Quantile of sorted values with linear interpolation between neighbours.
pub(crate) fn linear_quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

fn describe_numeric(series: &Series) -> Result<Vec<Option<f64>>> {
    let mut values = f64_values(series)?;
    values.sort_by(|a, b| a.total_cmp(b));

    let count = values.len();
    let mean = if count > 0 {
        Some(values.iter().sum::<f64>() / count as f64)
    } else {
        None
    };

    Ok(vec![
        Some(count as f64),
        mean,
        calculate_std(&values),
        values.first().copied(),
        linear_quantile(&values, 0.25),
        linear_quantile(&values, 0.50),
        linear_quantile(&values, 0.75),
        values.last().copied(),
    ])
}

fn describe_categorical(series: &Series) -> Result<Vec<Option<String>>> {
    let counts = string_value_counts(series)?;
    let count: usize = counts.values().sum();
    let (top, freq) = match string_mode(series) {
        Some((value, freq)) => (Some(value), Some(freq.to_string())),
        None => (None, None),
    };

    Ok(vec![
        Some(count.to_string()),
        Some(counts.len().to_string()),
        top,
        freq,
    ])
}

/// Summary of every `Float64` column of `df`.
pub fn numeric_summary(df: &DataFrame) -> Result<DataFrame> {
    let mut columns: Vec<Column> = vec![Column::new(STATISTIC.into(), NUMERIC_STATS)];

    for column in df.get_columns() {
        let series = column.as_materialized_series();
        if series.dtype() != &DataType::Float64 {
            continue;
        }
        let stats = describe_numeric(series)?;
        columns.push(Column::new(series.name().clone(), stats));
    }

    Ok(DataFrame::new(columns)?)
}

/// Summary of every `String` column of `df`.
pub fn categorical_summary(df: &DataFrame) -> Result<DataFrame> {
    let mut columns: Vec<Column> = vec![Column::new(STATISTIC.into(), CATEGORICAL_STATS)];

    for column in df.get_columns() {
        let series = column.as_materialized_series();
        if series.dtype() != &DataType::String {
            continue;
        }
        let stats = describe_categorical(series)?;
        columns.push(Column::new(series.name().clone(), stats));
    }

    Ok(DataFrame::new(columns)?)
}

/// Write both summary tables into `dir`. Returns the written paths.
pub fn write_summaries(df: &DataFrame, dir: &Path) -> Result<Vec<PathBuf>> {
    let numeric_path = dir.join(NUMERIC_SUMMARY_FILE);
    write_csv_atomic(&mut numeric_summary(df)?, &numeric_path)?;

    let categorical_path = dir.join(CATEGORICAL_SUMMARY_FILE);
    write_csv_atomic(&mut categorical_summary(df)?, &categorical_path)?;

    info!("Summary tables saved to {}", dir.display());
    Ok(vec![numeric_path, categorical_path])
}
