//! Coercion of raw string columns to their declared types.

use crate::config::TableSchema;
use crate::error::{PipelineError, Result};
use crate::utils::{is_missing_marker, is_numeric_dtype, is_string_dtype, parse_numeric_string};
use polars::prelude::*;
use tracing::debug;

/// Coerce every column of `df` to the type the schema declares for it.
///
/// Declared numeric columns become Float64, everything else becomes String.
/// Column names must already be normalized.
pub fn coerce_types(mut df: DataFrame, schema: &TableSchema) -> Result<DataFrame> {
    let column_names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    for col_name in &column_names {
        let series = df.column(col_name)?.as_materialized_series().clone();
        let coerced = if schema.is_numeric(col_name) {
            coerce_numeric(&series)?
        } else {
            coerce_categorical(&series)?
        };
        df.replace(col_name, coerced)?;
    }

    Ok(df)
}

/// Coerce a column to Float64.
///
/// Empty strings and missing markers become null. Any other value that does
/// not parse to a finite number fails with `CoercionFailed`.
pub fn coerce_numeric(series: &Series) -> Result<Series> {
    let column = series.name().to_string();
    let dtype = series.dtype();

    if is_numeric_dtype(dtype) || dtype == &DataType::Boolean {
        let float_series = series.cast(&DataType::Float64)?;
        let non_finite = float_series
            .f64()?
            .into_iter()
            .enumerate()
            .find(|(_, v)| v.is_some_and(|v| !v.is_finite()));
        if let Some((idx, value)) = non_finite {
            return Err(PipelineError::CoercionFailed {
                column,
                row: idx + 1,
                value: value.map(|v| v.to_string()).unwrap_or_default(),
                target_type: "Float64".to_string(),
            });
        }
        return Ok(float_series);
    }

    if dtype == &DataType::Null {
        return Ok(Series::full_null(
            series.name().clone(),
            series.len(),
            &DataType::Float64,
        ));
    }

    if !is_string_dtype(dtype) {
        return Err(PipelineError::CoercionFailed {
            column,
            row: 1,
            value: format!("<{}>", dtype),
            target_type: "Float64".to_string(),
        });
    }

    let str_series = series.cast(&DataType::String)?;
    let mut values: Vec<Option<f64>> = Vec::with_capacity(series.len());
    let mut missing = 0usize;

    for (idx, opt_val) in str_series.str()?.into_iter().enumerate() {
        match opt_val {
            None => {
                values.push(None);
                missing += 1;
            }
            Some(raw) if is_missing_marker(raw) => {
                values.push(None);
                missing += 1;
            }
            Some(raw) => match parse_numeric_string(raw) {
                Some(v) if v.is_finite() => values.push(Some(v)),
                _ => {
                    return Err(PipelineError::CoercionFailed {
                        column,
                        row: idx + 1,
                        value: raw.to_string(),
                        target_type: "Float64".to_string(),
                    });
                }
            },
        }
    }

    debug!("Coerced '{}' to Float64 ({} missing)", column, missing);
    Ok(Series::new(series.name().clone(), values))
}

/// Coerce a column to String, trimming surrounding whitespace.
///
/// Values that are empty after trimming become null.
pub fn coerce_categorical(series: &Series) -> Result<Series> {
    let str_series = series.cast(&DataType::String)?;
    let values: Vec<Option<String>> = str_series
        .str()?
        .into_iter()
        .map(|opt_val| {
            opt_val
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
        .collect();

    Ok(Series::new(series.name().clone(), values))
}
