//! Canonicalization of categorical values.

use crate::config::{CategoricalImputation, TableSchema};
use crate::error::Result;
use crate::imputers::StatisticalImputer;
use crate::types::CategoricalFill;
use polars::prelude::*;
use tracing::debug;

/// Bring every categorical column of `df` to canonical form, then handle
/// its missing values according to `imputation`.
///
/// Equivalent to [`canonicalize_values`] followed by [`fill_categoricals`].
pub fn canonicalize_categoricals(
    df: DataFrame,
    schema: &TableSchema,
    imputation: CategoricalImputation,
) -> Result<(DataFrame, Vec<CategoricalFill>)> {
    let df = canonicalize_values(df, schema)?;
    fill_categoricals(df, schema, imputation)
}

fn categorical_columns(df: &DataFrame, schema: &TableSchema) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .filter(|name| !schema.is_numeric(name.as_str()))
        .map(|s| s.to_string())
        .collect()
}

/// Cast every column not declared numeric to `String`, trim values and strip
/// wrapping quotes. Values that end up empty become null.
///
/// Runs before rows missing a critical field are dropped, so a critical
/// value like `''` counts as missing.
pub fn canonicalize_values(mut df: DataFrame, schema: &TableSchema) -> Result<DataFrame> {
    for col_name in &categorical_columns(&df, schema) {
        let series = df.column(col_name)?.as_materialized_series().clone();
        let str_series = series.cast(&DataType::String)?;

        let mut cleaned_values: Vec<Option<String>> = Vec::with_capacity(str_series.len());
        let mut unquoted = 0usize;
        for opt_val in str_series.str()?.into_iter() {
            match opt_val {
                Some(val) => {
                    let cleaned = strip_wrapping_quotes(val);
                    if had_wrapping_quotes(val, cleaned) {
                        unquoted += 1;
                    }
                    if cleaned.is_empty() {
                        cleaned_values.push(None);
                    } else {
                        cleaned_values.push(Some(cleaned.to_string()));
                    }
                }
                None => cleaned_values.push(None),
            }
        }

        if unquoted > 0 {
            debug!("Stripped quotes from {} values in '{}'", unquoted, col_name);
        }
        df.replace(col_name, Series::new(col_name.as_str().into(), cleaned_values))?;
    }

    Ok(df)
}

/// Fill missing values of every categorical column by `imputation`.
pub fn fill_categoricals(
    mut df: DataFrame,
    schema: &TableSchema,
    imputation: CategoricalImputation,
) -> Result<(DataFrame, Vec<CategoricalFill>)> {
    let mut fills = Vec::new();
    for col_name in &categorical_columns(&df, schema) {
        if let Some(fill) = StatisticalImputer::impute_categorical(&mut df, col_name, imputation)? {
            fills.push(fill);
        }
    }
    Ok((df, fills))
}

/// Trim a value and remove quote pairs wrapping it.
///
/// ```rust,ignore
/// assert_eq!(strip_wrapping_quotes(" \"Gauteng\" "), "Gauteng");
/// assert_eq!(strip_wrapping_quotes("'\"Toyota\"'"), "Toyota");
/// assert_eq!(strip_wrapping_quotes("15\" rims"), "15\" rims");
/// ```
pub fn strip_wrapping_quotes(value: &str) -> &str {
    let mut cleaned = value.trim();

    loop {
        let wrapped = cleaned.len() >= 2
            && ((cleaned.starts_with('"') && cleaned.ends_with('"'))
                || (cleaned.starts_with('\'') && cleaned.ends_with('\'')));
        if !wrapped {
            break;
        }
        cleaned = cleaned[1..cleaned.len() - 1].trim();
    }

    cleaned
}

/// True when stripping removed quotes, not just surrounding whitespace.
fn had_wrapping_quotes(raw: &str, cleaned: &str) -> bool {
    cleaned.len() != raw.trim().len()
}
