//! Post-cleaning invariant checks.
//!
//! A cleaned table must satisfy:
//! - every column name is in normalized form
//! - critical columns have no missing values
//! - declared numeric columns have no missing and no non-finite values
//! - derived columns have no non-finite values (missing is allowed)
//! - non-negative columns hold no negative values

use crate::config::TableSchema;
use crate::error::{PipelineError, Result};
use crate::features::DERIVED_COLUMNS;
use crate::ingest::is_normalized;
use crate::utils::{count_negative, count_non_finite};
use polars::prelude::*;
use tracing::debug;

/// Check every post-cleaning invariant, failing on the first violation.
pub fn validate_cleaned(df: &DataFrame, schema: &TableSchema) -> Result<()> {
    let schema = schema.normalized();

    for name in df.get_column_names() {
        if !is_normalized(name.as_str()) {
            return Err(PipelineError::UnnormalizedColumn(name.to_string()));
        }
    }

    for col_name in &schema.critical_columns {
        let column = df
            .column(col_name)
            .map_err(|_| PipelineError::ColumnNotFound(col_name.clone()))?;
        let count = column.null_count();
        if count > 0 {
            return Err(PipelineError::CriticalNulls {
                column: col_name.clone(),
                count,
            });
        }
    }

    for column in df.get_columns() {
        let col_name = column.name().as_str();
        let is_numeric = schema.is_numeric(col_name);
        let is_derived = DERIVED_COLUMNS.contains(&col_name);
        if !is_numeric && !is_derived {
            continue;
        }

        let series = column.as_materialized_series();
        if is_numeric {
            let count = series.null_count();
            if count > 0 {
                return Err(PipelineError::NumericNulls {
                    column: col_name.to_string(),
                    count,
                });
            }
        }

        let count = count_non_finite(series)?;
        if count > 0 {
            return Err(PipelineError::NonFiniteValues {
                column: col_name.to_string(),
                count,
            });
        }
    }

    for col_name in &schema.non_negative_columns {
        // Optional columns may have been dropped as empty.
        let Ok(column) = df.column(col_name) else {
            continue;
        };
        let count = count_negative(column.as_materialized_series())?;
        if count > 0 {
            return Err(PipelineError::NegativeValues {
                column: col_name.clone(),
                count,
            });
        }
    }

    debug!("Cleaned table passed validation ({} rows)", df.height());
    Ok(())
}
