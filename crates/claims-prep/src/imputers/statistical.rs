//! Statistical imputation methods.
//!
//! Numeric columns are filled with their median, categorical columns with
//! their mode or a constant.

use crate::config::{CategoricalImputation, EmptyColumnPolicy, TableSchema};
use crate::error::{PipelineError, Result};
use crate::types::{CategoricalFill, ImputedColumn};
use crate::utils::{fill_numeric_nulls, fill_string_nulls, string_mode};
use polars::prelude::*;
use tracing::{debug, warn};

/// Constant used by [`CategoricalImputation::Constant`].
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Outcome of imputing every numeric column of a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumericImputation {
    /// Columns that had missing values filled.
    pub imputed: Vec<ImputedColumn>,
    /// Optional columns removed because they held no values.
    pub dropped: Vec<String>,
}

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill missing values of a numeric column with the median of its
    /// non-missing values.
    ///
    /// Returns `None` when the column has nothing to fill. A column with no
    /// values at all is [`PipelineError::EmptyColumn`]; zero is never
    /// substituted silently.
    pub fn impute_median(df: &mut DataFrame, col_name: &str) -> Result<Option<ImputedColumn>> {
        let series = df
            .column(col_name)
            .map_err(|_| PipelineError::ColumnNotFound(col_name.to_string()))?
            .as_materialized_series()
            .clone();

        let missing = series.null_count();
        if missing == 0 {
            return Ok(None);
        }

        let median = series
            .median()
            .ok_or_else(|| PipelineError::EmptyColumn(col_name.to_string()))?;

        let filled = fill_numeric_nulls(&series, median)?;
        df.replace(col_name, filled)?;

        debug!(
            "Filled {} missing values in '{}' with median {}",
            missing, col_name, median
        );

        Ok(Some(ImputedColumn {
            column: col_name.to_string(),
            median,
            filled: missing,
        }))
    }

    /// Median-impute every declared numeric column present in `df`.
    ///
    /// Optional columns without any values are dropped when `policy` is
    /// [`EmptyColumnPolicy::Drop`]; required columns always fail.
    pub fn impute_numeric_columns(
        df: &mut DataFrame,
        schema: &TableSchema,
        policy: EmptyColumnPolicy,
    ) -> Result<NumericImputation> {
        let column_names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| schema.is_numeric(name.as_str()))
            .map(|s| s.to_string())
            .collect();

        let mut outcome = NumericImputation::default();

        for col_name in &column_names {
            match Self::impute_median(df, col_name) {
                Ok(Some(imputed)) => outcome.imputed.push(imputed),
                Ok(None) => {}
                Err(PipelineError::EmptyColumn(column))
                    if policy == EmptyColumnPolicy::Drop
                        && !schema.is_required(&column)
                        && !schema.is_critical(&column) =>
                {
                    warn!("Dropping column '{}': no values to impute from", column);
                    df.drop_in_place(&column)?;
                    outcome.dropped.push(column);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(outcome)
    }

    /// Fill missing values of a categorical column according to `strategy`.
    ///
    /// Returns `None` when nothing was filled: the strategy is `Keep`, the
    /// column has no missing values, or (for `Mode`) it has no values at all.
    pub fn impute_categorical(
        df: &mut DataFrame,
        col_name: &str,
        strategy: CategoricalImputation,
    ) -> Result<Option<CategoricalFill>> {
        if strategy == CategoricalImputation::Keep {
            return Ok(None);
        }

        let series = df
            .column(col_name)
            .map_err(|_| PipelineError::ColumnNotFound(col_name.to_string()))?
            .as_materialized_series()
            .clone();

        let missing = series.null_count();
        if missing == 0 {
            return Ok(None);
        }

        let value = match strategy {
            CategoricalImputation::Keep => return Ok(None),
            CategoricalImputation::Constant => UNKNOWN_CATEGORY.to_string(),
            CategoricalImputation::Mode => match string_mode(&series) {
                Some((mode, _)) => mode,
                None => {
                    warn!("Column '{}' has no values; leaving it empty", col_name);
                    return Ok(None);
                }
            },
        };

        let filled = fill_string_nulls(&series, &value)?;
        df.replace(col_name, filled)?;

        debug!("Filled {} missing values in '{}' with '{}'", missing, col_name, value);

        Ok(Some(CategoricalFill {
            column: col_name.to_string(),
            value,
            filled: missing,
        }))
    }
}
