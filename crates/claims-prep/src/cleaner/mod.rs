//! Row and value cleaning for the validated policy table.
//!
//! This module provides functionality for:
//! - Dropping rows that lack a critical field
//! - Canonicalizing categorical columns

mod sanitizers;

pub use sanitizers::{
    canonicalize_categoricals, canonicalize_values, fill_categoricals, strip_wrapping_quotes,
};

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use tracing::{debug, info};

/// Data cleaner for row-level cleaning operations.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataCleaner;

impl DataCleaner {
    /// Drop every row that has a missing value in any of the `critical`
    /// columns. Returns the filtered table and the number of dropped rows.
    ///
    /// A critical column that is missing in every row is reported as
    /// [`PipelineError::EmptyColumn`] rather than emptying the table, and a
    /// critical column absent from the table is
    /// [`PipelineError::ColumnNotFound`]. Row order is preserved.
    pub fn drop_rows_missing_critical(
        &self,
        df: DataFrame,
        critical: &[String],
    ) -> Result<(DataFrame, usize)> {
        let height = df.height();
        let mut keep = vec![true; height];

        for col_name in critical {
            let column = df
                .column(col_name)
                .map_err(|_| PipelineError::ColumnNotFound(col_name.clone()))?;
            let series = column.as_materialized_series();

            let nulls = series.null_count();
            if height > 0 && nulls == height {
                return Err(PipelineError::EmptyColumn(col_name.clone()));
            }
            if nulls == 0 {
                continue;
            }

            for (idx, is_null) in series.is_null().into_iter().enumerate() {
                if is_null == Some(true) {
                    keep[idx] = false;
                }
            }
            debug!("Column '{}' has {} missing critical values", col_name, nulls);
        }

        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped == 0 {
            return Ok((df, 0));
        }

        let mask = BooleanChunked::from_slice("keep".into(), &keep);
        let df = df.filter(&mask)?;

        info!(
            "Dropped {} of {} rows missing a critical field ({})",
            dropped,
            height,
            critical.join(", ")
        );
        Ok((df, dropped))
    }
}
