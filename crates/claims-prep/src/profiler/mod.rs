//! Data profiling module for dataset analysis.
//!
//! This module provides read-only views over a policy table:
//! - Dataset overview (shape, types, missing values)
//! - Descriptive summary tables for numeric and categorical columns
//! - KPI aggregation per group
//! - Hypothesis tests on claim frequency and KPIs across groups

mod hypothesis;
mod kpis;
mod statistics;

pub use hypothesis::{
    ChiSquareResult, DEFAULT_ALPHA, KruskalResult, ProportionTestResult, chi2_test_frequency,
    interpret_p_value, kruskal_test_numeric, proportion_ztest_pair,
};
pub use kpis::{GroupKpis, aggregate_by_group, kpis_to_dataframe};
pub use statistics::{
    CATEGORICAL_SUMMARY_FILE, NUMERIC_SUMMARY_FILE, categorical_summary, numeric_summary,
    write_summaries,
};

use crate::error::Result;
use crate::types::{ColumnOverview, DatasetOverview};
use polars::prelude::*;

/// Data profiler for analyzing dataset structure.
pub struct DataProfiler;

impl DataProfiler {
    /// Describe the shape, column types and missing values of a table.
    pub fn overview(df: &DataFrame) -> Result<DatasetOverview> {
        let height = df.height();
        let mut columns = Vec::with_capacity(df.width());

        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let null_count = series.null_count();
            let null_percentage = if height > 0 {
                (null_count as f64 / height as f64) * 100.0
            } else {
                0.0
            };
            // n_unique counts null as a value
            let unique_count = series.drop_nulls().n_unique()?;

            columns.push(ColumnOverview {
                name: series.name().to_string(),
                dtype: format!("{}", series.dtype()),
                null_count,
                null_percentage,
                unique_count,
            });
        }

        Ok(DatasetOverview {
            shape: (height, df.width()),
            columns,
        })
    }
}
