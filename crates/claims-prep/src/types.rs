//! Core types for the cleaning pipeline.
//!
//! This module contains the types shared between the cleaning stages and the
//! reporting layer: per-column imputation records, the audit trail of
//! actions and the result of a full run.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Pipeline Result Types
// ============================================================================

/// Result of a completed pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Path of the processed CSV.
    pub output_path: PathBuf,
    /// What the run did.
    pub summary: CleaningSummary,
    /// The cleaned table as written.
    pub data: DataFrame,
    /// Summary tables written next to the output, if requested.
    pub summary_files: Vec<PathBuf>,
}

/// A numeric column whose missing values were replaced by its median.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputedColumn {
    /// Column name.
    pub column: String,
    /// Median of the non-missing values.
    pub median: f64,
    /// Number of values that were filled.
    pub filled: usize,
}

/// A categorical column whose missing values were filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalFill {
    /// Column name.
    pub column: String,
    /// Value written into the empty cells.
    pub value: String,
    /// Number of values that were filled.
    pub filled: usize,
}

// ============================================================================
// Dataset Overview Types
// ============================================================================

/// Shape, types and missing values of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetOverview {
    /// (rows, columns)
    pub shape: (usize, usize),
    /// Per-column details, in table order.
    pub columns: Vec<ColumnOverview>,
}

impl DatasetOverview {
    /// Total number of missing cells.
    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(|c| c.null_count).sum()
    }
}

/// Overview of a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnOverview {
    /// Column name.
    pub name: String,
    /// Polars data type (as string).
    pub dtype: String,
    /// Number of missing values.
    pub null_count: usize,
    /// Percentage of missing values.
    pub null_percentage: f64,
    /// Number of distinct non-missing values.
    pub unique_count: usize,
}

// ============================================================================
// Cleaning Summary Types
// ============================================================================

/// Summary of the changes made by a cleaning run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleaningSummary {
    /// Wall time of the run in milliseconds.
    pub duration_ms: u64,

    /// Number of rows in the validated input.
    pub rows_before: usize,
    /// Number of rows in the cleaned output.
    pub rows_after: usize,
    /// Rows removed because a critical field was missing.
    pub rows_dropped_critical: usize,
    /// Number of columns in the validated input.
    pub columns_before: usize,
    /// Number of columns in the cleaned output (derived columns included).
    pub columns_after: usize,

    /// Numeric columns filled with their median.
    pub imputed_columns: Vec<ImputedColumn>,
    /// Categorical columns filled by the configured strategy.
    pub categorical_fills: Vec<CategoricalFill>,
    /// Optional numeric columns dropped because they held no values.
    pub dropped_columns: Vec<String>,
    /// Columns appended by feature derivation.
    pub derived_columns: Vec<String>,

    /// Audit trail of the run.
    pub actions: Vec<CleaningAction>,
    /// Warnings and notes generated during the run.
    pub warnings: Vec<String>,
}

impl CleaningSummary {
    /// Create a new empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action to the summary.
    pub fn add_action(&mut self, action: CleaningAction) {
        self.actions.push(action);
    }

    /// Add a warning to the summary.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Total number of numeric values that were imputed.
    pub fn values_imputed(&self) -> usize {
        self.imputed_columns.iter().map(|c| c.filled).sum()
    }

    /// Percentage of input rows removed.
    pub fn rows_removed_percentage(&self) -> f32 {
        if self.rows_before == 0 {
            0.0
        } else {
            (self.rows_dropped_critical as f32 / self.rows_before as f32) * 100.0
        }
    }
}

/// A single action taken during cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningAction {
    /// Type of action performed.
    pub action_type: ActionType,
    /// Target of the action (column name or "dataset").
    pub target: String,
    /// Human-readable description of the action.
    pub description: String,
}

impl CleaningAction {
    /// Create a new cleaning action.
    pub fn new(
        action_type: ActionType,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            target: target.into(),
            description: description.into(),
        }
    }
}

/// Types of actions that can be taken during cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Rows were removed because a critical field was missing.
    RowsRemoved,
    /// An empty optional column was removed.
    ColumnRemoved,
    /// Missing numeric values were imputed.
    ValueImputed,
    /// Categorical values were canonicalized or filled.
    ValueCleaned,
    /// A derived column was appended.
    FeatureDerived,
}

impl ActionType {
    /// Get a human-readable display name for the action type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::RowsRemoved => "Rows Removed",
            Self::ColumnRemoved => "Column Removed",
            Self::ValueImputed => "Value Imputed",
            Self::ValueCleaned => "Value Cleaned",
            Self::FeatureDerived => "Feature Derived",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
