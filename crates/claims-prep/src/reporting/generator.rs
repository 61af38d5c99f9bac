use crate::error::Result;
use crate::types::{CategoricalFill, CleaningAction, CleaningSummary, ImputedColumn, PipelineResult};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

// ============================================================================
// Report Types
// ============================================================================

/// Report of a cleaning run, for CLI and library output.
///
/// Use this for both JSON output (`--json`) and file writing (`--emit-report`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningReport {
    // Metadata
    /// Timestamp when the report was generated
    pub generated_at: String,
    /// Path to the raw input file
    pub input_file: String,
    /// Path to the processed output file
    pub output_file: String,

    /// Row and column counts
    pub processing_summary: ProcessingSummaryReport,

    /// Numeric columns filled with their median
    pub imputed_columns: Vec<ImputedColumn>,
    /// Categorical columns filled by the configured strategy
    pub categorical_fills: Vec<CategoricalFill>,
    /// Empty optional columns that were dropped
    pub dropped_columns: Vec<String>,
    /// Columns appended by feature derivation
    pub derived_columns: Vec<String>,
    /// Summary tables written alongside the output
    pub summary_files: Vec<String>,

    /// Audit trail of the run
    pub actions: Vec<CleaningAction>,
}

/// Counts for the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingSummaryReport {
    /// Total execution time in milliseconds
    pub duration_ms: u64,
    /// Number of rows in the validated input
    pub rows_before: usize,
    /// Number of rows written
    pub rows_after: usize,
    /// Rows dropped for a missing critical field
    pub rows_dropped_critical: usize,
    /// Percentage of rows dropped
    pub rows_removed_percent: f32,
    /// Number of columns in the validated input
    pub columns_before: usize,
    /// Number of columns written
    pub columns_after: usize,
    /// Total number of numeric values imputed
    pub values_imputed: usize,
    /// Warnings generated during processing
    pub warnings: Vec<String>,
}

/// Report generator for run reports.
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl ReportGenerator {
    /// Create a new ReportGenerator writing into `output_dir`.
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    /// Build a report from a pipeline result.
    pub fn build_report(input_file: &Path, result: &PipelineResult) -> CleaningReport {
        let summary: &CleaningSummary = &result.summary;

        let processing_summary = ProcessingSummaryReport {
            duration_ms: summary.duration_ms,
            rows_before: summary.rows_before,
            rows_after: summary.rows_after,
            rows_dropped_critical: summary.rows_dropped_critical,
            rows_removed_percent: summary.rows_removed_percentage(),
            columns_before: summary.columns_before,
            columns_after: summary.columns_after,
            values_imputed: summary.values_imputed(),
            warnings: summary.warnings.clone(),
        };

        CleaningReport {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            input_file: input_file.display().to_string(),
            output_file: result.output_path.display().to_string(),
            processing_summary,
            imputed_columns: summary.imputed_columns.clone(),
            categorical_fills: summary.categorical_fills.clone(),
            dropped_columns: summary.dropped_columns.clone(),
            derived_columns: summary.derived_columns.clone(),
            summary_files: result
                .summary_files
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            actions: summary.actions.clone(),
        }
    }

    /// Write a report to a JSON file.
    ///
    /// If `report_base_name` is "insurance_claims", the file will be
    /// "insurance_claims_report.json".
    pub fn write_report_to_file(
        &self,
        report: &CleaningReport,
        report_base_name: &str,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;

        let report_path = self
            .output_dir
            .join(format!("{}_report.json", report_base_name));
        let mut file = File::create(&report_path)?;
        file.write_all(serde_json::to_string_pretty(report)?.as_bytes())?;

        info!("Report saved: {}", report_path.display());

        Ok(report_path)
    }
}
