//! Main cleaning pipeline module.
//!
//! This module provides the core `Pipeline` struct and builder for
//! orchestrating ingestion, cleaning and output.

use crate::cleaner::{DataCleaner, canonicalize_values, fill_categoricals};
use crate::config::{PipelineConfig, TableSchema};
use crate::error::{Result, ResultExt};
use crate::features::{CLAIM_RATIO, DERIVED_COLUMNS, derive_claim_ratio, derive_kpis};
use crate::imputers::StatisticalImputer;
use crate::ingest;
use crate::pipeline::progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::profiler::write_summaries;
use crate::reporting::write_csv_atomic;
use crate::types::{ActionType, CleaningAction, CleaningSummary, PipelineResult};
use crate::validation::validate_cleaned;
use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// The cleaning pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use claims_prep::{Pipeline, PipelineConfig};
///
/// let result = Pipeline::builder()
///     .config(PipelineConfig::builder().input_path("data/raw/claims.txt").build()?)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run()?;
///
/// println!("{} rows written", result.data.height());
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    schema: TableSchema,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cleaner: DataCleaner,
}

static_assertions::assert_impl_all!(Pipeline: Send);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// The configuration this pipeline runs with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Ingest, clean and write the configured input.
    ///
    /// Nothing is written unless every stage succeeds.
    pub fn run(&self) -> Result<PipelineResult> {
        match self.run_internal() {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete("Pipeline completed successfully"));
                Ok(result)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Read and validate the configured input without cleaning it.
    pub fn ingest(&self) -> Result<DataFrame> {
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Ingestion,
            0.0,
            format!("Reading {}", self.config.input_path.display()),
        ));

        let df = ingest::ingest(&self.config.input_path, &self.config.ingest, &self.schema)?;

        self.report_progress(ProgressUpdate::new(
            PipelineStage::Ingestion,
            1.0,
            format!("Loaded {} rows", df.height()),
        ));
        Ok(df)
    }

    /// Clean a validated table in memory.
    ///
    /// Canonicalizes categorical values, drops rows lacking a critical
    /// field, median-imputes numeric columns, fills categorical gaps, derives
    /// ratio columns and checks the result. Performs no I/O.
    pub fn clean(&self, df: DataFrame) -> Result<(DataFrame, CleaningSummary)> {
        let mut summary = CleaningSummary::new();
        summary.rows_before = df.height();
        summary.columns_before = df.width();

        // Step 1: Canonicalize categoricals, then drop rows missing critical fields
        info!("Step 1: Dropping rows missing critical fields...");
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Cleaning,
            0.0,
            "Canonicalizing categorical columns...",
        ));
        let df = canonicalize_values(df, &self.schema)?;

        self.report_progress(ProgressUpdate::new(
            PipelineStage::Cleaning,
            0.5,
            "Dropping rows missing critical fields...",
        ));
        let (mut df, dropped) = self
            .cleaner
            .drop_rows_missing_critical(df, &self.schema.critical_columns)?;
        summary.rows_dropped_critical = dropped;
        if dropped > 0 {
            let critical = self.schema.critical_columns.join(", ");
            summary.add_action(CleaningAction::new(
                ActionType::RowsRemoved,
                critical.clone(),
                format!("Dropped {} rows missing {}", dropped, critical),
            ));
        }

        // Step 2: Median imputation
        info!("Step 2: Imputing missing numeric values...");
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Imputation,
            0.0,
            "Imputing missing numeric values...",
        ));
        let outcome = StatisticalImputer::impute_numeric_columns(
            &mut df,
            &self.schema,
            self.config.empty_column_policy,
        )?;
        let total = outcome.imputed.len();
        for (idx, imputed) in outcome.imputed.iter().enumerate() {
            self.report_progress(ProgressUpdate::with_items(
                PipelineStage::Imputation,
                format!("Column: {}", imputed.column),
                idx + 1,
                total,
                format!("Filled {} values in '{}'", imputed.filled, imputed.column),
            ));
            summary.add_action(CleaningAction::new(
                ActionType::ValueImputed,
                imputed.column.clone(),
                format!(
                    "Filled {} missing values with median {}",
                    imputed.filled, imputed.median
                ),
            ));
        }
        for column in &outcome.dropped {
            summary.add_warning(format!("Column '{}' had no values and was dropped", column));
            summary.add_action(CleaningAction::new(
                ActionType::ColumnRemoved,
                column.clone(),
                "Dropped column without any values",
            ));
        }
        summary.imputed_columns = outcome.imputed;
        summary.dropped_columns = outcome.dropped;

        // Step 3: Categorical gaps and derived columns
        info!("Step 3: Filling categories and deriving features...");
        self.report_progress(ProgressUpdate::new(
            PipelineStage::FeatureDerivation,
            0.0,
            "Filling missing categorical values...",
        ));
        let (mut df, fills) =
            fill_categoricals(df, &self.schema, self.config.categorical_imputation)?;
        for fill in &fills {
            summary.add_action(CleaningAction::new(
                ActionType::ValueCleaned,
                fill.column.clone(),
                format!("Filled {} missing values with '{}'", fill.filled, fill.value),
            ));
        }
        summary.categorical_fills = fills;

        derive_claim_ratio(&mut df)?;
        summary.derived_columns.push(CLAIM_RATIO.to_string());
        if self.config.derive_kpis {
            derive_kpis(&mut df)?;
            summary
                .derived_columns
                .extend(DERIVED_COLUMNS[1..].iter().map(|c| c.to_string()));
        }
        summary.add_action(CleaningAction::new(
            ActionType::FeatureDerived,
            "dataset",
            format!("Derived {}", summary.derived_columns.join(", ")),
        ));

        // Step 4: Validate
        info!("Step 4: Validating cleaned table...");
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Validation,
            0.0,
            "Validating cleaned table...",
        ));
        validate_cleaned(&df, &self.schema)?;

        summary.rows_after = df.height();
        summary.columns_after = df.width();
        Ok((df, summary))
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(&self) -> Result<PipelineResult> {
        let start_time = Instant::now();
        info!("Starting cleaning pipeline...");

        let df = self.ingest()?;
        let (mut df, mut summary) = self.clean(df)?;

        info!("Step 5: Saving output files...");
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Writing,
            0.0,
            format!("Writing {}", self.config.output_path.display()),
        ));

        // Summaries go first so the processed file only appears on full success.
        let summary_files = match &self.config.summary_dir {
            Some(dir) => write_summaries(&df, dir).context("Failed to write summary tables")?,
            None => Vec::new(),
        };
        write_csv_atomic(&mut df, &self.config.output_path)
            .context(format!("Failed to write {}", self.config.output_path.display()))?;

        summary.duration_ms = start_time.elapsed().as_millis() as u64;
        if summary.rows_after == 0 {
            warn!("Processed table is empty");
            summary.add_warning("Processed table has no rows");
        }

        info!(
            "Pipeline complete: {} rows in, {} rows out, {} values imputed ({} ms)",
            summary.rows_before,
            summary.rows_after,
            summary.values_imputed(),
            summary.duration_ms
        );

        Ok(PipelineResult {
            output_path: self.config.output_path.clone(),
            summary,
            data: df,
            summary_files,
        })
    }
}

/// Builder for creating a [`Pipeline`] instance.
///
/// Use [`Pipeline::builder()`] to get started.
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// This is a convenience method for simple progress handling.
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, crate::config::ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let schema = config.schema.normalized();

        Ok(Pipeline {
            config,
            schema,
            progress_reporter: self.progress_reporter,
            cleaner: DataCleaner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CategoricalImputation, EmptyColumnPolicy};
    use crate::error::PipelineError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn validated() -> DataFrame {
        df![
            "policy_id" => ["1", "2", "3", "4"],
            "sum_insured" => [Some(100.0), None, Some(0.0), Some(300.0)],
            "total_premium" => [Some(10.0), Some(20.0), Some(30.0), None],
            "total_claims" => [Some(20.0), Some(0.0), None, Some(0.0)],
            "province" => [Some("Gauteng"), None, Some("Limpopo"), Some("Gauteng")],
        ]
        .unwrap()
    }

    fn floats(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_pipeline_builder_default() {
        let pipeline = Pipeline::builder().build().unwrap();
        assert!(pipeline.config.derive_kpis);
        assert_eq!(pipeline.schema.critical_columns, vec!["total_claims".to_string()]);
    }

    #[test]
    fn test_pipeline_builder_rejects_invalid_config() {
        let config = PipelineConfig {
            output_path: PipelineConfig::default().input_path,
            ..PipelineConfig::default()
        };
        assert!(Pipeline::builder().config(config).build().is_err());
    }

    #[test]
    fn test_clean() {
        let pipeline = Pipeline::builder().build().unwrap();

        let (df, summary) = pipeline.clean(validated()).unwrap();

        // row 3 had no total_claims
        assert_eq!(df.height(), 3);
        assert_eq!(summary.rows_dropped_critical, 1);

        // medians over the remaining rows: sum_insured [100, 300], premium [10, 20]
        assert_eq!(
            floats(&df, "sum_insured"),
            vec![Some(100.0), Some(200.0), Some(300.0)]
        );
        assert_eq!(
            floats(&df, "total_premium"),
            vec![Some(10.0), Some(20.0), Some(15.0)]
        );
        assert_eq!(floats(&df, "claim_ratio"), vec![Some(0.2), Some(0.0), Some(0.0)]);
        assert_eq!(df.column("province").unwrap().null_count(), 1);
        assert_eq!(summary.imputed_columns.len(), 2);
        assert_eq!(summary.derived_columns.len(), 5);
        assert_eq!(summary.rows_after, 3);
    }

    #[test]
    fn test_clean_drops_quote_only_critical_category() {
        let config = PipelineConfig::builder()
            .critical_columns(["TotalClaims", "Province"])
            .categorical_imputation(CategoricalImputation::Constant)
            .build()
            .unwrap();
        let pipeline = Pipeline::builder().config(config).build().unwrap();
        let df = df![
            "sum_insured" => [100.0, 200.0, 300.0],
            "total_premium" => [10.0, 20.0, 30.0],
            "total_claims" => [1.0, 5.0, 0.0],
            "province" => ["Gauteng", "''", "Limpopo"],
        ]
        .unwrap();

        let (df, summary) = pipeline.clean(df).unwrap();

        assert_eq!(summary.rows_dropped_critical, 1);
        assert_eq!(floats(&df, "sum_insured"), vec![Some(100.0), Some(300.0)]);
        // the dropped row is not filled with the constant
        assert!(summary.categorical_fills.is_empty());
    }

    #[test]
    fn test_clean_without_kpis() {
        let config = PipelineConfig::builder()
            .derive_kpis(false)
            .categorical_imputation(CategoricalImputation::Constant)
            .build()
            .unwrap();
        let pipeline = Pipeline::builder().config(config).build().unwrap();

        let (df, summary) = pipeline.clean(validated()).unwrap();

        assert!(df.column("has_claim").is_err());
        assert_eq!(summary.derived_columns, vec!["claim_ratio".to_string()]);
        assert_eq!(df.column("province").unwrap().null_count(), 0);
    }

    #[test]
    fn test_clean_empty_optional_column() {
        let mut df = validated();
        df.with_column(Series::full_null("kilowatts".into(), 4, &DataType::Float64))
            .unwrap();

        let pipeline = Pipeline::builder().build().unwrap();
        let err = pipeline.clean(df.clone()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyColumn(ref c) if c == "kilowatts"));

        let config = PipelineConfig::builder()
            .empty_column_policy(EmptyColumnPolicy::Drop)
            .build()
            .unwrap();
        let pipeline = Pipeline::builder().config(config).build().unwrap();
        let (df, summary) = pipeline.clean(df).unwrap();
        assert!(df.column("kilowatts").is_err());
        assert_eq!(summary.dropped_columns, vec!["kilowatts".to_string()]);
        assert_eq!(summary.warnings.len(), 1);
    }

    #[test]
    fn test_pipeline_builder_with_progress_callback() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let pipeline = Pipeline::builder()
            .on_progress(move |_update| {
                call_count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        pipeline.report_progress(ProgressUpdate::new(PipelineStage::Cleaning, 0.5, "Test"));

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clean_reports_stages_in_order() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let stages_clone = stages.clone();

        let pipeline = Pipeline::builder()
            .on_progress(move |update| {
                let mut stages = stages_clone.lock().unwrap();
                if stages.last() != Some(&update.stage) {
                    stages.push(update.stage);
                }
            })
            .build()
            .unwrap();

        pipeline.clean(validated()).unwrap();

        assert_eq!(
            *stages.lock().unwrap(),
            vec![
                PipelineStage::Cleaning,
                PipelineStage::Imputation,
                PipelineStage::FeatureDerivation,
                PipelineStage::Validation,
            ]
        );
    }
}
