//! Progress reporting for the cleaning pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! use claims_prep::Pipeline;
//!
//! let result = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run()?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of the cleaning pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Reading, normalizing and coercing the raw file
    Ingestion,
    /// Dropping rows that lack a critical field
    Cleaning,
    /// Imputing missing numeric values
    Imputation,
    /// Canonicalizing categories and deriving ratio columns
    FeatureDerivation,
    /// Checking post-cleaning invariants
    Validation,
    /// Writing the processed file
    Writing,
    /// Pipeline completed successfully
    Complete,
    /// Pipeline failed with an error
    Failed,
}

impl PipelineStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ingestion => "Ingesting Data",
            Self::Cleaning => "Dropping Incomplete Rows",
            Self::Imputation => "Imputing Values",
            Self::FeatureDerivation => "Deriving Features",
            Self::Validation => "Validating Output",
            Self::Writing => "Writing Output",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Returns the typical weight of this stage in the overall pipeline (0.0 - 1.0).
    ///
    /// Weights of the working stages sum to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Ingestion => 0.25,
            Self::Cleaning => 0.15,
            Self::Imputation => 0.20,
            Self::FeatureDerivation => 0.10,
            Self::Validation => 0.10,
            Self::Writing => 0.20,
            Self::Complete => 0.0,
            Self::Failed => 0.0,
        }
    }

    /// Returns the cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Ingestion => 0.0,
            Self::Cleaning => 0.25,
            Self::Imputation => 0.40,
            Self::FeatureDerivation => 0.60,
            Self::Validation => 0.70,
            Self::Writing => 0.80,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// Progress update emitted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current pipeline stage
    pub stage: PipelineStage,

    /// Optional sub-stage description (e.g., "Column: sum_insured")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    /// Human-readable message describing current activity
    pub message: String,

    /// Number of items processed in current stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    /// Total items in current stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    /// Creates a new progress update for a stage.
    pub fn new(stage: PipelineStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            sub_stage: None,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Creates a new progress update with item counts.
    pub fn with_items(
        stage: PipelineStage,
        sub_stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self {
            sub_stage: Some(sub_stage.into()),
            items_processed: Some(current),
            items_total: Some(total),
            ..Self::new(stage, stage_progress, message)
        }
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Complete, 1.0, message)
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Failed, 0.0, message)
    }
}

/// Trait for receiving progress updates during a run.
pub trait ProgressReporter: Send + Sync {
    /// Called when progress is made. May be called once per column, so
    /// implementations should not block.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_progress_update_new() {
        let update = ProgressUpdate::new(PipelineStage::Cleaning, 0.5, "Dropping rows...");
        assert_eq!(update.stage, PipelineStage::Cleaning);
        assert!(update.sub_stage.is_none());
        assert_eq!(update.stage_progress, 0.5);
        assert!((update.progress - 0.325).abs() < 1e-6);
    }

    #[test]
    fn test_progress_update_with_items() {
        let update = ProgressUpdate::with_items(
            PipelineStage::Imputation,
            "Column: sum_insured",
            5,
            10,
            "Imputing sum_insured",
        );
        assert_eq!(update.sub_stage, Some("Column: sum_insured".to_string()));
        assert_eq!(update.stage_progress, 0.5);
        assert_eq!(update.items_processed, Some(5));
        assert_eq!(update.items_total, Some(10));
    }

    #[test]
    fn test_progress_update_terminal() {
        let update = ProgressUpdate::complete("Done!");
        assert_eq!(update.stage, PipelineStage::Complete);
        assert_eq!(update.progress, 1.0);

        let update = ProgressUpdate::failed("boom");
        assert_eq!(update.stage, PipelineStage::Failed);
        assert_eq!(update.progress, 0.0);
    }

    #[test]
    fn test_closure_progress_reporter() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        reporter.report(ProgressUpdate::new(PipelineStage::Ingestion, 0.5, "Test"));
        reporter.report(ProgressUpdate::complete("Done"));

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stage_weights_sum() {
        let stages = [
            PipelineStage::Ingestion,
            PipelineStage::Cleaning,
            PipelineStage::Imputation,
            PipelineStage::FeatureDerivation,
            PipelineStage::Validation,
            PipelineStage::Writing,
        ];

        let total_weight: f32 = stages.iter().map(|s| s.weight()).sum();
        assert!((total_weight - 1.0).abs() < 0.01, "Weights should sum to ~1.0");

        // each stage starts where the previous one ends
        for pair in stages.windows(2) {
            let end = pair[0].base_progress() + pair[0].weight();
            assert!((end - pair[1].base_progress()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_stage_json_values() {
        let json = serde_json::to_string(&PipelineStage::FeatureDerivation).unwrap();
        assert_eq!(json, "\"feature_derivation\"");
        assert_eq!(PipelineStage::Writing.display_name(), "Writing Output");
    }
}
