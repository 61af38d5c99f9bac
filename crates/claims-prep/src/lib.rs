//! Insurance Claims Preparation Library
//!
//! Ingestion and cleaning of raw insurance policy datasets, built with Rust
//! and Polars.
//!
//! # Overview
//!
//! - **Ingestion**: reads the raw delimited file, normalizes column names to
//!   lower snake case and coerces every column to its declared type
//! - **Cleaning**: drops rows lacking a critical field, imputes missing
//!   numeric values with the column median, canonicalizes categories
//! - **Features**: derives `claim_ratio` and the claim KPIs
//! - **Validation**: checks the cleaned table before anything is written
//! - **Profiling**: dataset overview, summary tables and per-group KPIs
//! - **Progress Reporting**: stage-by-stage progress updates
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use claims_prep::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::builder()
//!     .input_path("data/raw/insurance_claims.txt")
//!     .output_path("data/processed/insurance_claims_clean.csv")
//!     .critical_columns(["TotalClaims"])
//!     .build()?;
//!
//! let result = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run()?;
//!
//! println!("Dropped {} rows", result.summary.rows_dropped_critical);
//! ```
//!
//! # Errors
//!
//! Every failure is a [`PipelineError`]. Unreadable or mis-shaped input is a
//! format error, a cleaned table that breaks an invariant is a validation
//! error. A failed run never leaves a processed file behind.

pub mod cleaner;
pub mod config;
pub mod error;
pub mod features;
pub mod imputers;
pub mod ingest;
pub mod pipeline;
pub mod profiler;
pub mod reporting;
pub mod types;
pub mod utils;
pub mod validation;

// Re-exports for convenient access
pub use cleaner::DataCleaner;
pub use config::{
    CategoricalImputation, ConfigValidationError, EmptyColumnPolicy, IngestOptions,
    PipelineConfig, PipelineConfigBuilder, TableSchema,
};
pub use error::{ErrorKind, PipelineError, ResultExt};
pub use imputers::StatisticalImputer;
pub use pipeline::{
    ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineStage, ProgressReporter,
    ProgressUpdate,
};
pub use profiler::{DataProfiler, GroupKpis};
pub use reporting::{CleaningReport, ReportGenerator};
pub use types::{
    ActionType, CategoricalFill, CleaningAction, CleaningSummary, ColumnOverview,
    DatasetOverview, ImputedColumn, PipelineResult,
};
pub use validation::validate_cleaned;
