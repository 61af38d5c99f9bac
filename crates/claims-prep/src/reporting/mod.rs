//! Output and report generation module.
//!
//! This module writes the processed dataset and the run report.
//!
//! # Reports
//!
//! Use [`CleaningReport`] for:
//! - JSON output to stdout (`--json` CLI flag)
//! - JSON file output (`--emit-report` CLI flag)
//! - Programmatic access in library mode
//!
//! # Example
//!
//! ```rust,ignore
//! use claims_prep::reporting::ReportGenerator;
//!
//! let report = ReportGenerator::build_report(&config.input_path, &pipeline_result);
//! println!("{}", serde_json::to_string_pretty(&report)?);
//!
//! let generator = ReportGenerator::new(PathBuf::from("data/processed"));
//! generator.write_report_to_file(&report, "insurance_claims")?;
//! ```

mod generator;
mod writer;

pub use generator::{CleaningReport, ProcessingSummaryReport, ReportGenerator};
pub use writer::write_csv_atomic;
