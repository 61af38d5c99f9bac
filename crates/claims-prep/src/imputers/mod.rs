//! Imputation module for handling missing values.
//!
//! Numeric columns are filled with the column median, categorical columns
//! with their mode or a constant, depending on configuration.

mod statistical;

pub use statistical::{NumericImputation, StatisticalImputer, UNKNOWN_CATEGORY};
