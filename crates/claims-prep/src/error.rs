//! Error types for the claims preparation pipeline.
//!
//! Every failure is classified into an [`ErrorKind`]: raw input that cannot be
//! read or coerced is a *format* error, a cleaned table that breaks one of the
//! post-cleaning invariants is a *validation* error. Errors serialize as
//! `{code, kind, message}` so they can be emitted as JSON by the CLI.

use serde::Serialize;
use serde::ser::SerializeStruct;
use std::path::PathBuf;
use thiserror::Error;

/// Broad category of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unreadable or mis-shaped raw input.
    Format,
    /// A cleaned table violates an invariant.
    Validation,
    /// The pipeline configuration is unusable.
    Config,
    /// Filesystem failure outside of reading the raw input.
    Io,
    /// Failure inside a dependency (Polars, serde).
    Internal,
}

/// The main error type for the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Raw input file does not exist.
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// Raw input could not be parsed as a delimited file.
    #[error("Malformed input file {}: {reason}", path.display())]
    MalformedInput { path: PathBuf, reason: String },

    /// Required columns are absent from the raw header.
    #[error("Required columns missing from input: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Two raw headers normalize to the same column name.
    #[error("Columns '{first}' and '{second}' both normalize to '{normalized}'")]
    DuplicateColumn {
        first: String,
        second: String,
        normalized: String,
    },

    /// A header normalizes to an empty name.
    #[error("Column name '{0}' has no usable characters")]
    InvalidColumnName(String),

    /// Column was not found in the table.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// A raw value could not be coerced to its declared type.
    #[error("Cannot coerce value '{value}' in column '{column}' (row {row}) to {target_type}")]
    CoercionFailed {
        column: String,
        row: usize,
        value: String,
        target_type: String,
    },

    /// Every value in a column is missing, so no median can be computed.
    #[error("Column '{0}' has no non-missing values")]
    EmptyColumn(String),

    /// A critical column still holds missing values after cleaning.
    #[error("Critical column '{column}' has {count} missing values after cleaning")]
    CriticalNulls { column: String, count: usize },

    /// A numeric column still holds missing values after imputation.
    #[error("Numeric column '{column}' has {count} missing values after imputation")]
    NumericNulls { column: String, count: usize },

    /// A numeric column holds NaN or infinite values.
    #[error("Numeric column '{column}' has {count} non-finite values")]
    NonFiniteValues { column: String, count: usize },

    /// A column constrained to be non-negative holds negative values.
    #[error("Column '{column}' has {count} negative values")]
    NegativeValues { column: String, count: usize },

    /// An output column name is not in normalized form.
    #[error("Output column '{0}' is not normalized")]
    UnnormalizedColumn(String),

    /// A statistical test has too few groups or observations to run.
    #[error("Not enough data for the {test}: {reason}")]
    InsufficientData { test: String, reason: String },

    /// A probability distribution could not be evaluated.
    #[error("Statistics error: {0}")]
    Statistics(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be loaded.
    #[error("Failed to load configuration from {}: {reason}", path.display())]
    ConfigFile { path: PathBuf, reason: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Classify the error. Context wrappers report the kind of their source.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputNotFound(_)
            | Self::MalformedInput { .. }
            | Self::MissingColumns(_)
            | Self::DuplicateColumn { .. }
            | Self::InvalidColumnName(_)
            | Self::ColumnNotFound(_)
            | Self::CoercionFailed { .. } => ErrorKind::Format,
            Self::EmptyColumn(_)
            | Self::CriticalNulls { .. }
            | Self::NumericNulls { .. }
            | Self::NonFiniteValues { .. }
            | Self::NegativeValues { .. }
            | Self::UnnormalizedColumn(_)
            | Self::InsufficientData { .. } => ErrorKind::Validation,
            Self::InvalidConfig(_) | Self::ConfigFile { .. } => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::Polars(_) | Self::Json(_) | Self::Statistics(_) => ErrorKind::Internal,
            Self::WithContext { source, .. } => source.kind(),
        }
    }

    /// Stable error code for machine consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InputNotFound(_) => "INPUT_NOT_FOUND",
            Self::MalformedInput { .. } => "MALFORMED_INPUT",
            Self::MissingColumns(_) => "MISSING_COLUMNS",
            Self::DuplicateColumn { .. } => "DUPLICATE_COLUMN",
            Self::InvalidColumnName(_) => "INVALID_COLUMN_NAME",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::CoercionFailed { .. } => "COERCION_FAILED",
            Self::EmptyColumn(_) => "EMPTY_COLUMN",
            Self::CriticalNulls { .. } => "CRITICAL_NULLS",
            Self::NumericNulls { .. } => "NUMERIC_NULLS",
            Self::NonFiniteValues { .. } => "NON_FINITE_VALUES",
            Self::NegativeValues { .. } => "NEGATIVE_VALUES",
            Self::UnnormalizedColumn(_) => "UNNORMALIZED_COLUMN",
            Self::InsufficientData { .. } => "INSUFFICIENT_DATA",
            Self::Statistics(_) => "STATISTICS_ERROR",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::ConfigFile { .. } => "CONFIG_FILE",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the raw input was unreadable or mis-shaped.
    pub fn is_format_error(&self) -> bool {
        self.kind() == ErrorKind::Format
    }

    /// Whether the cleaned table violated an invariant.
    pub fn is_validation_error(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 3)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}
