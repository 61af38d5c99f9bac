//! Configuration types for the claims preparation pipeline.
//!
//! This module provides the table schema (which columns are numeric,
//! required, critical) and the pipeline configuration with a builder for
//! ergonomic setup. Configurations are serde types and can be loaded from a
//! JSON file.

use crate::error::PipelineError;
use crate::ingest::normalize_column_name;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the raw dataset.
pub const DEFAULT_INPUT_PATH: &str = "data/raw/insurance_claims.txt";

/// Default location of the processed dataset.
pub const DEFAULT_OUTPUT_PATH: &str = "data/processed/insurance_claims_clean.csv";

/// Strategy for missing values in categorical columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CategoricalImputation {
    /// Leave missing categories empty
    #[default]
    Keep,
    /// Use the most frequent value (ties go to the smallest value)
    Mode,
    /// Use a constant value ("Unknown")
    Constant,
}

/// What to do with an optional numeric column that has no values at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EmptyColumnPolicy {
    /// Fail the run with an `EmptyColumn` error
    #[default]
    Fail,
    /// Drop the column and record it in the report
    Drop,
}

/// Options for reading the raw delimited file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
    /// Field separator. Default: '|'
    pub separator: char,
    /// Quote character, or None to disable quoting. Default: '"'
    pub quote_char: Option<char>,
    /// Whether the first line is a header. Default: true
    pub has_header: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            separator: '|',
            quote_char: Some('"'),
            has_header: true,
        }
    }
}

impl IngestOptions {
    /// Separator as a byte. Only valid after [`PipelineConfig::validate`].
    pub fn separator_byte(&self) -> u8 {
        self.separator as u8
    }

    /// Quote character as a byte.
    pub fn quote_byte(&self) -> Option<u8> {
        self.quote_char.map(|c| c as u8)
    }
}

/// Column roles of the policy table.
///
/// Names are matched after normalization, so `TotalClaims` and
/// `total_claims` refer to the same column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSchema {
    /// Columns parsed as Float64. Everything else is categorical.
    pub numeric_columns: Vec<String>,
    /// Columns that must be present in the raw header.
    pub required_columns: Vec<String>,
    /// Columns whose missing values drop the row instead of being imputed.
    pub critical_columns: Vec<String>,
    /// Columns that must not hold negative values after cleaning.
    pub non_negative_columns: Vec<String>,
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            numeric_columns: owned(&[
                "sum_insured",
                "total_premium",
                "total_claims",
                "calculated_premium_per_term",
                "custom_value_estimate",
                "capital_outstanding",
                "registration_year",
                "cylinders",
                "cubiccapacity",
                "kilowatts",
                "number_of_doors",
                "number_of_vehicles_in_fleet",
            ]),
            required_columns: owned(&["sum_insured", "total_premium", "total_claims"]),
            critical_columns: owned(&["total_claims"]),
            non_negative_columns: owned(&["sum_insured"]),
        }
    }
}

impl TableSchema {
    /// Return a copy with every column name normalized and deduplicated.
    pub fn normalized(&self) -> Self {
        fn normalize_all(names: &[String]) -> Vec<String> {
            let mut out: Vec<String> = Vec::with_capacity(names.len());
            for name in names {
                let normalized = normalize_column_name(name);
                if !out.contains(&normalized) {
                    out.push(normalized);
                }
            }
            out
        }

        Self {
            numeric_columns: normalize_all(&self.numeric_columns),
            required_columns: normalize_all(&self.required_columns),
            critical_columns: normalize_all(&self.critical_columns),
            non_negative_columns: normalize_all(&self.non_negative_columns),
        }
    }

    /// Whether a (normalized) column is declared numeric.
    pub fn is_numeric(&self, column: &str) -> bool {
        self.numeric_columns.iter().any(|c| c == column)
    }

    /// Whether a (normalized) column is required.
    pub fn is_required(&self, column: &str) -> bool {
        self.required_columns.iter().any(|c| c == column)
    }

    /// Whether a (normalized) column is critical.
    pub fn is_critical(&self, column: &str) -> bool {
        self.critical_columns.iter().any(|c| c == column)
    }

    fn all_names(&self) -> impl Iterator<Item = (&'static str, &String)> {
        self.numeric_columns
            .iter()
            .map(|n| ("numeric_columns", n))
            .chain(self.required_columns.iter().map(|n| ("required_columns", n)))
            .chain(self.critical_columns.iter().map(|n| ("critical_columns", n)))
            .chain(
                self.non_negative_columns
                    .iter()
                    .map(|n| ("non_negative_columns", n)),
            )
    }
}

/// Configuration for the cleaning pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use claims_prep::config::{PipelineConfig, CategoricalImputation};
///
/// let config = PipelineConfig::builder()
///     .input_path("data/raw/MachineLearningRating_v3.txt")
///     .critical_columns(["TotalClaims", "TotalPremium"])
///     .categorical_imputation(CategoricalImputation::Mode)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw delimited input file.
    /// Default: "data/raw/insurance_claims.txt"
    pub input_path: PathBuf,

    /// Processed CSV output file.
    /// Default: "data/processed/insurance_claims_clean.csv"
    pub output_path: PathBuf,

    /// How the raw file is read.
    pub ingest: IngestOptions,

    /// Column roles.
    pub schema: TableSchema,

    /// Strategy for missing categorical values.
    /// Default: Keep
    pub categorical_imputation: CategoricalImputation,

    /// Handling of optional numeric columns without any values.
    /// Default: Fail
    pub empty_column_policy: EmptyColumnPolicy,

    /// Whether to derive has_claim, claim_severity, loss_ratio and margin
    /// next to claim_ratio.
    /// Default: true
    pub derive_kpis: bool,

    /// Directory for numeric/categorical summary tables, if any.
    /// Default: None
    pub summary_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            ingest: IngestOptions::default(),
            schema: TableSchema::default(),
            categorical_imputation: CategoricalImputation::default(),
            empty_column_policy: EmptyColumnPolicy::default(),
            derive_kpis: true,
            summary_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load and validate a configuration from a JSON file.
    ///
    /// Fields absent from the file keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: PipelineConfig =
            serde_json::from_str(&content).map_err(|e| PipelineError::ConfigFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let separator = self.ingest.separator;
        if !separator.is_ascii() || separator == '\n' || separator == '\r' {
            return Err(ConfigValidationError::InvalidSeparator(separator));
        }

        if let Some(quote) = self.ingest.quote_char {
            if !quote.is_ascii() {
                return Err(ConfigValidationError::InvalidQuoteChar(quote));
            }
            if quote == separator {
                return Err(ConfigValidationError::SeparatorIsQuote(separator));
            }
        }

        if self.input_path == self.output_path {
            return Err(ConfigValidationError::SameInputOutput(
                self.input_path.clone(),
            ));
        }

        for (field, name) in self.schema.all_names() {
            if normalize_column_name(name).is_empty() {
                return Err(ConfigValidationError::InvalidColumnName {
                    field: field.to_string(),
                    name: name.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid separator {0:?} (must be a single ASCII character other than a line break)")]
    InvalidSeparator(char),

    #[error("Invalid quote character {0:?} (must be ASCII)")]
    InvalidQuoteChar(char),

    #[error("Separator {0:?} is also the quote character")]
    SeparatorIsQuote(char),

    #[error("Input and output both point to {}", .0.display())]
    SameInputOutput(PathBuf),

    #[error("Invalid column name '{name}' in '{field}'")]
    InvalidColumnName { field: String, name: String },
}

impl From<ConfigValidationError> for PipelineError {
    fn from(err: ConfigValidationError) -> Self {
        PipelineError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    input_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    separator: Option<char>,
    quote_char: Option<Option<char>>,
    has_header: Option<bool>,
    schema: Option<TableSchema>,
    numeric_columns: Option<Vec<String>>,
    required_columns: Option<Vec<String>>,
    critical_columns: Option<Vec<String>>,
    non_negative_columns: Option<Vec<String>>,
    categorical_imputation: Option<CategoricalImputation>,
    empty_column_policy: Option<EmptyColumnPolicy>,
    derive_kpis: Option<bool>,
    summary_dir: Option<PathBuf>,
}

fn collect_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}

impl PipelineConfigBuilder {
    /// Set the raw input file.
    pub fn input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = Some(path.into());
        self
    }

    /// Set the processed output file.
    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Set the field separator of the raw file.
    pub fn separator(mut self, separator: char) -> Self {
        self.separator = Some(separator);
        self
    }

    /// Set the quote character of the raw file (None disables quoting).
    pub fn quote_char(mut self, quote: Option<char>) -> Self {
        self.quote_char = Some(quote);
        self
    }

    /// Set whether the raw file has a header line.
    pub fn has_header(mut self, has_header: bool) -> Self {
        self.has_header = Some(has_header);
        self
    }

    /// Replace the whole table schema.
    ///
    /// Individual column setters called on the builder take precedence.
    pub fn schema(mut self, schema: TableSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Set the numeric columns.
    pub fn numeric_columns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.numeric_columns = Some(collect_names(names));
        self
    }

    /// Set the required columns.
    pub fn required_columns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_columns = Some(collect_names(names));
        self
    }

    /// Set the critical columns (rows missing them are dropped).
    pub fn critical_columns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.critical_columns = Some(collect_names(names));
        self
    }

    /// Set the columns that must not be negative.
    pub fn non_negative_columns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.non_negative_columns = Some(collect_names(names));
        self
    }

    /// Set the categorical imputation strategy.
    pub fn categorical_imputation(mut self, strategy: CategoricalImputation) -> Self {
        self.categorical_imputation = Some(strategy);
        self
    }

    /// Set the policy for numeric columns without any values.
    pub fn empty_column_policy(mut self, policy: EmptyColumnPolicy) -> Self {
        self.empty_column_policy = Some(policy);
        self
    }

    /// Enable or disable KPI derivation.
    pub fn derive_kpis(mut self, derive: bool) -> Self {
        self.derive_kpis = Some(derive);
        self
    }

    /// Write summary tables to this directory.
    pub fn summary_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.summary_dir = Some(dir.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let mut schema = self.schema.unwrap_or_default();
        if let Some(numeric) = self.numeric_columns {
            schema.numeric_columns = numeric;
        }
        if let Some(required) = self.required_columns {
            schema.required_columns = required;
        }
        if let Some(critical) = self.critical_columns {
            schema.critical_columns = critical;
        }
        if let Some(non_negative) = self.non_negative_columns {
            schema.non_negative_columns = non_negative;
        }

        let defaults = IngestOptions::default();
        let config = PipelineConfig {
            input_path: self
                .input_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_PATH)),
            output_path: self
                .output_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
            ingest: IngestOptions {
                separator: self.separator.unwrap_or(defaults.separator),
                quote_char: self.quote_char.unwrap_or(defaults.quote_char),
                has_header: self.has_header.unwrap_or(defaults.has_header),
            },
            schema,
            categorical_imputation: self.categorical_imputation.unwrap_or_default(),
            empty_column_policy: self.empty_column_policy.unwrap_or_default(),
            derive_kpis: self.derive_kpis.unwrap_or(true),
            summary_dir: self.summary_dir,
        };

        config.validate()?;
        Ok(config)
    }
}
