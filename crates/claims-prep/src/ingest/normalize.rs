//! Column name normalization.

use crate::error::{PipelineError, Result};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// `VATRegistered` -> `VAT_Registered`
static ACRONYM_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").expect("Invalid regex: acronym boundary"));

/// `sumInsured` -> `sum_Insured`
static CAMEL_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("Invalid regex: camel boundary"));

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("Invalid regex: separator run"));

/// Normalize a raw header to lower snake case.
///
/// ```rust,ignore
/// assert_eq!(normalize_column_name("SumInsured"), "sum_insured");
/// assert_eq!(normalize_column_name("IsVATRegistered"), "is_vat_registered");
/// assert_eq!(normalize_column_name(" Total Premium "), "total_premium");
/// ```
///
/// Already-normalized names map to themselves. Returns an empty string when
/// the header has no letters or digits.
pub fn normalize_column_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let split = ACRONYM_BOUNDARY.replace_all(trimmed, "${1}_${2}");
    let split = CAMEL_BOUNDARY.replace_all(&split, "${1}_${2}");
    let joined = NON_ALPHANUMERIC.replace_all(&split, "_");
    joined.trim_matches('_').to_ascii_lowercase()
}

/// Whether a column name is already in normalized form.
pub fn is_normalized(name: &str) -> bool {
    !name.is_empty() && normalize_column_name(name) == name
}

/// Rename every column of `df` to its normalized form.
///
/// Fails when a header normalizes to nothing or when two headers collide.
pub fn normalize_headers(mut df: DataFrame) -> Result<DataFrame> {
    let originals: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    let mut seen: HashMap<String, String> = HashMap::with_capacity(originals.len());
    let mut renamed: Vec<String> = Vec::with_capacity(originals.len());

    for original in &originals {
        let normalized = normalize_column_name(original);
        if normalized.is_empty() {
            return Err(PipelineError::InvalidColumnName(original.clone()));
        }
        if let Some(first) = seen.insert(normalized.clone(), original.clone()) {
            return Err(PipelineError::DuplicateColumn {
                first,
                second: original.clone(),
                normalized,
            });
        }
        if &normalized != original {
            debug!("Renamed column '{}' -> '{}'", original, normalized);
        }
        renamed.push(normalized);
    }

    df.set_column_names(renamed.iter().map(|s| s.as_str()))?;
    Ok(df)
}
