//! Derived ratio and KPI columns.
//!
//! All derived columns are `Float64`. A ratio whose denominator is not
//! strictly positive is null rather than zero or infinite.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use tracing::debug;

pub const SUM_INSURED: &str = "sum_insured";
pub const TOTAL_PREMIUM: &str = "total_premium";
pub const TOTAL_CLAIMS: &str = "total_claims";

pub const CLAIM_RATIO: &str = "claim_ratio";
pub const HAS_CLAIM: &str = "has_claim";
pub const CLAIM_SEVERITY: &str = "claim_severity";
pub const LOSS_RATIO: &str = "loss_ratio";
pub const MARGIN: &str = "margin";

/// Every column the feature stage can append, in the order it appends them.
pub const DERIVED_COLUMNS: [&str; 5] = [CLAIM_RATIO, HAS_CLAIM, CLAIM_SEVERITY, LOSS_RATIO, MARGIN];

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .map_err(|_| PipelineError::ColumnNotFound(name.to_string()))?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

/// `numerator / denominator` where the denominator is positive, else null.
fn ratio_column(numerators: &[Option<f64>], denominators: &[Option<f64>]) -> Vec<Option<f64>> {
    numerators
        .iter()
        .zip(denominators)
        .map(|(num, den)| match (num, den) {
            (Some(n), Some(d)) if *d > 0.0 => Some(n / d),
            _ => None,
        })
        .collect()
}

/// Append `claim_ratio = total_claims / sum_insured`, null unless
/// `sum_insured > 0`.
pub fn derive_claim_ratio(df: &mut DataFrame) -> Result<()> {
    let claims = float_column(df, TOTAL_CLAIMS)?;
    let insured = float_column(df, SUM_INSURED)?;

    let ratio = ratio_column(&claims, &insured);
    let undefined = ratio.iter().filter(|v| v.is_none()).count();

    df.with_column(Series::new(CLAIM_RATIO.into(), ratio))?;
    debug!("Derived '{}' ({} undefined)", CLAIM_RATIO, undefined);
    Ok(())
}

/// Append the claim KPIs:
///
/// - `has_claim`: 1.0 when `total_claims > 0`, else 0.0
/// - `claim_severity`: `total_claims` for rows with a claim, else null
/// - `loss_ratio`: `total_claims / total_premium`, null unless the premium is positive
/// - `margin`: `total_premium - total_claims`
pub fn derive_kpis(df: &mut DataFrame) -> Result<()> {
    let claims = float_column(df, TOTAL_CLAIMS)?;
    let premium = float_column(df, TOTAL_PREMIUM)?;

    let has_claim: Vec<Option<f64>> = claims
        .iter()
        .map(|c| c.map(|c| if c > 0.0 { 1.0 } else { 0.0 }))
        .collect();

    let severity: Vec<Option<f64>> = claims
        .iter()
        .map(|c| c.filter(|c| *c > 0.0))
        .collect();

    let loss_ratio = ratio_column(&claims, &premium);

    let margin: Vec<Option<f64>> = premium
        .iter()
        .zip(&claims)
        .map(|(p, c)| match (p, c) {
            (Some(p), Some(c)) => Some(p - c),
            _ => None,
        })
        .collect();

    df.with_column(Series::new(HAS_CLAIM.into(), has_claim))?;
    df.with_column(Series::new(CLAIM_SEVERITY.into(), severity))?;
    df.with_column(Series::new(LOSS_RATIO.into(), loss_ratio))?;
    df.with_column(Series::new(MARGIN.into(), margin))?;

    debug!("Derived KPI columns: {}", DERIVED_COLUMNS[1..].join(", "));
    Ok(())
}
