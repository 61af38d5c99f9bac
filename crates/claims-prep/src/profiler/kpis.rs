//! Per-group KPI aggregation.

use crate::error::{PipelineError, Result};
use crate::features::{CLAIM_SEVERITY, HAS_CLAIM, LOSS_RATIO, MARGIN, derive_kpis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const POLICY_ID: &str = "policy_id";

/// KPIs of one group of policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupKpis {
    /// Value of the grouping column.
    pub group: String,
    /// Distinct policy ids, or rows when the table has no `policy_id`.
    pub n_policies: usize,
    /// Rows with a claim.
    pub n_claims: usize,
    /// `n_claims / n_policies`.
    pub claim_freq: f64,
    pub mean_claim_severity: Option<f64>,
    pub mean_loss_ratio: Option<f64>,
    pub mean_margin: Option<f64>,
}

#[derive(Default)]
struct Accumulator {
    policies: BTreeSet<String>,
    rows: usize,
    claims: usize,
    severity: Mean,
    loss_ratio: Mean,
    margin: Mean,
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

pub(super) fn floats(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .map_err(|_| PipelineError::ColumnNotFound(name.to_string()))?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

/// The table itself when it carries the KPI columns, else a copy with them.
pub(super) fn with_kpis(df: &DataFrame) -> Result<Cow<'_, DataFrame>> {
    if df.column(HAS_CLAIM).is_ok() {
        return Ok(Cow::Borrowed(df));
    }
    let mut derived = df.clone();
    derive_kpis(&mut derived)?;
    Ok(Cow::Owned(derived))
}

pub(super) fn strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df
        .column(name)
        .map_err(|_| PipelineError::ColumnNotFound(name.to_string()))?
        .as_materialized_series()
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Aggregate claim KPIs by `group_col`, keeping groups with at least
/// `min_count` policies.
///
/// KPI columns are derived on the fly when the table does not carry them.
/// Rows whose group is missing are ignored. Groups are ordered by policy
/// count, largest first, then by name.
pub fn aggregate_by_group(
    df: &DataFrame,
    group_col: &str,
    min_count: usize,
) -> Result<Vec<GroupKpis>> {
    let groups = strings(df, group_col)?;

    let df = with_kpis(df)?;

    let has_claim = floats(&df, HAS_CLAIM)?;
    let severity = floats(&df, CLAIM_SEVERITY)?;
    let loss_ratio = floats(&df, LOSS_RATIO)?;
    let margin = floats(&df, MARGIN)?;
    let policy_ids = if df.column(POLICY_ID).is_ok() {
        Some(strings(&df, POLICY_ID)?)
    } else {
        None
    };

    let mut accumulators: BTreeMap<String, Accumulator> = BTreeMap::new();
    for (idx, group) in groups.into_iter().enumerate() {
        let Some(group) = group else {
            continue;
        };
        let acc = accumulators.entry(group).or_default();
        acc.rows += 1;
        if has_claim[idx].is_some_and(|v| v > 0.0) {
            acc.claims += 1;
        }
        if let Some(ids) = &policy_ids
            && let Some(id) = &ids[idx]
        {
            acc.policies.insert(id.clone());
        }
        acc.severity.push(severity[idx]);
        acc.loss_ratio.push(loss_ratio[idx]);
        acc.margin.push(margin[idx]);
    }

    let total_groups = accumulators.len();
    let mut kpis: Vec<GroupKpis> = accumulators
        .into_iter()
        .map(|(group, acc)| {
            let n_policies = if policy_ids.is_some() {
                acc.policies.len()
            } else {
                acc.rows
            };
            let claim_freq = if n_policies > 0 {
                acc.claims as f64 / n_policies as f64
            } else {
                0.0
            };
            GroupKpis {
                group,
                n_policies,
                n_claims: acc.claims,
                claim_freq,
                mean_claim_severity: acc.severity.value(),
                mean_loss_ratio: acc.loss_ratio.value(),
                mean_margin: acc.margin.value(),
            }
        })
        .filter(|k| k.n_policies >= min_count)
        .collect();

    // BTreeMap order is ascending by group; stable sort keeps it for ties.
    kpis.sort_by(|a, b| b.n_policies.cmp(&a.n_policies));

    debug!(
        "Kept {} of {} '{}' groups with at least {} policies",
        kpis.len(),
        total_groups,
        group_col,
        min_count
    );
    Ok(kpis)
}

/// Tabulate KPIs with the group values under `group_col`.
pub fn kpis_to_dataframe(group_col: &str, kpis: &[GroupKpis]) -> Result<DataFrame> {
    let groups: Vec<&str> = kpis.iter().map(|k| k.group.as_str()).collect();
    let n_policies: Vec<u64> = kpis.iter().map(|k| k.n_policies as u64).collect();
    let n_claims: Vec<u64> = kpis.iter().map(|k| k.n_claims as u64).collect();
    let claim_freq: Vec<f64> = kpis.iter().map(|k| k.claim_freq).collect();
    let severity: Vec<Option<f64>> = kpis.iter().map(|k| k.mean_claim_severity).collect();
    let loss_ratio: Vec<Option<f64>> = kpis.iter().map(|k| k.mean_loss_ratio).collect();
    let margin: Vec<Option<f64>> = kpis.iter().map(|k| k.mean_margin).collect();

    Ok(DataFrame::new(vec![
        Column::new(group_col.into(), groups),
        Column::new("n_policies".into(), n_policies),
        Column::new("n_claims".into(), n_claims),
        Column::new("claim_freq".into(), claim_freq),
        Column::new("mean_claim_severity".into(), severity),
        Column::new("mean_loss_ratio".into(), loss_ratio),
        Column::new("mean_margin".into(), margin),
    ])?)
}
