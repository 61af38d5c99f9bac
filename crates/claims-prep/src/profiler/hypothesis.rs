//! Hypothesis tests on claim KPIs.
//!
//! Claim frequency is compared across groups with a chi-square test of
//! independence, and between two groups with a pooled two-proportion z-test.
//! A numeric column (claim severity, margin, ...) is compared across groups
//! with the Kruskal-Wallis H-test. KPI columns are derived on the fly when
//! the table does not carry them.
//!
//! A test that cannot run (too few groups, no variation) fails with
//! [`PipelineError::InsufficientData`].

use super::kpis::{floats, strings, with_kpis};
use crate::error::{PipelineError, Result};
use crate::features::{DERIVED_COLUMNS, HAS_CLAIM};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::debug;

/// Significance level used when none is given.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Chi-square test of independence between a group and `has_claim`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChiSquareResult {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: usize,
    /// Groups with at least `min_count` policies, ascending.
    pub groups_used: Vec<String>,
    /// `[no_claim, has_claim]` per group, in `groups_used` order.
    pub contingency_table: Vec<[u64; 2]>,
    /// Expected counts under independence.
    pub expected: Vec<[f64; 2]>,
}

/// Two-proportion z-test on claim frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProportionTestResult {
    pub statistic: f64,
    pub p_value: f64,
    /// `[group_a, group_b]` as requested.
    pub groups: [String; 2],
    /// Policies with a claim per group.
    pub count: [u64; 2],
    /// Policies per group.
    pub nobs: [u64; 2],
}

/// Kruskal-Wallis H-test of a numeric column across groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KruskalResult {
    pub column: String,
    pub statistic: f64,
    pub p_value: f64,
    pub dof: usize,
    pub groups_used: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy)]
struct ClaimCounts {
    nobs: u64,
    claims: u64,
}

fn insufficient(test: &str, reason: impl Into<String>) -> PipelineError {
    PipelineError::InsufficientData {
        test: test.to_string(),
        reason: reason.into(),
    }
}

fn chi_squared_sf(statistic: f64, dof: usize) -> Result<f64> {
    let dist =
        ChiSquared::new(dof as f64).map_err(|e| PipelineError::Statistics(e.to_string()))?;
    Ok(dist.sf(statistic))
}

/// Rows and rows with a claim per group. Rows with a missing group or
/// missing `has_claim` are skipped.
fn claim_counts(df: &DataFrame, group_col: &str) -> Result<BTreeMap<String, ClaimCounts>> {
    let groups = strings(df, group_col)?;
    let df = with_kpis(df)?;
    let has_claim = floats(&df, HAS_CLAIM)?;

    let mut counts: BTreeMap<String, ClaimCounts> = BTreeMap::new();
    for (group, flag) in groups.into_iter().zip(has_claim) {
        let (Some(group), Some(flag)) = (group, flag) else {
            continue;
        };
        let entry = counts.entry(group).or_default();
        entry.nobs += 1;
        if flag > 0.0 {
            entry.claims += 1;
        }
    }
    Ok(counts)
}

/// Chi-square statistic, degrees of freedom and expected counts of an
/// `r x 2` table. Yates' continuity correction applies when `dof == 1`.
fn chi2_contingency(table: &[[u64; 2]]) -> Result<(f64, usize, Vec<[f64; 2]>)> {
    let total: f64 = table.iter().map(|row| (row[0] + row[1]) as f64).sum();
    let col_totals = [
        table.iter().map(|row| row[0] as f64).sum::<f64>(),
        table.iter().map(|row| row[1] as f64).sum::<f64>(),
    ];
    if col_totals.iter().any(|&c| c == 0.0) {
        return Err(insufficient(
            "chi-square test",
            "every policy has the same claim outcome",
        ));
    }

    let dof = table.len() - 1;
    let mut statistic = 0.0;
    let mut expected = Vec::with_capacity(table.len());

    for row in table {
        let row_total = (row[0] + row[1]) as f64;
        let exp = [
            row_total * col_totals[0] / total,
            row_total * col_totals[1] / total,
        ];
        for (observed, e) in row.iter().zip(exp) {
            let mut diff = *observed as f64 - e;
            if dof == 1 {
                diff = diff.signum() * (diff.abs() - 0.5).max(0.0);
            }
            statistic += diff * diff / e;
        }
        expected.push(exp);
    }

    Ok((statistic, dof, expected))
}

/// Chi-square test of independence between `group_col` and `has_claim`,
/// over groups with at least `min_count` rows.
pub fn chi2_test_frequency(
    df: &DataFrame,
    group_col: &str,
    min_count: usize,
) -> Result<ChiSquareResult> {
    let used: Vec<(String, ClaimCounts)> = claim_counts(df, group_col)?
        .into_iter()
        .filter(|(_, c)| c.nobs as usize >= min_count)
        .collect();

    if used.len() < 2 {
        return Err(insufficient(
            "chi-square test",
            format!(
                "{} '{}' groups with at least {} policies, need 2",
                used.len(),
                group_col,
                min_count
            ),
        ));
    }

    let contingency_table: Vec<[u64; 2]> = used
        .iter()
        .map(|(_, c)| [c.nobs - c.claims, c.claims])
        .collect();
    let (statistic, dof, expected) = chi2_contingency(&contingency_table)?;
    let p_value = chi_squared_sf(statistic, dof)?;

    debug!(
        "Chi-square on '{}': {:.4} with {} dof over {} groups",
        group_col,
        statistic,
        dof,
        used.len()
    );

    Ok(ChiSquareResult {
        statistic,
        p_value,
        dof,
        groups_used: used.into_iter().map(|(g, _)| g).collect(),
        contingency_table,
        expected,
    })
}

/// Two-sided z-test for equal claim frequency in `group_a` and `group_b`,
/// with the pooled proportion in the standard error.
pub fn proportion_ztest_pair(
    df: &DataFrame,
    group_col: &str,
    group_a: &str,
    group_b: &str,
) -> Result<ProportionTestResult> {
    const TEST: &str = "proportion z-test";

    if group_a == group_b {
        return Err(insufficient(TEST, "the two groups must differ"));
    }

    let counts = claim_counts(df, group_col)?;
    let (Some(a), Some(b)) = (counts.get(group_a), counts.get(group_b)) else {
        let missing: Vec<&str> = [group_a, group_b]
            .into_iter()
            .filter(|g| !counts.contains_key(*g))
            .collect();
        return Err(insufficient(
            TEST,
            format!("no '{}' rows for {}", group_col, missing.join(", ")),
        ));
    };

    let (n_a, n_b) = (a.nobs as f64, b.nobs as f64);
    let p_a = a.claims as f64 / n_a;
    let p_b = b.claims as f64 / n_b;
    let pooled = (a.claims + b.claims) as f64 / (n_a + n_b);
    let variance = pooled * (1.0 - pooled) * (1.0 / n_a + 1.0 / n_b);
    if variance <= 0.0 {
        return Err(insufficient(
            TEST,
            "claim frequency is 0 or 1 in both groups",
        ));
    }

    let statistic = (p_a - p_b) / variance.sqrt();
    let normal = Normal::new(0.0, 1.0).map_err(|e| PipelineError::Statistics(e.to_string()))?;
    let p_value = 2.0 * normal.sf(statistic.abs());

    Ok(ProportionTestResult {
        statistic,
        p_value,
        groups: [group_a.to_string(), group_b.to_string()],
        count: [a.claims, b.claims],
        nobs: [a.nobs, b.nobs],
    })
}

/// Kruskal-Wallis H statistic with the tie correction.
fn kruskal_h(samples: &[Vec<f64>]) -> Result<f64> {
    let mut pooled: Vec<(f64, usize)> = samples
        .iter()
        .enumerate()
        .flat_map(|(group, values)| values.iter().map(move |&v| (v, group)))
        .collect();
    pooled.sort_by(|x, y| x.0.total_cmp(&y.0));

    let n = pooled.len() as f64;
    let mut rank_sums = vec![0.0; samples.len()];
    let mut tie_term = 0.0;

    let mut start = 0;
    while start < pooled.len() {
        let mut end = start + 1;
        while end < pooled.len() && pooled[end].0 == pooled[start].0 {
            end += 1;
        }
        // tied values share the mean of ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &(_, group) in &pooled[start..end] {
            rank_sums[group] += rank;
        }
        let tied = (end - start) as f64;
        tie_term += tied.powi(3) - tied;
        start = end;
    }

    let correction = 1.0 - tie_term / (n.powi(3) - n);
    if correction <= 0.0 {
        return Err(insufficient("Kruskal-Wallis test", "all values are identical"));
    }

    let h: f64 = 12.0 / (n * (n + 1.0))
        * rank_sums
            .iter()
            .zip(samples)
            .map(|(r, s)| r * r / s.len() as f64)
            .sum::<f64>()
        - 3.0 * (n + 1.0);

    Ok(h / correction)
}

/// Kruskal-Wallis H-test of `numeric_col` across the groups of `group_col`
/// that have at least `min_count` non-missing values.
pub fn kruskal_test_numeric(
    df: &DataFrame,
    group_col: &str,
    numeric_col: &str,
    min_count: usize,
) -> Result<KruskalResult> {
    let groups = strings(df, group_col)?;
    let df = if df.column(numeric_col).is_err() && DERIVED_COLUMNS[1..].contains(&numeric_col) {
        with_kpis(df)?
    } else {
        Cow::Borrowed(df)
    };
    let values = floats(&df, numeric_col)?;

    let mut samples: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (group, value) in groups.into_iter().zip(values) {
        if let (Some(group), Some(value)) = (group, value)
            && value.is_finite()
        {
            samples.entry(group).or_default().push(value);
        }
    }

    let (groups_used, samples): (Vec<String>, Vec<Vec<f64>>) = samples
        .into_iter()
        .filter(|(_, s)| s.len() >= min_count.max(1))
        .unzip();

    if samples.len() < 2 {
        return Err(insufficient(
            "Kruskal-Wallis test",
            format!(
                "{} '{}' groups with at least {} '{}' values, need 2",
                samples.len(),
                group_col,
                min_count,
                numeric_col
            ),
        ));
    }

    let statistic = kruskal_h(&samples)?;
    let dof = samples.len() - 1;
    let p_value = chi_squared_sf(statistic, dof)?;

    Ok(KruskalResult {
        column: numeric_col.to_string(),
        statistic,
        p_value,
        dof,
        groups_used,
    })
}

fn format_p_value(p_value: f64) -> String {
    if p_value != 0.0 && p_value < 1e-4 {
        format!("{:.3e}", p_value)
    } else {
        format!("{:.4}", p_value)
    }
}

/// One-line reading of a p-value at significance level `alpha`.
pub fn interpret_p_value(p_value: f64, alpha: f64) -> String {
    if p_value < alpha {
        format!(
            "p = {} < {} -> Reject H0 (statistically significant)",
            format_p_value(p_value),
            alpha
        )
    } else {
        format!(
            "p = {} >= {} -> Fail to reject H0 (not statistically significant)",
            format_p_value(p_value),
            alpha
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `claims` of `n` rows in `group` have a claim.
    fn rows(group: &str, n: usize, claims: usize) -> (Vec<String>, Vec<f64>) {
        let groups = vec![group.to_string(); n];
        let has_claim = (0..n).map(|i| if i < claims { 1.0 } else { 0.0 }).collect();
        (groups, has_claim)
    }

    fn frame(parts: &[(&str, usize, usize)]) -> DataFrame {
        let mut groups = Vec::new();
        let mut has_claim = Vec::new();
        for (group, n, claims) in parts {
            let (g, h) = rows(group, *n, *claims);
            groups.extend(g);
            has_claim.extend(h);
        }
        df![
            "province" => groups,
            "has_claim" => has_claim,
        ]
        .unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_chi2_three_groups() {
        let df = frame(&[("A", 10, 2), ("B", 10, 5), ("C", 10, 8), ("D", 3, 3)]);

        let result = chi2_test_frequency(&df, "province", 5).unwrap();

        assert_eq!(result.groups_used, vec!["A", "B", "C"]);
        assert_eq!(result.contingency_table, vec![[8, 2], [5, 5], [2, 8]]);
        assert_eq!(result.expected, vec![[5.0, 5.0]; 3]);
        assert_eq!(result.dof, 2);
        assert_close(result.statistic, 7.2);
        assert_close(result.p_value, 0.027_323_722_447_292_56);
    }

    #[test]
    fn test_chi2_two_groups_uses_continuity_correction() {
        let df = frame(&[("Gauteng", 10, 2), ("Limpopo", 10, 8)]);

        let result = chi2_test_frequency(&df, "province", 1).unwrap();

        assert_eq!(result.dof, 1);
        // uncorrected this would be 7.2
        assert_close(result.statistic, 5.0);
        assert_close(result.p_value, 0.025_347_318_677_468_27);
    }

    #[test]
    fn test_chi2_needs_two_groups() {
        let df = frame(&[("A", 40, 4), ("B", 3, 1)]);

        let err = chi2_test_frequency(&df, "province", 30).unwrap_err();

        assert!(matches!(err, PipelineError::InsufficientData { .. }));
        assert_eq!(err.error_code(), "INSUFFICIENT_DATA");
    }

    #[test]
    fn test_chi2_without_any_claim() {
        let df = frame(&[("A", 5, 0), ("B", 5, 0)]);
        let err = chi2_test_frequency(&df, "province", 1).unwrap_err();
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_chi2_derives_has_claim() {
        let df = df![
            "province" => ["A", "A", "B", "B"],
            "total_premium" => [10.0, 10.0, 10.0, 10.0],
            "total_claims" => [0.0, 5.0, 5.0, 5.0],
        ]
        .unwrap();

        let result = chi2_test_frequency(&df, "province", 1).unwrap();
        assert_eq!(result.contingency_table, vec![[1, 1], [0, 2]]);
    }

    #[test]
    fn test_proportion_ztest_pair() {
        let df = frame(&[("Gauteng", 10, 2), ("Limpopo", 10, 8), ("Free State", 4, 1)]);

        let result = proportion_ztest_pair(&df, "province", "Gauteng", "Limpopo").unwrap();

        assert_eq!(result.count, [2, 8]);
        assert_eq!(result.nobs, [10, 10]);
        assert_close(result.statistic, -2.683_281_572_999_748);
        assert_close(result.p_value, 0.007_290_358_091_535_637);

        // swapping the groups flips the sign only
        let swapped = proportion_ztest_pair(&df, "province", "Limpopo", "Gauteng").unwrap();
        assert_close(swapped.statistic, 2.683_281_572_999_748);
        assert_close(swapped.p_value, result.p_value);
    }

    #[test]
    fn test_proportion_ztest_unknown_group() {
        let df = frame(&[("Gauteng", 10, 2)]);

        let err = proportion_ztest_pair(&df, "province", "Gauteng", "Mars").unwrap_err();

        assert!(err.to_string().contains("Mars"));
    }

    #[test]
    fn test_kruskal_without_ties() {
        let df = df![
            "province" => ["A", "A", "A", "B", "B", "B"],
            "margin" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        ]
        .unwrap();

        let result = kruskal_test_numeric(&df, "province", "margin", 3).unwrap();

        assert_eq!(result.dof, 1);
        assert_close(result.statistic, 3.857_142_857_142_857);
        assert_close(result.p_value, 0.049_534_613_435_626_86);
    }

    #[test]
    fn test_kruskal_with_ties() {
        let df = df![
            "province" => ["A", "A", "A", "B", "B", "B"],
            "margin" => [1.0, 1.0, 2.0, 2.0, 3.0, 3.0],
        ]
        .unwrap();

        let result = kruskal_test_numeric(&df, "province", "margin", 1).unwrap();

        assert_close(result.statistic, 10.0 / 3.0);
        assert_close(result.p_value, 0.067_889_154_861_829_21);
    }

    #[test]
    fn test_kruskal_skips_missing_and_small_groups() {
        let df = df![
            "province" => [Some("A"), Some("A"), Some("B"), Some("B"), Some("C"), None],
            "margin" => [Some(1.0), None, Some(2.0), Some(3.0), Some(9.0), Some(4.0)],
        ]
        .unwrap();

        let err = kruskal_test_numeric(&df, "province", "margin", 2).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData { .. }));

        let err = kruskal_test_numeric(&df, "province", "no_such_column", 1).unwrap_err();
        assert!(matches!(err, PipelineError::ColumnNotFound(ref c) if c == "no_such_column"));
    }

    #[test]
    fn test_kruskal_on_derived_kpi() {
        let df = df![
            "province" => ["A", "A", "B", "B"],
            "total_premium" => [10.0, 10.0, 10.0, 10.0],
            "total_claims" => [1.0, 2.0, 8.0, 9.0],
        ]
        .unwrap();

        let result = kruskal_test_numeric(&df, "province", "margin", 2).unwrap();
        assert_eq!(result.groups_used, vec!["A", "B"]);
        assert!(result.statistic > 0.0);
    }

    #[test]
    fn test_interpret_p_value() {
        assert_eq!(
            interpret_p_value(0.007_290_358, DEFAULT_ALPHA),
            "p = 0.0073 < 0.05 -> Reject H0 (statistically significant)"
        );
        assert_eq!(
            interpret_p_value(0.5, DEFAULT_ALPHA),
            "p = 0.5000 >= 0.05 -> Fail to reject H0 (not statistically significant)"
        );
        assert_eq!(
            interpret_p_value(0.000_012, 0.01),
            "p = 1.200e-5 < 0.01 -> Reject H0 (statistically significant)"
        );
    }
}
