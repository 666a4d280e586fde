//! Common types for synthcheck.
//!
//! Defines tiers, per-test results, the aggregate comparison result, and
//! the YAML comparison-spec format.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Ordinal confidence bucket. `Tier1` is the best match, `Tier4` the worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "TIER_1")]
    Tier1,
    #[serde(rename = "TIER_2")]
    Tier2,
    #[serde(rename = "TIER_3")]
    Tier3,
    #[serde(rename = "TIER_4")]
    Tier4,
}

impl Tier {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tier1 => "TIER_1",
            Self::Tier2 => "TIER_2",
            Self::Tier3 => "TIER_3",
            Self::Tier4 => "TIER_4",
        }
    }

    /// Overall tier derived from the averaged match score alone.
    #[must_use]
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy > 0.85 {
            Self::Tier1
        } else if accuracy > 0.75 {
            Self::Tier2
        } else if accuracy > 0.50 {
            Self::Tier3
        } else {
            Self::Tier4
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of one statistical test in the battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestName {
    ChiSquare,
    KsTest,
    JensenShannon,
    MannWhitney,
    TTest,
    AndersonDarling,
    WassersteinDistance,
    Correlation,
    ErrorMetrics,
    DistributionSummary,
    KullbackLeibler,
    CramerVonMises,
    DataValidation,
}

impl TestName {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChiSquare => "chi_square",
            Self::KsTest => "ks_test",
            Self::JensenShannon => "jensen_shannon",
            Self::MannWhitney => "mann_whitney",
            Self::TTest => "t_test",
            Self::AndersonDarling => "anderson_darling",
            Self::WassersteinDistance => "wasserstein_distance",
            Self::Correlation => "correlation",
            Self::ErrorMetrics => "error_metrics",
            Self::DistributionSummary => "distribution_summary",
            Self::KullbackLeibler => "kullback_leibler",
            Self::CramerVonMises => "cramer_von_mises",
            Self::DataValidation => "data_validation",
        }
    }
}

impl fmt::Display for TestName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason a statistical test could not produce a score.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestFailure {
    #[error("insufficient data (need at least {0} samples)")]
    InsufficientData(usize),
    #[error("cannot normalize: one or both sequences sum to zero")]
    ZeroSum,
    #[error("degenerate input: {0}")]
    Degenerate(&'static str),
    #[error("statistic is not finite")]
    NonFinite,
}

/// Test-specific statistic fields. A `None` value serializes as `null`.
pub type Metrics = BTreeMap<&'static str, Option<f64>>;

/// A test that ran to completion and produced a tiered verdict.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredTest {
    pub test: TestName,
    #[serde(flatten)]
    pub metrics: Metrics,
    pub tier: Tier,
    pub match_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<&'static str>,
}

/// A test that could not run.
#[derive(Debug, Clone, Serialize)]
pub struct FailedTest {
    pub test: TestName,
    pub error: String,
}

/// Output of one statistical test: a score or an error, never both.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TestResult {
    Scored(ScoredTest),
    Failed(FailedTest),
}

impl TestResult {
    #[must_use]
    pub fn failed(test: TestName, failure: &TestFailure) -> Self {
        Self::Failed(FailedTest {
            test,
            error: failure.to_string(),
        })
    }

    #[must_use]
    pub const fn is_scored(&self) -> bool {
        matches!(self, Self::Scored(_))
    }

    #[must_use]
    pub const fn name(&self) -> TestName {
        match self {
            Self::Scored(scored) => scored.test,
            Self::Failed(failed) => failed.test,
        }
    }

    #[must_use]
    pub const fn tier(&self) -> Option<Tier> {
        match self {
            Self::Scored(scored) => Some(scored.tier),
            Self::Failed(_) => None,
        }
    }

    #[must_use]
    pub const fn match_score(&self) -> Option<f64> {
        match self {
            Self::Scored(scored) => Some(scored.match_score),
            Self::Failed(_) => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Scored(_) => None,
            Self::Failed(failed) => Some(&failed.error),
        }
    }
}

/// Per-tier tally of successful tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierDistribution {
    #[serde(rename = "TIER_1")]
    pub tier_1: usize,
    #[serde(rename = "TIER_2")]
    pub tier_2: usize,
    #[serde(rename = "TIER_3")]
    pub tier_3: usize,
    #[serde(rename = "TIER_4")]
    pub tier_4: usize,
}

impl TierDistribution {
    #[must_use]
    pub fn tally<I: IntoIterator<Item = Tier>>(tiers: I) -> Self {
        let mut dist = Self::default();
        for tier in tiers {
            match tier {
                Tier::Tier1 => dist.tier_1 += 1,
                Tier::Tier2 => dist.tier_2 += 1,
                Tier::Tier3 => dist.tier_3 += 1,
                Tier::Tier4 => dist.tier_4 += 1,
            }
        }
        dist
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.tier_1 + self.tier_2 + self.tier_3 + self.tier_4
    }
}

/// Headline counts and ratios over the whole battery.
#[derive(Debug, Clone, Serialize)]
pub struct TestSummary {
    pub total_tests: usize,
    pub successful_tests: usize,
    pub failed_tests: usize,
    pub tier_1_count: usize,
    pub tier_2_count: usize,
    pub tier_3_count: usize,
    pub tier_4_count: usize,
    pub average_match_score: f64,
    pub tier_1_ratio: f64,
    pub tier_2_ratio: f64,
}

/// Aggregate output of `ComparisonEngine::compare_distributions`.
///
/// On the empty-input short-circuit (and when every test fails) only
/// `synthetic_size`, `real_size`, `tests`, and `overall_tier` are present.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResult {
    pub synthetic_size: usize,
    pub real_size: usize,
    pub tests: Vec<TestResult>,
    pub overall_tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_distribution: Option<TierDistribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_summary: Option<TestSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
}

impl ComparisonResult {
    /// Serializes the result to a JSON tree with every non-finite number
    /// replaced by `null`.
    #[must_use]
    pub fn to_sanitized_value(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        crate::stats::sanitize_json(&mut value);
        value
    }
}

/// One named comparison in a spec file.
///
/// Samples come either inline (`synthetic_values`/`real_values`) or from
/// referenced files (`synthetic_file`/`real_file`), resolved relative to
/// the spec file's directory.
#[derive(Debug, Clone, Deserialize)]
pub struct ComparisonSpec {
    /// Comparison name (populated from the map key).
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub synthetic_values: Vec<f64>,
    #[serde(default)]
    pub real_values: Vec<f64>,
    pub synthetic_file: Option<PathBuf>,
    pub real_file: Option<PathBuf>,
}

/// Comparison spec file structure.
#[derive(Debug, Deserialize)]
pub struct ComparisonSpecFile {
    #[serde(default)]
    pub comparisons: BTreeMap<String, ComparisonSpec>,
}

/// Loads named comparison specs from YAML content.
pub fn load_comparison_specs(content: &str) -> anyhow::Result<Vec<ComparisonSpec>> {
    let file: ComparisonSpecFile = serde_yaml_ng::from_str(content)?;
    let mut specs = Vec::new();

    for (name, mut spec) in file.comparisons {
        spec.name = name;
        specs.push(spec);
    }

    Ok(specs)
}

/// Parses samples from a JSON array or delimited text content.
pub fn parse_samples(content: &str) -> anyhow::Result<Vec<f64>> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        let values: Vec<f64> =
            serde_json::from_str(trimmed).context("failed to parse JSON sample array")?;
        return Ok(values);
    }
    trimmed
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f64>()
                .with_context(|| format!("invalid number in sample file: {token}"))
        })
        .collect()
}

/// Reads and parses a sample file.
pub fn load_samples(path: &Path) -> anyhow::Result<Vec<f64>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read sample file: {}", path.display()))?;
    parse_samples(&content).with_context(|| format!("in sample file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tier_serializes_as_wire_name() {
        assert_eq!(
            serde_json::to_value(Tier::Tier1).unwrap(),
            serde_json::json!("TIER_1")
        );
        assert_eq!(Tier::Tier4.to_string(), "TIER_4");
    }

    #[test]
    fn tier_from_accuracy_thresholds() {
        assert_eq!(Tier::from_accuracy(0.86), Tier::Tier1);
        assert_eq!(Tier::from_accuracy(0.85), Tier::Tier2);
        assert_eq!(Tier::from_accuracy(0.76), Tier::Tier2);
        assert_eq!(Tier::from_accuracy(0.75), Tier::Tier3);
        assert_eq!(Tier::from_accuracy(0.51), Tier::Tier3);
        assert_eq!(Tier::from_accuracy(0.50), Tier::Tier4);
    }

    #[test]
    fn test_name_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(TestName::KsTest).unwrap(),
            serde_json::json!("ks_test")
        );
        assert_eq!(TestName::CramerVonMises.as_str(), "cramer_von_mises");
        assert_eq!(TestName::TTest.as_str(), "t_test");
    }

    #[test]
    fn scored_result_serializes_flat() {
        let mut metrics = Metrics::new();
        metrics.insert("ks_statistic", Some(0.05));
        metrics.insert("p_value", Some(0.9));
        let result = TestResult::Scored(ScoredTest {
            test: TestName::KsTest,
            metrics,
            tier: Tier::Tier1,
            match_score: 0.95,
            interpretation: None,
        });
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["test"], serde_json::json!("ks_test"));
        assert_eq!(value["ks_statistic"], serde_json::json!(0.05));
        assert_eq!(value["tier"], serde_json::json!("TIER_1"));
        assert!(value.get("error").is_none());
        assert!(value.get("interpretation").is_none());
    }

    #[test]
    fn failed_result_serializes_error_only() {
        let result = TestResult::failed(TestName::JensenShannon, &TestFailure::ZeroSum);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["test"], serde_json::json!("jensen_shannon"));
        assert!(value["error"].as_str().unwrap().contains("sum to zero"));
        assert!(value.get("tier").is_none());
        assert!(value.get("match_score").is_none());
    }

    #[test]
    fn null_metric_serializes_as_null() {
        let mut metrics = Metrics::new();
        metrics.insert("statistic", Some(1.2));
        metrics.insert("p_value", None);
        let result = TestResult::Scored(ScoredTest {
            test: TestName::CramerVonMises,
            metrics,
            tier: Tier::Tier1,
            match_score: 0.9,
            interpretation: None,
        });
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["p_value"], serde_json::Value::Null);
    }

    #[test]
    fn tier_distribution_tally_and_total() {
        let dist = TierDistribution::tally([Tier::Tier1, Tier::Tier1, Tier::Tier3]);
        assert_eq!(dist.tier_1, 2);
        assert_eq!(dist.tier_2, 0);
        assert_eq!(dist.tier_3, 1);
        assert_eq!(dist.total(), 3);
    }

    #[test]
    fn parse_comparison_spec_yaml() {
        let yaml = r#"
comparisons:
  age_question:
    synthetic_values: [1, 2, 3]
    real_values: [1, 2, 4]
  from_files:
    synthetic_file: data/syn.json
    real_file: data/real.json
"#;
        let specs = load_comparison_specs(yaml).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "age_question");
        assert_eq!(specs[0].synthetic_values, vec![1.0, 2.0, 3.0]);
        assert_eq!(
            specs[1].synthetic_file,
            Some(PathBuf::from("data/syn.json"))
        );
    }

    #[test]
    fn parse_samples_json_and_text() {
        assert_eq!(
            parse_samples("[1, 2.5, 3]").unwrap(),
            vec![1.0, 2.5, 3.0]
        );
        assert_eq!(
            parse_samples("1, 2.5\n3 4").unwrap(),
            vec![1.0, 2.5, 3.0, 4.0]
        );
        assert_eq!(parse_samples("   ").unwrap(), Vec::<f64>::new());
        assert!(parse_samples("1, two, 3").is_err());
    }

    #[test]
    fn load_samples_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.txt");
        std::fs::write(&path, "5 6 7").unwrap();
        assert_eq!(load_samples(&path).unwrap(), vec![5.0, 6.0, 7.0]);
        assert!(load_samples(&dir.path().join("missing.txt")).is_err());
    }
}
