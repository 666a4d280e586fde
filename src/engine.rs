//! Comparison engine: fixed-order execution of the statistical battery
//! and aggregation into an overall tiered verdict.

#![allow(clippy::cast_precision_loss)]

use crate::battery;
use crate::stats::{clamp_unit, safe_float};
use crate::types::{
    ComparisonResult, FailedTest, TestName, TestResult, TestSummary, Tier, TierDistribution,
};

/// Stateless engine running the full battery over two sample sets.
///
/// Holds no state, so it is re-entrant: results depend only on the
/// inputs, and concurrent callers may share one instance or build one
/// per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComparisonEngine;

impl ComparisonEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Runs all twelve statistical tests in fixed order and merges them
    /// into one overall judgment.
    ///
    /// Total for any pair of inputs: per-test failures surface as error
    /// entries and thin out the aggregate, and empty input short-circuits
    /// to a single `data_validation` error with `TIER_4`.
    #[must_use]
    pub fn compare_distributions(&self, synthetic: &[f64], real: &[f64]) -> ComparisonResult {
        if synthetic.is_empty() || real.is_empty() {
            return ComparisonResult {
                synthetic_size: synthetic.len(),
                real_size: real.len(),
                tests: vec![TestResult::Failed(FailedTest {
                    test: TestName::DataValidation,
                    error: "one or both datasets are empty".to_string(),
                })],
                overall_tier: Tier::Tier4,
                overall_accuracy: None,
                tier_distribution: None,
                test_summary: None,
                recommendations: Vec::new(),
            };
        }

        // fixed order; the tests vector is part of the observable contract
        let tests = vec![
            battery::chi_square(synthetic, real),
            battery::ks_test(synthetic, real),
            battery::jensen_shannon(synthetic, real),
            battery::mann_whitney(synthetic, real),
            battery::t_test(synthetic, real),
            battery::anderson_darling(synthetic, real),
            battery::wasserstein_distance(synthetic, real),
            battery::correlation(synthetic, real),
            battery::error_metrics(synthetic, real),
            battery::distribution_summary(synthetic, real),
            battery::kullback_leibler(synthetic, real),
            battery::cramer_von_mises(synthetic, real),
        ];

        let tiers: Vec<Tier> = tests.iter().filter_map(TestResult::tier).collect();
        if tiers.is_empty() {
            tracing::warn!("every statistical test failed; reporting TIER_4 without an accuracy");
            return ComparisonResult {
                synthetic_size: synthetic.len(),
                real_size: real.len(),
                tests,
                overall_tier: Tier::Tier4,
                overall_accuracy: None,
                tier_distribution: None,
                test_summary: None,
                recommendations: Vec::new(),
            };
        }

        let scores: Vec<f64> = tests
            .iter()
            .filter_map(TestResult::match_score)
            .filter_map(safe_float)
            .map(clamp_unit)
            .collect();

        let overall_accuracy = if scores.is_empty() {
            tracing::warn!("no valid match scores; defaulting to neutral 50% accuracy");
            0.5
        } else {
            clamp_unit(scores.iter().sum::<f64>() / scores.len() as f64)
        };
        tracing::debug!(
            contributing = scores.len(),
            accuracy = overall_accuracy,
            "aggregated match scores"
        );

        let overall_tier = Tier::from_accuracy(overall_accuracy);
        let distribution = TierDistribution::tally(tiers.iter().copied());
        let successful = tiers.len();

        let summary = TestSummary {
            total_tests: tests.len(),
            successful_tests: successful,
            failed_tests: tests.len() - successful,
            tier_1_count: distribution.tier_1,
            tier_2_count: distribution.tier_2,
            tier_3_count: distribution.tier_3,
            tier_4_count: distribution.tier_4,
            average_match_score: overall_accuracy,
            tier_1_ratio: distribution.tier_1 as f64 / successful as f64,
            tier_2_ratio: distribution.tier_2 as f64 / successful as f64,
        };

        let recommendations =
            recommendations_for(overall_tier, overall_accuracy, &distribution, successful);

        ComparisonResult {
            synthetic_size: synthetic.len(),
            real_size: real.len(),
            tests,
            overall_tier,
            overall_accuracy: Some(overall_accuracy),
            tier_distribution: Some(distribution),
            test_summary: Some(summary),
            recommendations,
        }
    }
}

/// Guidance strings selected by the overall tier, templated with the
/// accuracy percentage.
fn recommendations_for(
    tier: Tier,
    accuracy: f64,
    distribution: &TierDistribution,
    successful: usize,
) -> Vec<String> {
    let pct = format!("{:.1}%", accuracy * 100.0);
    match tier {
        Tier::Tier1 => vec![format!(
            "Your synthetic data is an excellent match for the real data \
             (accuracy: {pct}). It's ready for use in critical applications!"
        )],
        Tier::Tier2 => vec![
            format!(
                "Your synthetic data shows a good match (accuracy: {pct}), but there's \
                 room for improvement. Consider refining your data generation process \
                 or reviewing specific test results for areas to enhance."
            ),
            "Focus on tests that returned 'TIER_2', 'TIER_3' or 'TIER_4' to pinpoint \
             specific discrepancies."
                .to_string(),
        ],
        Tier::Tier3 => vec![
            format!(
                "Your synthetic data needs improvement to match the real data \
                 (accuracy: {pct}). Review the detailed test results to identify \
                 discrepancies and adjust your data generation strategy."
            ),
            "Pay close attention to tests with 'TIER_3' or 'TIER_4' status and \
             consider generating more diverse or representative synthetic samples."
                .to_string(),
        ],
        Tier::Tier4 => vec![
            format!(
                "Your synthetic data needs significant improvement (accuracy: {pct}). \
                 Review the detailed test results to identify major discrepancies and \
                 adjust your data generation strategy."
            ),
            format!(
                "Focus on tests with 'TIER_4' status ({} out of {successful} tests) and \
                 consider generating more diverse or representative synthetic samples.",
                distribution.tier_4
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SYNTHETIC: [f64; 10] = [42.0, 33.0, 18.0, 7.0, 25.0, 31.0, 22.0, 15.0, 28.0, 19.0];
    const REAL: [f64; 10] = [40.0, 35.0, 20.0, 5.0, 27.0, 29.0, 24.0, 17.0, 26.0, 21.0];

    #[test]
    fn empty_input_short_circuits_to_tier_4() {
        let engine = ComparisonEngine::new();
        let result = engine.compare_distributions(&[], &[1.0, 2.0, 3.0]);

        assert_eq!(result.synthetic_size, 0);
        assert_eq!(result.real_size, 3);
        assert_eq!(result.tests.len(), 1);
        assert_eq!(result.tests[0].name(), TestName::DataValidation);
        assert!(result.tests[0].error().unwrap().contains("empty"));
        assert_eq!(result.overall_tier, Tier::Tier4);
        assert_eq!(result.overall_accuracy, None);
        assert!(result.tier_distribution.is_none());
        assert!(result.recommendations.is_empty());

        let value = result.to_sanitized_value();
        assert!(value.get("overall_accuracy").is_none());
        assert_eq!(value["overall_tier"], serde_json::json!("TIER_4"));
    }

    #[test]
    fn close_samples_score_all_twelve_tests() {
        let engine = ComparisonEngine::new();
        let result = engine.compare_distributions(&SYNTHETIC, &REAL);

        assert_eq!(result.tests.len(), 12);
        for test in &result.tests {
            assert!(
                test.error().is_none(),
                "{} unexpectedly failed: {:?}",
                test.name(),
                test.error()
            );
        }

        let accuracy = result.overall_accuracy.unwrap();
        assert!(accuracy > 0.0 && accuracy <= 1.0);
        assert!(
            matches!(result.overall_tier, Tier::Tier1 | Tier::Tier2),
            "close sequences should land in a top tier, got {}",
            result.overall_tier
        );
    }

    #[test]
    fn tests_run_in_fixed_order() {
        let engine = ComparisonEngine::new();
        let result = engine.compare_distributions(&SYNTHETIC, &REAL);
        let names: Vec<TestName> = result.tests.iter().map(TestResult::name).collect();
        assert_eq!(
            names,
            vec![
                TestName::ChiSquare,
                TestName::KsTest,
                TestName::JensenShannon,
                TestName::MannWhitney,
                TestName::TTest,
                TestName::AndersonDarling,
                TestName::WassersteinDistance,
                TestName::Correlation,
                TestName::ErrorMetrics,
                TestName::DistributionSummary,
                TestName::KullbackLeibler,
                TestName::CramerVonMises,
            ]
        );
    }

    #[test]
    fn self_comparison_is_tier_1_everywhere() {
        let engine = ComparisonEngine::new();
        let result = engine.compare_distributions(&SYNTHETIC, &SYNTHETIC);

        for test in &result.tests {
            assert_eq!(
                test.tier(),
                Some(Tier::Tier1),
                "{} should be TIER_1 against itself",
                test.name()
            );
        }
        assert_eq!(result.overall_tier, Tier::Tier1);
        assert!(result.overall_accuracy.unwrap() > 0.85);
    }

    #[test]
    fn tier_distribution_counts_sum_to_successful_tests() {
        let engine = ComparisonEngine::new();
        let result = engine.compare_distributions(&SYNTHETIC, &REAL);

        let summary = result.test_summary.unwrap();
        let distribution = result.tier_distribution.unwrap();
        assert_eq!(distribution.total(), summary.successful_tests);
        assert_eq!(
            summary.successful_tests + summary.failed_tests,
            summary.total_tests
        );
        assert_eq!(summary.total_tests, 12);
    }

    #[test]
    fn identical_inputs_give_identical_output() {
        let engine = ComparisonEngine::new();
        let first = engine.compare_distributions(&SYNTHETIC, &REAL);
        let second = engine.compare_distributions(&SYNTHETIC, &REAL);
        assert_eq!(first.to_sanitized_value(), second.to_sanitized_value());
    }

    #[test]
    fn smaller_perturbation_scores_higher() {
        let engine = ComparisonEngine::new();
        let near: Vec<f64> = REAL
            .iter()
            .enumerate()
            .map(|(i, v)| v + 0.3 * if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let far: Vec<f64> = REAL
            .iter()
            .enumerate()
            .map(|(i, v)| v + 9.0 * if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();

        let near_accuracy = engine
            .compare_distributions(&near, &REAL)
            .overall_accuracy
            .unwrap();
        let far_accuracy = engine
            .compare_distributions(&far, &REAL)
            .overall_accuracy
            .unwrap();
        assert!(
            near_accuracy > far_accuracy,
            "near {near_accuracy} should beat far {far_accuracy}"
        );
    }

    #[test]
    fn accuracy_drives_overall_tier_not_per_test_tiers() {
        // degenerate pairing: strongly shifted but perfectly correlated
        let shifted: Vec<f64> = REAL.iter().map(|v| v + 60.0).collect();
        let engine = ComparisonEngine::new();
        let result = engine.compare_distributions(&shifted, &REAL);

        let summary = result.test_summary.unwrap();
        // whatever the per-test tier split, the overall tier must be the
        // pure accuracy bucketing
        assert_eq!(
            result.overall_tier,
            Tier::from_accuracy(summary.average_match_score)
        );
    }

    #[test]
    fn recommendations_mention_accuracy_percentage() {
        let engine = ComparisonEngine::new();
        let result = engine.compare_distributions(&SYNTHETIC, &REAL);
        let accuracy = result.overall_accuracy.unwrap();
        let pct = format!("{:.1}%", accuracy * 100.0);
        assert!(!result.recommendations.is_empty());
        assert!(result.recommendations[0].contains(&pct));
    }

    #[test]
    fn sanitized_value_has_twelve_test_entries() {
        let engine = ComparisonEngine::new();
        let value = engine
            .compare_distributions(&SYNTHETIC, &REAL)
            .to_sanitized_value();
        assert_eq!(value["tests"].as_array().unwrap().len(), 12);
        assert_eq!(value["synthetic_size"], serde_json::json!(10));
        // cramer_von_mises carries an explicit null p-value
        assert_eq!(value["tests"][11]["p_value"], serde_json::Value::Null);
    }
}
