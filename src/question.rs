//! Question-level comparison of response breakdowns.
//!
//! Besides the whole-distribution battery, each survey question can be
//! scored on its own: discrete option counts are compared by absolute
//! count differences, and questions carrying only summary statistics
//! are compared on normalized mean/std differences.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::stats::clamp_unit;
use crate::types::Tier;

const EPSILON: f64 = 1e-9;

/// Reserved keys that carry summary statistics rather than options.
const STAT_KEYS: [&str; 4] = ["MEAN", "MEDIAN", "STD", "TOTAL_RESPONSES"];

/// Per-question response breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionBreakdown {
    /// Summary statistics for free-numeric questions.
    SummaryStats {
        mean: f64,
        std: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        median: Option<f64>,
    },
    /// Discrete option → response count.
    OptionCounts(BTreeMap<String, f64>),
}

impl QuestionBreakdown {
    /// Builds a breakdown from a raw response-count map, routing the
    /// reserved statistic keys: when any non-statistic option remains the
    /// breakdown is categorical, otherwise the statistics themselves are
    /// compared.
    #[must_use]
    pub fn from_response_counts(counts: &BTreeMap<String, f64>) -> Self {
        let options: BTreeMap<String, f64> = counts
            .iter()
            .filter(|(key, _)| !STAT_KEYS.iter().any(|stat| key.eq_ignore_ascii_case(stat)))
            .map(|(key, value)| (key.clone(), *value))
            .collect();

        if options.is_empty() {
            let stat = |name: &str| {
                counts
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| *value)
            };
            Self::SummaryStats {
                mean: stat("MEAN").unwrap_or(0.0),
                std: stat("STD").unwrap_or(0.0),
                median: stat("MEDIAN"),
            }
        } else {
            Self::OptionCounts(options)
        }
    }
}

/// Why two breakdowns could not be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuestionCompareError {
    #[error("cannot compare option counts against summary statistics")]
    MixedBreakdowns,
}

/// Per-question verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuestionComparison {
    pub match_score: f64,
    pub tier: Tier,
}

/// Scores how closely a synthetic question breakdown matches the real one.
pub fn compare_question(
    synthetic: &QuestionBreakdown,
    real: &QuestionBreakdown,
) -> Result<QuestionComparison, QuestionCompareError> {
    let raw = match (synthetic, real) {
        (QuestionBreakdown::OptionCounts(syn), QuestionBreakdown::OptionCounts(rl)) => {
            counts_match_score(syn, rl)
        }
        (
            QuestionBreakdown::SummaryStats {
                mean: syn_mean,
                std: syn_std,
                ..
            },
            QuestionBreakdown::SummaryStats {
                mean: real_mean,
                std: real_std,
                ..
            },
        ) => stats_match_score(*syn_mean, *syn_std, *real_mean, *real_std),
        _ => return Err(QuestionCompareError::MixedBreakdowns),
    };

    let match_score = if raw.is_nan() { 0.0 } else { clamp_unit(raw) };
    Ok(QuestionComparison {
        match_score,
        tier: question_tier(match_score),
    })
}

fn question_tier(score: f64) -> Tier {
    if score >= 0.95 {
        Tier::Tier1
    } else if score >= 0.85 {
        Tier::Tier2
    } else {
        Tier::Tier3
    }
}

/// `1 − Σ|syn − real| / (Σ(syn + real) + ε)` over the union of options;
/// options absent on one side count zero. Zero total scores 0.
fn counts_match_score(synthetic: &BTreeMap<String, f64>, real: &BTreeMap<String, f64>) -> f64 {
    let options: BTreeSet<&String> = synthetic.keys().chain(real.keys()).collect();

    let mut total_diff = 0.0;
    let mut total_sum = 0.0;
    for option in options {
        let syn_count = synthetic.get(option).copied().unwrap_or(0.0);
        let real_count = real.get(option).copied().unwrap_or(0.0);
        total_diff += (syn_count - real_count).abs();
        total_sum += syn_count + real_count;
    }

    if total_sum > 0.0 {
        1.0 - total_diff / (total_sum + EPSILON)
    } else {
        0.0
    }
}

/// Normalized mean/std differences against the average magnitude of each
/// pair; a term is 0 when its average magnitude is 0.
fn stats_match_score(syn_mean: f64, syn_std: f64, real_mean: f64, real_std: f64) -> f64 {
    let mean_diff = (syn_mean - real_mean).abs();
    let std_diff = (syn_std - real_std).abs();

    let avg_mean = (syn_mean.abs() + real_mean.abs()) / 2.0;
    let avg_std = (syn_std.abs() + real_std.abs()) / 2.0;

    let norm_mean_diff = if avg_mean > 0.0 {
        mean_diff / (avg_mean + EPSILON)
    } else {
        0.0
    };
    let norm_std_diff = if avg_std > 0.0 {
        std_diff / (avg_std + EPSILON)
    } else {
        0.0
    };

    let avg_error = (norm_mean_diff + norm_std_diff) / 2.0;
    (1.0 - avg_error.min(1.0)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn counts(entries: &[(&str, f64)]) -> QuestionBreakdown {
        QuestionBreakdown::OptionCounts(
            entries
                .iter()
                .map(|(k, v)| ((*k).to_string(), *v))
                .collect(),
        )
    }

    #[test]
    fn identical_counts_score_one() {
        let breakdown = counts(&[("Yes", 40.0), ("No", 60.0)]);
        let result = compare_question(&breakdown, &breakdown).unwrap();
        assert!((result.match_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.tier, Tier::Tier1);
    }

    #[test]
    fn close_counts_score_high() {
        let synthetic = counts(&[("1", 10.0), ("2", 20.0), ("3", 30.0)]);
        let real = counts(&[("1", 11.0), ("2", 19.0), ("3", 30.0)]);
        let result = compare_question(&synthetic, &real).unwrap();
        // diff 2 over total 120
        assert!((result.match_score - (1.0 - 2.0 / (120.0 + EPSILON))).abs() < 1e-12);
        assert_eq!(result.tier, Tier::Tier1);
    }

    #[test]
    fn missing_options_count_zero() {
        let synthetic = counts(&[("Yes", 50.0)]);
        let real = counts(&[("Yes", 50.0), ("No", 50.0)]);
        let result = compare_question(&synthetic, &real).unwrap();
        // diff 50 over total 150
        assert!((result.match_score - (1.0 - 50.0 / (150.0 + EPSILON))).abs() < 1e-12);
        assert_eq!(result.tier, Tier::Tier3);
    }

    #[test]
    fn zero_total_scores_zero() {
        let empty = counts(&[("Yes", 0.0), ("No", 0.0)]);
        let result = compare_question(&empty, &empty).unwrap();
        assert!(result.match_score.abs() < f64::EPSILON);
        assert_eq!(result.tier, Tier::Tier3);
    }

    #[test]
    fn identical_summary_stats_score_one() {
        let breakdown = QuestionBreakdown::SummaryStats {
            mean: 7.2,
            std: 1.4,
            median: Some(7.0),
        };
        let result = compare_question(&breakdown, &breakdown).unwrap();
        assert!((result.match_score - 1.0).abs() < 1e-9);
        assert_eq!(result.tier, Tier::Tier1);
    }

    #[test]
    fn diverging_summary_stats_lose_score() {
        let synthetic = QuestionBreakdown::SummaryStats {
            mean: 10.0,
            std: 2.0,
            median: None,
        };
        let real = QuestionBreakdown::SummaryStats {
            mean: 5.0,
            std: 2.0,
            median: None,
        };
        // norm mean diff = 5/7.5, std term 0, avg error = 1/3
        let result = compare_question(&synthetic, &real).unwrap();
        assert!((result.match_score - (1.0 - 5.0 / (7.5 + EPSILON) / 2.0)).abs() < 1e-9);
        assert_eq!(result.tier, Tier::Tier3);
    }

    #[test]
    fn zero_magnitude_stats_score_clean() {
        let zero = QuestionBreakdown::SummaryStats {
            mean: 0.0,
            std: 0.0,
            median: None,
        };
        let result = compare_question(&zero, &zero).unwrap();
        assert!((result.match_score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mixed_breakdowns_are_rejected() {
        let cats = counts(&[("Yes", 10.0)]);
        let stats = QuestionBreakdown::SummaryStats {
            mean: 1.0,
            std: 0.5,
            median: None,
        };
        assert_eq!(
            compare_question(&cats, &stats),
            Err(QuestionCompareError::MixedBreakdowns)
        );
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(question_tier(0.95), Tier::Tier1);
        assert_eq!(question_tier(0.94), Tier::Tier2);
        assert_eq!(question_tier(0.85), Tier::Tier2);
        assert_eq!(question_tier(0.84), Tier::Tier3);
    }

    #[test]
    fn from_response_counts_filters_stat_keys() {
        let mut raw = BTreeMap::new();
        raw.insert("1".to_string(), 12.0);
        raw.insert("2".to_string(), 8.0);
        raw.insert("MEAN".to_string(), 1.4);
        raw.insert("TOTAL_RESPONSES".to_string(), 20.0);
        let breakdown = QuestionBreakdown::from_response_counts(&raw);
        let QuestionBreakdown::OptionCounts(options) = breakdown else {
            panic!("expected option counts");
        };
        assert_eq!(options.len(), 2);
        assert!(options.contains_key("1"));
    }

    #[test]
    fn from_response_counts_falls_back_to_stats() {
        let mut raw = BTreeMap::new();
        raw.insert("MEAN".to_string(), 6.5);
        raw.insert("STD".to_string(), 1.2);
        raw.insert("MEDIAN".to_string(), 7.0);
        let breakdown = QuestionBreakdown::from_response_counts(&raw);
        assert_eq!(
            breakdown,
            QuestionBreakdown::SummaryStats {
                mean: 6.5,
                std: 1.2,
                median: Some(7.0),
            }
        );
    }

    #[test]
    fn breakdown_deserializes_untagged() {
        let stats: QuestionBreakdown =
            serde_json::from_str(r#"{"mean": 3.0, "std": 1.0}"#).unwrap();
        assert!(matches!(stats, QuestionBreakdown::SummaryStats { .. }));

        let cats: QuestionBreakdown =
            serde_json::from_str(r#"{"Agree": 12, "Disagree": 8}"#).unwrap();
        assert!(matches!(cats, QuestionBreakdown::OptionCounts(_)));
    }
}
