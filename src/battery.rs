//! The statistical test battery.
//!
//! Twelve independent distributional-similarity tests. Each test is a
//! pure function over the two sample sets and returns either a scored,
//! tiered result or a typed failure. No test panics, and no failure
//! aborts the rest of the battery.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::float_cmp)]

use std::cmp::Ordering;

use crate::stats::{
    chi_squared_sf, combined_bounds, combined_range, ks_pvalue, ks_statistic, mean, median,
    midranks, normal_sf, pearson, population_std, safe_float, sample_variance, spearman,
    wasserstein_1d,
};
use crate::types::{Metrics, ScoredTest, TestFailure, TestName, TestResult, Tier};

/// Smallest probability mass used when padding and clipping vectors for
/// the KL divergence.
const KL_EPSILON: f64 = 1e-10;

fn finish(test: TestName, outcome: Result<ScoredTest, TestFailure>) -> TestResult {
    match outcome {
        Ok(scored) => TestResult::Scored(scored),
        Err(failure) => {
            tracing::debug!(test = test.as_str(), error = %failure, "statistical test failed");
            TestResult::failed(test, &failure)
        }
    }
}

/// Finite statistic for a result field, with the zero fallback the
/// original applied to every stored statistic.
fn num(value: f64) -> Option<f64> {
    Some(safe_float(value).unwrap_or(0.0))
}

fn metrics<const N: usize>(entries: [(&'static str, Option<f64>); N]) -> Metrics {
    entries.into_iter().collect()
}

/// Significance-based tiering shared by the p-value tests.
fn tier_from_p(p: f64) -> Tier {
    if p > 0.05 {
        Tier::Tier1
    } else if p > 0.01 {
        Tier::Tier2
    } else {
        Tier::Tier3
    }
}

/// Match-score tiering for the statistic-normalization fallbacks.
fn tier_from_fallback(score: f64) -> Tier {
    if score > 0.80 {
        Tier::Tier1
    } else if score > 0.60 {
        Tier::Tier2
    } else {
        Tier::Tier3
    }
}

fn sorted_copy(sample: &[f64]) -> Vec<f64> {
    let mut sorted = sample.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

// ── chi_square ──────────────────────────────────────────────────────

/// Chi-squared test over histogram counts binned into common bins.
pub fn chi_square(synthetic: &[f64], real: &[f64]) -> TestResult {
    finish(TestName::ChiSquare, chi_square_impl(synthetic, real))
}

fn chi_square_impl(synthetic: &[f64], real: &[f64]) -> Result<ScoredTest, TestFailure> {
    let (lo, hi) =
        combined_bounds(synthetic, real).ok_or(TestFailure::InsufficientData(1))?;

    let mut pooled: Vec<f64> = synthetic.iter().chain(real).copied().collect();
    pooled.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    pooled.dedup();
    let n_bins = pooled.len().clamp(2, 10);

    let syn_counts = histogram(synthetic, lo, hi, n_bins);
    let real_counts = histogram(real, lo, hi, n_bins);

    // Bins with no pooled mass carry no information and would zero the
    // expected frequencies; drop them from the contingency table.
    let cells: Vec<(f64, f64)> = syn_counts
        .iter()
        .zip(&real_counts)
        .filter(|(s, r)| **s + **r > 0.0)
        .map(|(s, r)| (*s, *r))
        .collect();
    if cells.len() < 2 {
        return Err(TestFailure::Degenerate("fewer than two informative bins"));
    }

    let row_syn: f64 = cells.iter().map(|(s, _)| s).sum();
    let row_real: f64 = cells.iter().map(|(_, r)| r).sum();
    let total = row_syn + row_real;

    let mut chi2 = 0.0;
    for (s, r) in &cells {
        let col = s + r;
        let expected_syn = row_syn * col / total;
        let expected_real = row_real * col / total;
        chi2 += (s - expected_syn).powi(2) / expected_syn
            + (r - expected_real).powi(2) / expected_real;
    }

    let dof = (cells.len() - 1) as f64;
    let p_value = chi_squared_sf(chi2, dof);

    Ok(ScoredTest {
        test: TestName::ChiSquare,
        metrics: metrics([("chi2", num(chi2)), ("p_value", num(p_value))]),
        tier: tier_from_p(p_value),
        match_score: safe_float(p_value).unwrap_or(0.0),
        interpretation: Some(
            "Compares frequency distributions between synthetic and real data. \
             Higher p-value means more similar distributions.",
        ),
    })
}

fn histogram(sample: &[f64], lo: f64, hi: f64, bins: usize) -> Vec<f64> {
    let mut counts = vec![0.0; bins];
    let width = hi - lo;
    for &v in sample {
        let idx = if width > 0.0 {
            (((v - lo) / width) * bins as f64).floor() as usize
        } else {
            0
        };
        counts[idx.min(bins - 1)] += 1.0;
    }
    counts
}

// ── ks_test ─────────────────────────────────────────────────────────

/// Two-sample Kolmogorov-Smirnov test.
pub fn ks_test(synthetic: &[f64], real: &[f64]) -> TestResult {
    finish(TestName::KsTest, ks_test_impl(synthetic, real))
}

fn ks_test_impl(synthetic: &[f64], real: &[f64]) -> Result<ScoredTest, TestFailure> {
    if synthetic.is_empty() || real.is_empty() {
        return Err(TestFailure::InsufficientData(1));
    }
    let statistic = ks_statistic(synthetic, real);
    let p_value = ks_pvalue(statistic, synthetic.len(), real.len());

    let tier = if statistic < 0.10 {
        Tier::Tier1
    } else if statistic < 0.20 {
        Tier::Tier2
    } else {
        Tier::Tier3
    };

    Ok(ScoredTest {
        test: TestName::KsTest,
        metrics: metrics([("ks_statistic", num(statistic)), ("p_value", num(p_value))]),
        tier,
        match_score: safe_float(1.0 - statistic).unwrap_or(0.0),
        interpretation: None,
    })
}

// ── jensen_shannon ──────────────────────────────────────────────────

/// Jensen-Shannon distance between the two sequences as probability
/// vectors.
pub fn jensen_shannon(synthetic: &[f64], real: &[f64]) -> TestResult {
    finish(TestName::JensenShannon, jensen_shannon_impl(synthetic, real))
}

fn jensen_shannon_impl(synthetic: &[f64], real: &[f64]) -> Result<ScoredTest, TestFailure> {
    let (p, q) = normalized_pair(synthetic, real, 0.0)?;

    let mut divergence = 0.0;
    for (&pi, &qi) in p.iter().zip(&q) {
        let mi = (pi + qi) / 2.0;
        divergence += 0.5 * rel_entr(pi, mi) + 0.5 * rel_entr(qi, mi);
    }
    // rounding can push an identical-input divergence a hair below zero
    let distance = if divergence <= 0.0 { 0.0 } else { divergence.sqrt() };
    let distance = safe_float(distance).ok_or(TestFailure::NonFinite)?;

    let tier = if distance < 0.05 {
        Tier::Tier1
    } else if distance < 0.15 {
        Tier::Tier2
    } else {
        Tier::Tier3
    };

    Ok(ScoredTest {
        test: TestName::JensenShannon,
        metrics: metrics([("divergence", num(distance))]),
        tier,
        match_score: safe_float(1.0 - distance.min(1.0)).unwrap_or(0.0),
        interpretation: Some(
            "Measures similarity between probability distributions. \
             Lower divergence means higher similarity.",
        ),
    })
}

/// L1-normalizes both sequences into probability vectors of equal length,
/// padding the shorter with `pad`.
fn normalized_pair(
    synthetic: &[f64],
    real: &[f64],
    pad: f64,
) -> Result<(Vec<f64>, Vec<f64>), TestFailure> {
    let syn_sum: f64 = synthetic.iter().sum();
    let real_sum: f64 = real.iter().sum();
    if syn_sum == 0.0 || real_sum == 0.0 {
        return Err(TestFailure::ZeroSum);
    }

    let len = synthetic.len().max(real.len());
    let p = (0..len)
        .map(|i| synthetic.get(i).map_or(pad, |v| v / syn_sum))
        .collect();
    let q = (0..len)
        .map(|i| real.get(i).map_or(pad, |v| v / real_sum))
        .collect();
    Ok((p, q))
}

/// Elementwise relative entropy with the 0·ln(0) = 0 convention.
fn rel_entr(p: f64, q: f64) -> f64 {
    if p > 0.0 && q > 0.0 {
        p * (p / q).ln()
    } else if p == 0.0 && q >= 0.0 {
        0.0
    } else {
        f64::INFINITY
    }
}

// ── mann_whitney ────────────────────────────────────────────────────

/// Two-sided Mann-Whitney U test.
pub fn mann_whitney(synthetic: &[f64], real: &[f64]) -> TestResult {
    finish(TestName::MannWhitney, mann_whitney_impl(synthetic, real))
}

fn mann_whitney_impl(synthetic: &[f64], real: &[f64]) -> Result<ScoredTest, TestFailure> {
    if synthetic.len() < 3 || real.len() < 3 {
        return Err(TestFailure::InsufficientData(3));
    }

    let n1 = synthetic.len() as f64;
    let n2 = real.len() as f64;
    let n = n1 + n2;

    let pooled: Vec<f64> = synthetic.iter().chain(real).copied().collect();
    let ranks = midranks(&pooled);
    let rank_sum: f64 = ranks[..synthetic.len()].iter().sum();
    let u1 = rank_sum - n1 * (n1 + 1.0) / 2.0;

    let tie_sum = tie_correction(&pooled);
    let sigma_sq = n1 * n2 / 12.0 * ((n + 1.0) - tie_sum / (n * (n - 1.0)));
    if sigma_sq <= 0.0 {
        return Err(TestFailure::Degenerate("all pooled values are tied"));
    }

    // normal approximation with 0.5 continuity correction
    let z = ((u1 - n1 * n2 / 2.0).abs() - 0.5).max(0.0) / sigma_sq.sqrt();
    let p_value = (2.0 * normal_sf(z)).min(1.0);

    Ok(ScoredTest {
        test: TestName::MannWhitney,
        metrics: metrics([("statistic", num(u1)), ("p_value", num(p_value))]),
        tier: tier_from_p(p_value),
        match_score: safe_float(p_value).unwrap_or(0.0),
        interpretation: Some(
            "Tests if distributions have the same median. \
             Higher p-value means similar medians.",
        ),
    })
}

/// Σ(t³ − t) over groups of tied values in the pooled sample.
fn tie_correction(pooled: &[f64]) -> f64 {
    let sorted = sorted_copy(pooled);
    let mut sum = 0.0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j + 1 < sorted.len() && sorted[j + 1] == sorted[i] {
            j += 1;
        }
        let t = (j - i + 1) as f64;
        sum += t * t * t - t;
        i = j + 1;
    }
    sum
}

// ── t_test ──────────────────────────────────────────────────────────

/// Independent two-sample t-test with pooled variance.
pub fn t_test(synthetic: &[f64], real: &[f64]) -> TestResult {
    finish(TestName::TTest, t_test_impl(synthetic, real))
}

fn t_test_impl(synthetic: &[f64], real: &[f64]) -> Result<ScoredTest, TestFailure> {
    if synthetic.len() < 2 || real.len() < 2 {
        return Err(TestFailure::InsufficientData(2));
    }

    let n1 = synthetic.len() as f64;
    let n2 = real.len() as f64;
    let pooled_var = ((n1 - 1.0) * sample_variance(synthetic)
        + (n2 - 1.0) * sample_variance(real))
        / (n1 + n2 - 2.0);
    if pooled_var <= 0.0 {
        return Err(TestFailure::Degenerate("zero variance in both sequences"));
    }

    let statistic =
        (mean(synthetic) - mean(real)) / (pooled_var * (1.0 / n1 + 1.0 / n2)).sqrt();
    let df = n1 + n2 - 2.0;
    let p_value = crate::stats::students_t_two_tailed_p(statistic, df);

    Ok(ScoredTest {
        test: TestName::TTest,
        metrics: metrics([("statistic", num(statistic)), ("p_value", num(p_value))]),
        tier: tier_from_p(p_value),
        match_score: safe_float(p_value).unwrap_or(0.0),
        interpretation: Some(
            "Tests if distributions have the same mean. \
             Higher p-value means similar means.",
        ),
    })
}

// ── anderson_darling ────────────────────────────────────────────────

/// Anderson-Darling k-sample test (k = 2, midrank variant).
pub fn anderson_darling(synthetic: &[f64], real: &[f64]) -> TestResult {
    finish(
        TestName::AndersonDarling,
        anderson_darling_impl(synthetic, real),
    )
}

fn anderson_darling_impl(synthetic: &[f64], real: &[f64]) -> Result<ScoredTest, TestFailure> {
    if synthetic.len() < 3 || real.len() < 3 {
        return Err(TestFailure::InsufficientData(3));
    }

    let (statistic, p_value) = anderson_darling_k2(synthetic, real);
    let statistic = safe_float(statistic).ok_or(TestFailure::NonFinite)?;

    let (tier, match_score) = match p_value {
        Some(p) if p > 0.0 => (tier_from_p(p), safe_float(p).unwrap_or(0.0)),
        _ => {
            // statistic-based fallback; the 5.0 divisor is an inherited
            // heuristic tuned on typical statistic magnitudes
            let norm_stat = (statistic / 5.0).min(1.0);
            let score = (1.0 - norm_stat).clamp(0.0, 1.0);
            (tier_from_fallback(score), score)
        }
    };

    Ok(ScoredTest {
        test: TestName::AndersonDarling,
        metrics: metrics([
            ("statistic", num(statistic)),
            ("p_value", p_value.and_then(safe_float)),
        ]),
        tier,
        match_score,
        interpretation: Some(
            "Tests if samples come from the same distribution. \
             Lower statistic or higher p-value means similar distributions.",
        ),
    })
}

/// Scholz-Stephens two-sample Anderson-Darling statistic (midrank
/// version) with the standardized statistic interpolated to a p-value on
/// the published critical-value grid. The p-value is clamped to
/// [0.001, 0.25]; `None` when the variance estimate degenerates.
fn anderson_darling_k2(sample1: &[f64], sample2: &[f64]) -> (f64, Option<f64>) {
    let n1 = sample1.len() as f64;
    let n2 = sample2.len() as f64;
    let n = n1 + n2;
    let n_total = sample1.len() + sample2.len();

    let pooled = sorted_copy(&sample1.iter().chain(sample2).copied().collect::<Vec<_>>());
    let mut zstar = pooled.clone();
    zstar.dedup();

    // pooled multiplicity and midrank cumulative per distinct value
    let mut multiplicity = vec![0.0; zstar.len()];
    {
        let mut idx = 0;
        for (j, &z) in zstar.iter().enumerate() {
            while idx < pooled.len() && pooled[idx] == z {
                multiplicity[j] += 1.0;
                idx += 1;
            }
        }
    }

    let mut a2 = 0.0;
    for sample in [sample1, sample2] {
        let ni = sample.len() as f64;
        let sorted = sorted_copy(sample);
        let mut idx = 0;
        let mut below = 0.0;
        let mut pooled_below = 0.0;
        let mut inner = 0.0;
        for (j, &z) in zstar.iter().enumerate() {
            let lj = multiplicity[j];
            let mut fij = 0.0;
            while idx < sorted.len() && sorted[idx] == z {
                fij += 1.0;
                idx += 1;
            }
            let mij = below + 0.5 * fij;
            below += fij;
            let bj = pooled_below + 0.5 * lj;
            pooled_below += lj;

            let denom = bj * (n - bj) - n * lj / 4.0;
            if denom > 0.0 {
                inner += lj / n * (n * mij - ni * bj).powi(2) / denom;
            }
        }
        a2 += inner / ni;
    }
    a2 *= (n - 1.0) / n;

    if n_total < 4 {
        return (a2, None);
    }

    // Scholz-Stephens variance of the statistic under H0
    let h: f64 = (1..n_total).map(|i| 1.0 / i as f64).sum();
    let cap_h = 1.0 / n1 + 1.0 / n2;
    let mut g = 0.0;
    for i in 1..=(n_total - 2) {
        for j in (i + 1)..n_total {
            g += 1.0 / (((n_total - i) * j) as f64);
        }
    }

    let k = 2.0f64;
    let a = (4.0 * g - 6.0) * (k - 1.0) + (10.0 - 6.0 * g) * cap_h;
    let b = (2.0 * g - 4.0) * k * k + 8.0 * h * k
        + (2.0 * g - 14.0 * h - 4.0) * cap_h
        - 8.0 * h
        + 4.0 * g
        - 6.0;
    let c = (6.0 * h + 2.0 * g - 2.0) * k * k + (4.0 * h - 4.0 * g + 6.0) * k
        + (2.0 * h - 6.0) * cap_h
        + 4.0 * h;
    let d = (2.0 * h + 6.0) * k * k - 4.0 * h * k;
    let sigma_sq =
        (a * n.powi(3) + b * n.powi(2) + c * n + d) / ((n - 1.0) * (n - 2.0) * (n - 3.0));
    if sigma_sq <= 0.0 {
        return (a2, None);
    }

    let m = k - 1.0;
    let standardized = (a2 - m) / sigma_sq.sqrt();
    (a2, Some(scholz_stephens_pvalue(standardized, m)))
}

fn scholz_stephens_pvalue(standardized: f64, m: f64) -> f64 {
    const B0: [f64; 7] = [0.675, 1.281, 1.645, 1.960, 2.326, 2.573, 3.085];
    const B1: [f64; 7] = [-0.245, 0.250, 0.678, 1.149, 1.822, 2.364, 3.615];
    const B2: [f64; 7] = [-0.105, -0.305, -0.362, -0.391, -0.396, -0.345, -0.154];
    const SIG: [f64; 7] = [0.25, 0.10, 0.05, 0.025, 0.01, 0.005, 0.001];

    let sqrt_m = m.sqrt();
    let mut critical = [0.0; 7];
    for i in 0..7 {
        critical[i] = B0[i] + B1[i] / sqrt_m + B2[i] / m;
    }

    if standardized < critical[0] {
        return SIG[0];
    }
    if standardized > critical[6] {
        return SIG[6];
    }

    let log_sig: Vec<f64> = SIG.iter().map(|s| s.ln()).collect();
    let (c0, c1, c2) = quadratic_fit(&critical, &log_sig);
    (c0 + c1 * standardized + c2 * standardized * standardized)
        .exp()
        .clamp(0.001, 0.25)
}

/// Least-squares fit of y = c0 + c1·x + c2·x² via the normal equations.
fn quadratic_fit(xs: &[f64], ys: &[f64]) -> (f64, f64, f64) {
    let n = xs.len() as f64;
    let (mut s1, mut s2, mut s3, mut s4) = (0.0, 0.0, 0.0, 0.0);
    let (mut t0, mut t1, mut t2) = (0.0, 0.0, 0.0);
    for (&x, &y) in xs.iter().zip(ys) {
        let x2 = x * x;
        s1 += x;
        s2 += x2;
        s3 += x2 * x;
        s4 += x2 * x2;
        t0 += y;
        t1 += x * y;
        t2 += x2 * y;
    }

    let det = n * (s2 * s4 - s3 * s3) - s1 * (s1 * s4 - s3 * s2) + s2 * (s1 * s3 - s2 * s2);
    if det.abs() < 1e-12 {
        return (0.0, 0.0, 0.0);
    }
    let det0 = t0 * (s2 * s4 - s3 * s3) - s1 * (t1 * s4 - s3 * t2) + s2 * (t1 * s3 - s2 * t2);
    let det1 = n * (t1 * s4 - t2 * s3) - t0 * (s1 * s4 - s3 * s2) + s2 * (s1 * t2 - s2 * t1);
    let det2 = n * (s2 * t2 - s3 * t1) - s1 * (s1 * t2 - t1 * s2) + t0 * (s1 * s3 - s2 * s2);
    (det0 / det, det1 / det, det2 / det)
}

// ── wasserstein_distance ────────────────────────────────────────────

/// Earth-mover distance normalized by the combined data range.
pub fn wasserstein_distance(synthetic: &[f64], real: &[f64]) -> TestResult {
    finish(
        TestName::WassersteinDistance,
        wasserstein_impl(synthetic, real),
    )
}

fn wasserstein_impl(synthetic: &[f64], real: &[f64]) -> Result<ScoredTest, TestFailure> {
    if synthetic.is_empty() || real.is_empty() {
        return Err(TestFailure::InsufficientData(1));
    }

    let distance = wasserstein_1d(synthetic, real);
    let range = combined_range(synthetic, real);
    let normalized = if range > 0.0 { distance / range } else { distance };
    let normalized = safe_float(normalized).unwrap_or(0.0);

    let tier = if normalized < 0.10 {
        Tier::Tier1
    } else if normalized < 0.25 {
        Tier::Tier2
    } else {
        Tier::Tier3
    };

    Ok(ScoredTest {
        test: TestName::WassersteinDistance,
        metrics: metrics([
            ("distance", num(distance)),
            ("normalized_distance", num(normalized)),
        ]),
        tier,
        match_score: safe_float(1.0 - normalized.min(1.0)).unwrap_or(0.0),
        interpretation: Some("Measures minimum cost to transform one distribution to another"),
    })
}

// ── correlation ─────────────────────────────────────────────────────

/// Pearson and Spearman correlation over length-aligned sequences.
///
/// Sequences of unequal length are truncated to the shorter one; the
/// tail of the longer sequence is dropped.
pub fn correlation(synthetic: &[f64], real: &[f64]) -> TestResult {
    finish(TestName::Correlation, correlation_impl(synthetic, real))
}

fn correlation_impl(synthetic: &[f64], real: &[f64]) -> Result<ScoredTest, TestFailure> {
    let min_len = synthetic.len().min(real.len());
    if min_len < 3 {
        return Err(TestFailure::InsufficientData(3));
    }
    let synthetic = &synthetic[..min_len];
    let real = &real[..min_len];

    let (pearson_r, pearson_p) = pearson(synthetic, real)
        .ok_or(TestFailure::Degenerate("zero variance in one or both sequences"))?;
    let (spearman_r, spearman_p) = spearman(synthetic, real)
        .ok_or(TestFailure::Degenerate("zero variance in one or both sequences"))?;

    let average = (pearson_r.abs() + spearman_r.abs()) / 2.0;
    let match_score = safe_float(average).unwrap_or(0.0);

    let tier = if average > 0.95 {
        Tier::Tier1
    } else if average > 0.85 {
        Tier::Tier2
    } else {
        Tier::Tier3
    };

    Ok(ScoredTest {
        test: TestName::Correlation,
        metrics: metrics([
            ("pearson_r", num(pearson_r)),
            ("pearson_p", num(pearson_p)),
            ("spearman_r", num(spearman_r)),
            ("spearman_p", num(spearman_p)),
            ("average_correlation", Some(match_score)),
        ]),
        tier,
        match_score,
        interpretation: Some("Measures linear (Pearson) and monotonic (Spearman) relationships"),
    })
}

// ── error_metrics ───────────────────────────────────────────────────

/// MAE and RMSE over length-aligned sequences, range-normalized.
pub fn error_metrics(synthetic: &[f64], real: &[f64]) -> TestResult {
    finish(TestName::ErrorMetrics, error_metrics_impl(synthetic, real))
}

fn error_metrics_impl(synthetic: &[f64], real: &[f64]) -> Result<ScoredTest, TestFailure> {
    let min_len = synthetic.len().min(real.len());
    if min_len == 0 {
        return Err(TestFailure::InsufficientData(1));
    }
    let synthetic = &synthetic[..min_len];
    let real = &real[..min_len];

    let mae = synthetic
        .iter()
        .zip(real)
        .map(|(s, r)| (s - r).abs())
        .sum::<f64>()
        / min_len as f64;
    let rmse = (synthetic
        .iter()
        .zip(real)
        .map(|(s, r)| (s - r).powi(2))
        .sum::<f64>()
        / min_len as f64)
        .sqrt();

    let range = combined_range(synthetic, real);
    let normalized_mae = if range > 0.0 {
        safe_float(mae / range).unwrap_or(0.0)
    } else {
        safe_float(mae).unwrap_or(0.0)
    };
    let normalized_rmse = if range > 0.0 {
        safe_float(rmse / range).unwrap_or(0.0)
    } else {
        safe_float(rmse).unwrap_or(0.0)
    };

    let avg_error = safe_float((normalized_mae + normalized_rmse) / 2.0).unwrap_or(0.0);
    let tier = if avg_error < 0.10 {
        Tier::Tier1
    } else if avg_error < 0.25 {
        Tier::Tier2
    } else {
        Tier::Tier3
    };

    Ok(ScoredTest {
        test: TestName::ErrorMetrics,
        metrics: metrics([
            ("mae", num(mae)),
            ("rmse", num(rmse)),
            ("normalized_mae", Some(normalized_mae)),
            ("normalized_rmse", Some(normalized_rmse)),
        ]),
        tier,
        match_score: safe_float(1.0 - avg_error.min(1.0)).unwrap_or(0.0),
        interpretation: Some("Measures prediction accuracy (lower is better)"),
    })
}

// ── distribution_summary ────────────────────────────────────────────

/// Summary-statistics comparison over the full sequences.
pub fn distribution_summary(synthetic: &[f64], real: &[f64]) -> TestResult {
    finish(
        TestName::DistributionSummary,
        Ok(distribution_summary_impl(synthetic, real)),
    )
}

fn distribution_summary_impl(synthetic: &[f64], real: &[f64]) -> ScoredTest {
    let syn_mean = safe_float(mean(synthetic)).unwrap_or(0.0);
    let syn_std = if synthetic.len() > 1 {
        safe_float(population_std(synthetic)).unwrap_or(0.0)
    } else {
        0.0
    };
    let syn_median = safe_float(median(synthetic)).unwrap_or(0.0);

    let real_mean = safe_float(mean(real)).unwrap_or(0.0);
    let real_std = if real.len() > 1 {
        safe_float(population_std(real)).unwrap_or(0.0)
    } else {
        0.0
    };
    let real_median = safe_float(median(real)).unwrap_or(0.0);

    let mean_diff = (syn_mean - real_mean).abs();
    let std_diff = (syn_std - real_std).abs();
    let median_diff = (syn_median - real_median).abs();

    // normalize against the larger-magnitude counterpart, or 1.0 when
    // both sides are zero
    let mean_range = syn_mean.abs().max(real_mean.abs());
    let mean_range = if mean_range > 0.0 { mean_range } else { 1.0 };
    let std_range = syn_std.max(real_std);
    let std_range = if std_range > 0.0 { std_range } else { 1.0 };

    let normalized_mean_diff = safe_float(mean_diff / mean_range).unwrap_or(0.0);
    let normalized_std_diff = safe_float(std_diff / std_range).unwrap_or(0.0);
    let avg_diff =
        safe_float((normalized_mean_diff + normalized_std_diff) / 2.0).unwrap_or(0.0);

    let tier = if avg_diff < 0.10 {
        Tier::Tier1
    } else if avg_diff < 0.25 {
        Tier::Tier2
    } else {
        Tier::Tier3
    };

    ScoredTest {
        test: TestName::DistributionSummary,
        metrics: metrics([
            ("synthetic_mean", Some(syn_mean)),
            ("synthetic_std", Some(syn_std)),
            ("synthetic_median", Some(syn_median)),
            ("real_mean", Some(real_mean)),
            ("real_std", Some(real_std)),
            ("real_median", Some(real_median)),
            ("mean_difference", num(mean_diff)),
            ("std_difference", num(std_diff)),
            ("median_difference", num(median_diff)),
            ("normalized_mean_diff", Some(normalized_mean_diff)),
            ("normalized_std_diff", Some(normalized_std_diff)),
        ]),
        tier,
        match_score: safe_float(1.0 - avg_diff.min(1.0)).unwrap_or(0.0),
        interpretation: Some("Compares mean, standard deviation, and median"),
    }
}

// ── kullback_leibler ────────────────────────────────────────────────

/// KL divergence of the sequences as clipped probability vectors,
/// tanh-normalized.
pub fn kullback_leibler(synthetic: &[f64], real: &[f64]) -> TestResult {
    finish(
        TestName::KullbackLeibler,
        kullback_leibler_impl(synthetic, real),
    )
}

fn kullback_leibler_impl(synthetic: &[f64], real: &[f64]) -> Result<ScoredTest, TestFailure> {
    let (p, q) = normalized_pair(synthetic, real, KL_EPSILON)?;

    let divergence: f64 = p
        .iter()
        .zip(&q)
        .map(|(&pi, &qi)| {
            let pi = pi.max(KL_EPSILON);
            let qi = qi.max(KL_EPSILON);
            pi * (pi / qi).ln()
        })
        .sum();

    let normalized = safe_float((divergence.min(10.0) / 5.0).tanh()).unwrap_or(0.0);
    let tier = if normalized < 0.10 {
        Tier::Tier1
    } else if normalized < 0.30 {
        Tier::Tier2
    } else {
        Tier::Tier3
    };

    Ok(ScoredTest {
        test: TestName::KullbackLeibler,
        metrics: metrics([
            ("divergence", num(divergence)),
            ("normalized_divergence", Some(normalized)),
        ]),
        tier,
        match_score: safe_float(1.0 - normalized).unwrap_or(0.0),
        interpretation: Some(
            "Measures information gain when using real data to approximate \
             synthetic data. Lower is better.",
        ),
    })
}

// ── cramer_von_mises ────────────────────────────────────────────────

/// Two-sample Cramér-von Mises test.
///
/// The asymptotic p-value of the limiting CvM distribution is not
/// computed here; tiering uses the statistic-normalization fallback and
/// `p_value` reports `null`.
pub fn cramer_von_mises(synthetic: &[f64], real: &[f64]) -> TestResult {
    finish(
        TestName::CramerVonMises,
        cramer_von_mises_impl(synthetic, real),
    )
}

fn cramer_von_mises_impl(synthetic: &[f64], real: &[f64]) -> Result<ScoredTest, TestFailure> {
    if synthetic.len() < 3 || real.len() < 3 {
        return Err(TestFailure::InsufficientData(3));
    }

    let n1 = synthetic.len() as f64;
    let n2 = real.len() as f64;
    let n = n1 + n2;

    let pooled: Vec<f64> = synthetic.iter().chain(real).copied().collect();
    let ranks = midranks(&pooled);

    let mut syn_ranks: Vec<f64> = ranks[..synthetic.len()].to_vec();
    let mut real_ranks: Vec<f64> = ranks[synthetic.len()..].to_vec();
    syn_ranks.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    real_ranks.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let u = n1
        * syn_ranks
            .iter()
            .enumerate()
            .map(|(i, r)| (r - (i + 1) as f64).powi(2))
            .sum::<f64>()
        + n2 * real_ranks
            .iter()
            .enumerate()
            .map(|(j, r)| (r - (j + 1) as f64).powi(2))
            .sum::<f64>();

    let k = n1 * n2;
    let statistic = u / (k * n) - (4.0 * k - 1.0) / (6.0 * n);
    let statistic = safe_float(statistic).ok_or(TestFailure::NonFinite)?;

    // the 2.0 divisor is an inherited heuristic for typical statistic
    // magnitudes
    let norm_stat = (statistic / 2.0).min(1.0);
    let match_score = (1.0 - norm_stat).clamp(0.0, 1.0);

    Ok(ScoredTest {
        test: TestName::CramerVonMises,
        metrics: metrics([("statistic", num(statistic)), ("p_value", None)]),
        tier: tier_from_fallback(match_score),
        match_score,
        interpretation: Some(
            "Tests if samples come from the same distribution. \
             Higher p-value or lower statistic means similar distributions.",
        ),
    })
}
