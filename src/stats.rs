//! Statistical primitives for distribution comparison.
//!
//! Numeric sanitation, descriptive statistics, and the special functions
//! behind the battery's p-values.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::float_cmp)]

use std::cmp::Ordering;

/// Converts a float to a finite float, collapsing NaN and ±infinity to `None`.
#[inline]
#[must_use]
pub fn safe_float(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Clamps a match score to the unit interval.
#[inline]
#[must_use]
pub fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Arithmetic mean. Returns 0.0 for an empty sample.
#[must_use]
pub fn mean(sample: &[f64]) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }
    sample.iter().sum::<f64>() / sample.len() as f64
}

/// Population standard deviation (ddof = 0). Returns 0.0 for an empty sample.
#[must_use]
pub fn population_std(sample: &[f64]) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }
    let m = mean(sample);
    let variance = sample.iter().map(|x| (x - m).powi(2)).sum::<f64>() / sample.len() as f64;
    variance.sqrt()
}

/// Sample variance (ddof = 1). Returns 0.0 when fewer than two values.
#[must_use]
pub fn sample_variance(sample: &[f64]) -> f64 {
    if sample.len() < 2 {
        return 0.0;
    }
    let m = mean(sample);
    sample.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (sample.len() - 1) as f64
}

/// Median of a sample. Returns 0.0 for an empty sample.
#[must_use]
pub fn median(sample: &[f64]) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }
    let mut sorted = sample.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Minimum and maximum over both samples pooled. `None` when both are empty.
#[must_use]
pub fn combined_bounds(sample1: &[f64], sample2: &[f64]) -> Option<(f64, f64)> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &v in sample1.iter().chain(sample2) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    (lo <= hi).then_some((lo, hi))
}

/// Width of the pooled data range. Zero when both samples are empty.
#[must_use]
pub fn combined_range(sample1: &[f64], sample2: &[f64]) -> f64 {
    combined_bounds(sample1, sample2).map_or(0.0, |(lo, hi)| hi - lo)
}

/// Recursively replaces any non-finite number in a JSON tree with `null`.
///
/// Mirrors the sanitation applied to every serialized result: NaN and
/// ±infinity are forbidden on the wire and collapse to `null`.
pub fn sanitize_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Number(n) => {
            if n.as_f64().is_some_and(|f| !f.is_finite()) {
                *value = serde_json::Value::Null;
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                sanitize_json(item);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values_mut() {
                sanitize_json(item);
            }
        }
        _ => {}
    }
}

/// Midranks (1-based, ties averaged) of a sample.
#[must_use]
pub fn midranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // positions i..=j share the average of ranks i+1..=j+1
        let avg = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Pearson correlation with its two-tailed p-value.
///
/// `None` when either sequence has zero variance (the coefficient is
/// undefined there, and the caller treats it as a degenerate input).
#[must_use]
pub fn pearson(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mx = mean(x);
    let my = mean(y);
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx <= 0.0 || vy <= 0.0 {
        return None;
    }
    let r = (cov / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0);
    Some((r, correlation_pvalue(r, x.len())))
}

/// Spearman rank correlation with its two-tailed p-value.
#[must_use]
pub fn spearman(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    pearson(&midranks(x), &midranks(y))
}

/// Two-tailed p-value of a correlation coefficient via the t-approximation.
fn correlation_pvalue(r: f64, n: usize) -> f64 {
    if n < 3 {
        return 1.0;
    }
    let df = (n - 2) as f64;
    let denom = 1.0 - r * r;
    if denom <= 0.0 {
        return 0.0;
    }
    let t = r * (df / denom).sqrt();
    students_t_two_tailed_p(t, df)
}

/// Computes the two-sample Kolmogorov-Smirnov statistic (D).
///
/// The ECDF gap is evaluated after consuming every value equal to the
/// current pooled point, so tied values across samples do not inflate D
/// and identical samples score exactly 0.
#[must_use]
pub fn ks_statistic(sample1: &[f64], sample2: &[f64]) -> f64 {
    if sample1.is_empty() || sample2.is_empty() {
        return 1.0;
    }

    let mut sorted1 = sample1.to_vec();
    let mut sorted2 = sample2.to_vec();
    sorted1.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted2.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let n1 = sorted1.len() as f64;
    let n2 = sorted2.len() as f64;

    let mut i = 0usize;
    let mut j = 0usize;
    let mut max_d = 0.0f64;

    while i < sorted1.len() || j < sorted2.len() {
        let v = match (sorted1.get(i), sorted2.get(j)) {
            (Some(&a), Some(&b)) => a.min(b),
            (Some(&a), None) => a,
            (None, Some(&b)) => b,
            (None, None) => break,
        };
        while i < sorted1.len() && sorted1[i] <= v {
            i += 1;
        }
        while j < sorted2.len() && sorted2[j] <= v {
            j += 1;
        }
        max_d = max_d.max((i as f64 / n1 - j as f64 / n2).abs());
    }

    max_d
}

/// Computes the asymptotic p-value for the two-sample KS statistic.
#[must_use]
pub fn ks_pvalue(d: f64, n1: usize, n2: usize) -> f64 {
    if d <= 0.0 {
        return 1.0;
    }
    if d >= 1.0 {
        return 0.0;
    }

    let n = (n1 as f64 * n2 as f64) / (n1 as f64 + n2 as f64);
    let sqrt_n = n.sqrt();

    let lambda = (sqrt_n + 0.12 + 0.11 / sqrt_n) * d;
    let lambda_sq = lambda * lambda;

    let mut sum = 0.0;
    for k in 1..=100 {
        let k_f = f64::from(k);
        let term = (-2.0 * k_f * k_f * lambda_sq).exp();
        if k % 2 == 1 {
            sum += term;
        } else {
            sum -= term;
        }
        if term < 1e-10 {
            break;
        }
    }

    (2.0 * sum).clamp(0.0, 1.0)
}

/// Exact earth-mover distance between the empirical distributions of two
/// one-dimensional samples: the integral of |F1 - F2| over the pooled
/// support.
#[must_use]
pub fn wasserstein_1d(sample1: &[f64], sample2: &[f64]) -> f64 {
    if sample1.is_empty() || sample2.is_empty() {
        return 0.0;
    }

    let mut sorted1 = sample1.to_vec();
    let mut sorted2 = sample2.to_vec();
    sorted1.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted2.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mut pooled: Vec<f64> = sorted1.iter().chain(&sorted2).copied().collect();
    pooled.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let n1 = sorted1.len() as f64;
    let n2 = sorted2.len() as f64;

    let mut i = 0usize;
    let mut j = 0usize;
    let mut distance = 0.0;

    for window in pooled.windows(2) {
        let (left, right) = (window[0], window[1]);
        while i < sorted1.len() && sorted1[i] <= left {
            i += 1;
        }
        while j < sorted2.len() && sorted2[j] <= left {
            j += 1;
        }
        distance += (i as f64 / n1 - j as f64 / n2).abs() * (right - left);
    }

    distance
}

// ── Special functions (Numerical Recipes style) ─────────────────────

/// Computes P(Z > z) for the standard normal distribution.
///
/// Abramowitz & Stegun 26.2.17 rational approximation with Horner's
/// method. Caller must pass z >= 0 (use `z.abs()` before calling).
#[must_use]
pub fn normal_sf(z: f64) -> f64 {
    debug_assert!(z >= 0.0, "normal_sf requires z >= 0, got {z}");

    let t = 1.0 / (1.0 + 0.2316419 * z);
    let d = 0.398_942_280_401_432_7; // 1/sqrt(2*pi)
    let p = d * (-z * z / 2.0).exp();

    let poly = t
        * (0.319_381_530
            + t * (-0.356_563_782
                + t * (1.781_477_937 + t * (-1.821_255_978 + t * 1.330_274_429))));

    p * poly
}

/// Lanczos approximation of ln(Gamma(x)) for x > 0.
#[allow(clippy::excessive_precision)]
#[must_use]
pub fn ln_gamma(x: f64) -> f64 {
    // Lanczos coefficients (g=7)
    let coefficients = [
        0.99999999999980993,
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];

    if x < 0.5 {
        // Reflection formula
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut acc = coefficients[0];
    let t = x + 7.5; // g + 0.5

    for (i, &coef) in coefficients.iter().enumerate().skip(1) {
        acc += coef / (x + i as f64);
    }

    0.5 * (2.0 * std::f64::consts::PI).ln() + (t.ln() * (x + 0.5)) - t + acc.ln()
}

/// Two-tailed p-value for Student's t-distribution with `df` degrees of
/// freedom. Uses the regularized incomplete beta representation.
#[must_use]
pub fn students_t_two_tailed_p(t: f64, df: f64) -> f64 {
    if !t.is_finite() || !df.is_finite() || df <= 0.0 {
        return 1.0;
    }
    let x = df / (df + t * t);
    regularized_incomplete_beta(df / 2.0, 0.5, x)
}

/// Regularized incomplete beta I_x(a, b).
/// Numerical Recipes style continued-fraction implementation.
#[must_use]
pub fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let bt = (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln()).exp();

    if x < (a + 1.0) / (a + b + 2.0) {
        (bt * beta_continued_fraction(a, b, x) / a).clamp(0.0, 1.0)
    } else {
        (1.0 - bt * beta_continued_fraction(b, a, 1.0 - x) / b).clamp(0.0, 1.0)
    }
}

fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITERS: usize = 200;
    const EPS: f64 = 3.0e-7;
    const FPMIN: f64 = 1.0e-30;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < FPMIN {
        d = FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITERS {
        let m_f = m as f64;
        let m2 = 2.0 * m_f;

        let aa = m_f * (b - m_f) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m_f) * (qab + m_f) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }

    h
}

/// Survival function of the chi-squared distribution with `dof` degrees
/// of freedom: P(X > chi2).
#[must_use]
pub fn chi_squared_sf(chi2: f64, dof: f64) -> f64 {
    if chi2 <= 0.0 || dof <= 0.0 {
        return 1.0;
    }
    regularized_gamma_q(dof / 2.0, chi2 / 2.0)
}

/// Regularized upper incomplete gamma Q(a, x).
#[must_use]
pub fn regularized_gamma_q(a: f64, x: f64) -> f64 {
    if a <= 0.0 || x <= 0.0 {
        return 1.0;
    }
    if x < a + 1.0 {
        (1.0 - gamma_series_p(a, x)).clamp(0.0, 1.0)
    } else {
        gamma_continued_fraction_q(a, x).clamp(0.0, 1.0)
    }
}

/// Series representation of the regularized lower incomplete gamma P(a, x),
/// convergent for x < a + 1.
fn gamma_series_p(a: f64, x: f64) -> f64 {
    const MAX_ITERS: usize = 300;
    const EPS: f64 = 3.0e-9;

    let mut ap = a;
    let mut sum = 1.0 / a;
    let mut del = sum;
    for _ in 0..MAX_ITERS {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * EPS {
            break;
        }
    }
    (sum.ln() + a * x.ln() - x - ln_gamma(a)).exp()
}

/// Continued-fraction representation of Q(a, x), convergent for x >= a + 1.
/// Modified Lentz's method.
fn gamma_continued_fraction_q(a: f64, x: f64) -> f64 {
    const MAX_ITERS: usize = 300;
    const EPS: f64 = 3.0e-9;
    const FPMIN: f64 = 1.0e-30;

    let mut b = x + 1.0 - a;
    let mut c = 1.0 / FPMIN;
    let mut d = 1.0 / b;
    let mut h = d;

    for i in 1..=MAX_ITERS {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = b + an / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPS {
            break;
        }
    }

    (a * x.ln() - x - ln_gamma(a)).exp() * h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_float_collapses_non_finite() {
        assert_eq!(safe_float(1.5), Some(1.5));
        assert_eq!(safe_float(f64::NAN), None);
        assert_eq!(safe_float(f64::INFINITY), None);
        assert_eq!(safe_float(f64::NEG_INFINITY), None);
    }

    #[test]
    fn mean_and_std_basic() {
        let sample = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((mean(&sample) - 3.0).abs() < f64::EPSILON);
        assert!((population_std(&sample) - 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn median_even_and_odd() {
        assert!((median(&[3.0, 1.0, 2.0]) - 2.0).abs() < f64::EPSILON);
        assert!((median(&[4.0, 1.0, 3.0, 2.0]) - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn combined_range_spans_both_samples() {
        assert!((combined_range(&[1.0, 5.0], &[-2.0, 3.0]) - 7.0).abs() < f64::EPSILON);
        assert!(combined_range(&[], &[]).abs() < f64::EPSILON);
    }

    #[test]
    fn sanitize_json_walks_the_tree() {
        let mut value = serde_json::json!({
            "a": 1.5,
            "b": [1.0, 2.0, {"c": 3.0}],
            "d": "text",
        });
        sanitize_json(&mut value);
        assert_eq!(value["a"], serde_json::json!(1.5));
        assert_eq!(value["b"][2]["c"], serde_json::json!(3.0));
        assert_eq!(value["d"], serde_json::json!("text"));
    }

    #[test]
    fn midranks_average_ties() {
        let ranks = midranks(&[10.0, 20.0, 20.0, 30.0]);
        assert_eq!(ranks, vec![1.0, 2.5, 2.5, 4.0]);
    }

    #[test]
    fn pearson_perfect_correlation() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let (r, p) = pearson(&x, &x).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
        assert!(p < 1e-6);
    }

    #[test]
    fn pearson_rejects_zero_variance() {
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn spearman_is_rank_based() {
        // monotone but nonlinear: rho = 1 while r < 1
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 4.0, 9.0, 16.0, 25.0];
        let (rho, _) = spearman(&x, &y).unwrap();
        assert!((rho - 1.0).abs() < 1e-12);
        let (r, _) = pearson(&x, &y).unwrap();
        assert!(r < 1.0);
    }

    #[test]
    fn ks_statistic_identical_samples_is_zero() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(ks_statistic(&x, &x).abs() < f64::EPSILON);
    }

    #[test]
    fn ks_statistic_disjoint_samples_is_one() {
        let a = [1.0, 2.0, 3.0];
        let b = [10.0, 11.0, 12.0];
        assert!((ks_statistic(&a, &b) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ks_pvalue_bounds() {
        assert!((ks_pvalue(0.0, 10, 10) - 1.0).abs() < f64::EPSILON);
        assert!(ks_pvalue(1.0, 10, 10).abs() < f64::EPSILON);
        let p = ks_pvalue(0.3, 50, 50);
        assert!(p > 0.0 && p < 1.0);
    }

    #[test]
    fn wasserstein_identical_samples_is_zero() {
        let x = [4.0, 1.0, 3.0, 2.0];
        assert!(wasserstein_1d(&x, &x).abs() < f64::EPSILON);
    }

    #[test]
    fn wasserstein_shifted_samples() {
        // shifting every value by c moves the distance by exactly c
        let a = [1.0, 2.0, 3.0];
        let b = [2.0, 3.0, 4.0];
        assert!((wasserstein_1d(&a, &b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn normal_sf_reference_values() {
        assert!((normal_sf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_sf(1.96) - 0.025).abs() < 5e-4);
        assert!((normal_sf(2.58) - 0.005).abs() < 2e-4);
    }

    #[test]
    fn ln_gamma_reference_values() {
        // Gamma(1) = Gamma(2) = 1
        assert!(ln_gamma(1.0).abs() < 1e-10);
        assert!(ln_gamma(2.0).abs() < 1e-10);
        // Gamma(5) = 24
        assert!((ln_gamma(5.0) - 24.0f64.ln()).abs() < 1e-10);
        // Gamma(1/2) = sqrt(pi)
        assert!((ln_gamma(0.5) - std::f64::consts::PI.sqrt().ln()).abs() < 1e-10);
    }

    #[test]
    fn students_t_reference_values() {
        // t = 0 is maximally insignificant
        assert!((students_t_two_tailed_p(0.0, 10.0) - 1.0).abs() < 1e-9);
        // t(df=10) two-tailed at 2.228 is ~0.05
        assert!((students_t_two_tailed_p(2.228, 10.0) - 0.05).abs() < 1e-3);
        // symmetric in t
        let p_pos = students_t_two_tailed_p(1.5, 8.0);
        let p_neg = students_t_two_tailed_p(-1.5, 8.0);
        assert!((p_pos - p_neg).abs() < 1e-12);
    }

    #[test]
    fn chi_squared_sf_reference_values() {
        // chi2(df=1) at 3.841 is ~0.05
        assert!((chi_squared_sf(3.841, 1.0) - 0.05).abs() < 1e-3);
        // chi2(df=8) at 15.507 is ~0.05
        assert!((chi_squared_sf(15.507, 8.0) - 0.05).abs() < 1e-3);
        assert!((chi_squared_sf(0.0, 4.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn incomplete_beta_endpoints() {
        assert!(regularized_incomplete_beta(2.0, 3.0, 0.0).abs() < f64::EPSILON);
        assert!((regularized_incomplete_beta(2.0, 3.0, 1.0) - 1.0).abs() < f64::EPSILON);
        // I_x(1, 1) = x
        assert!((regularized_incomplete_beta(1.0, 1.0, 0.3) - 0.3).abs() < 1e-7);
    }
}
