//! Statistical utility functions shared across modules
//!
//! Contains the polygamma functions needed by the empirical-Bayes moment
//! estimators, plus small summary helpers used by batch correction and the
//! linear model.

use statrs::function::gamma::digamma as statrs_digamma;

/// Recurrence shifts arguments up to at least this before the asymptotic series
const ASYMPTOTIC_THRESHOLD: f64 = 10.0;

/// Digamma function psi(x)
pub fn digamma(x: f64) -> f64 {
    statrs_digamma(x)
}

/// Trigamma function psi'(x) for x > 0
///
/// Uses psi'(x) = psi'(x + 1) + 1/x^2 to shift the argument, then the
/// asymptotic expansion in 1/x.
pub fn trigamma(x: f64) -> f64 {
    if !(x > 0.0) {
        return f64::NAN;
    }

    let mut x = x;
    let mut acc = 0.0;
    while x < ASYMPTOTIC_THRESHOLD {
        acc += 1.0 / (x * x);
        x += 1.0;
    }

    let inv = 1.0 / x;
    let inv2 = inv * inv;
    // 1/x + 1/(2x^2) + 1/(6x^3) - 1/(30x^5) + 1/(42x^7) - 1/(30x^9)
    let series = inv
        + inv2 / 2.0
        + inv * inv2 * (1.0 / 6.0 - inv2 * (1.0 / 30.0 - inv2 * (1.0 / 42.0 - inv2 / 30.0)));
    acc + series
}

/// Tetragamma function psi''(x) for x > 0
pub fn tetragamma(x: f64) -> f64 {
    if !(x > 0.0) {
        return f64::NAN;
    }

    let mut x = x;
    let mut acc = 0.0;
    while x < ASYMPTOTIC_THRESHOLD {
        acc -= 2.0 / (x * x * x);
        x += 1.0;
    }

    let inv = 1.0 / x;
    let inv2 = inv * inv;
    // -1/x^2 - 1/x^3 - 1/(2x^4) + 1/(6x^6) - 1/(6x^8) + 3/(10x^10)
    let series = -inv2 - inv2 * inv
        - inv2 * inv2 * (0.5 - inv2 * (1.0 / 6.0 - inv2 * (1.0 / 6.0 - inv2 * 0.3)));
    acc + series
}

/// Solve trigamma(y) = x for y by Newton iteration
///
/// trigamma is strictly decreasing and convex on (0, inf), so starting at
/// 0.5 + 1/x the iteration converges monotonically.
pub fn trigamma_inverse(x: f64) -> f64 {
    if !x.is_finite() || x <= 0.0 {
        return f64::NAN;
    }
    if x > 1e7 {
        return 1.0 / x.sqrt();
    }
    if x < 1e-6 {
        return 1.0 / x;
    }

    let mut y = 0.5 + 1.0 / x;
    for _ in 0..50 {
        let tri = trigamma(y);
        let dif = tri * (1.0 - tri / x) / tetragamma(y);
        y += dif;
        if -dif / y < 1e-8 {
            break;
        }
    }
    y
}

/// Arithmetic mean; NaN for an empty slice
pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Sample variance with n - 1 denominator; NaN with fewer than two values
pub fn sample_variance(x: &[f64]) -> f64 {
    if x.len() < 2 {
        return f64::NAN;
    }
    let m = mean(x);
    x.iter().map(|&v| (v - m).powi(2)).sum::<f64>() / (x.len() - 1) as f64
}

/// Median of finite values; NaN when there are none
pub fn median(x: &[f64]) -> f64 {
    let mut v: Vec<f64> = x.iter().copied().filter(|v| v.is_finite()).collect();
    if v.is_empty() {
        return f64::NAN;
    }
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = v.len();
    if n % 2 == 0 {
        (v[n / 2 - 1] + v[n / 2]) / 2.0
    } else {
        v[n / 2]
    }
}
