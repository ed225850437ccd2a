//! P-value calculation from test statistics

use statrs::distribution::{ContinuousCDF, StudentsT};

/// Two-sided p-value of a t statistic with `df` degrees of freedom
///
/// Returns NaN for a non-finite statistic or non-positive df.
pub fn calculate_pvalue_t(stat: f64, df: f64) -> f64 {
    if stat.is_nan() || !(df > 0.0) {
        return f64::NAN;
    }
    if stat.is_infinite() {
        return 0.0;
    }

    match StudentsT::new(0.0, 1.0, df) {
        Ok(t_dist) => (2.0 * t_dist.cdf(-stat.abs())).min(1.0),
        Err(_) => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pvalue_symmetric() {
        let p1 = calculate_pvalue_t(2.0, 5.0);
        let p2 = calculate_pvalue_t(-2.0, 5.0);
        assert!((p1 - p2).abs() < 1e-12);
    }

    #[test]
    fn test_pvalue_zero_stat() {
        assert!((calculate_pvalue_t(0.0, 10.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pvalue_known_value() {
        // 2 * pt(-2.776445, 4) = 0.05
        let p = calculate_pvalue_t(2.776445105, 4.0);
        assert!((p - 0.05).abs() < 1e-6, "p = {}", p);
    }

    #[test]
    fn test_small_df_is_conservative() {
        assert!(calculate_pvalue_t(2.0, 3.0) > calculate_pvalue_t(2.0, 1000.0));
        assert!(calculate_pvalue_t(2.0, 0.0).is_nan());
        assert_eq!(calculate_pvalue_t(f64::INFINITY, 3.0), 0.0);
    }
}
