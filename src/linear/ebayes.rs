//! Empirical-Bayes moderation of per-gene variances
//!
//! Gene-wise residual variances are modelled as scaled chi-square draws around
//! a common prior `s0^2` with `d0` prior degrees of freedom. The prior is
//! estimated by matching the first two moments of `log(s^2)`, and each gene's
//! variance is shrunk to the posterior `(d s^2 + d0 s0^2) / (d + d0)` before
//! forming moderated t statistics.

use ndarray::Array2;

use super::fitting::LinearFit;
use crate::error::{ArraySigError, Result};
use crate::io::DifferentialExpression;
use crate::stats::{digamma, mean, median, trigamma, trigamma_inverse};
use crate::testing::{benjamini_hochberg, calculate_pvalue_t};

/// Prior estimated from the gene-wise variances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariancePrior {
    /// Prior variance s0^2
    pub scale: f64,
    /// Prior degrees of freedom d0 (may be infinite)
    pub df: f64,
}

/// A contrast fit with moderated statistics
#[derive(Debug, Clone)]
pub struct ModeratedFit {
    pub fit: LinearFit,
    pub prior: VariancePrior,
    /// Posterior variance per gene
    pub s2_post: Vec<f64>,
    /// Total degrees of freedom per gene
    pub df_total: Vec<f64>,
    /// Genes x contrasts
    pub t: Array2<f64>,
    /// Genes x contrasts, two-sided
    pub p_value: Array2<f64>,
}

impl ModeratedFit {
    /// Differential expression table for one contrast column
    pub fn table(&self, contrast_idx: usize) -> Result<DifferentialExpression> {
        let name = self
            .fit
            .coef_names
            .get(contrast_idx)
            .ok_or_else(|| ArraySigError::InvalidContrast {
                reason: format!("contrast index {} out of range", contrast_idx),
            })?
            .clone();

        let p_values = self.p_value.column(contrast_idx).to_vec();
        let adj_p_values = benjamini_hochberg(&p_values);

        Ok(DifferentialExpression {
            contrast: name,
            gene_ids: self.fit.gene_ids.clone(),
            log_fold_changes: self.fit.coefficients.column(contrast_idx).to_vec(),
            ave_expr: self.fit.amean.clone(),
            t: self.t.column(contrast_idx).to_vec(),
            p_values,
            adj_p_values,
        })
    }

    /// Tables for every contrast, in contrast order
    pub fn tables(&self) -> Result<Vec<DifferentialExpression>> {
        (0..self.fit.n_coefs()).map(|k| self.table(k)).collect()
    }
}

/// Estimate the scaled-F prior for variances `s2` with `df1` degrees of freedom
pub fn fit_f_dist(s2: &[f64], df1: &[f64]) -> VariancePrior {
    let pairs: Vec<(f64, f64)> = s2
        .iter()
        .zip(df1.iter())
        .filter(|(&x, &d)| x.is_finite() && d.is_finite() && d > 1e-15 && x > -1e-15)
        .map(|(&x, &d)| (x.max(0.0), d))
        .collect();

    let n = pairs.len();
    if n == 0 {
        return VariancePrior {
            scale: f64::NAN,
            df: f64::NAN,
        };
    }
    if n == 1 {
        return VariancePrior {
            scale: pairs[0].0,
            df: 0.0,
        };
    }

    // Avoid log(0)
    let values: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let mut m = median(&values);
    if m == 0.0 {
        log::warn!("More than half of residual variances are exactly zero: eBayes unreliable");
        m = 1.0;
    }
    let floor = 1e-5 * m;

    let e: Vec<f64> = pairs
        .iter()
        .map(|&(x, d)| x.max(floor).ln() - digamma(d / 2.0) + (d / 2.0).ln())
        .collect();
    let emean = mean(&e);
    let evar_raw = e.iter().map(|v| (v - emean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let tri_mean = mean(&pairs.iter().map(|p| trigamma(p.1 / 2.0)).collect::<Vec<f64>>());
    let evar = evar_raw - tri_mean;

    log::debug!("fit_f_dist: emean={:.6}, evar={:.6}", emean, evar);

    if evar > 0.0 {
        let df2 = 2.0 * trigamma_inverse(evar);
        let scale = (emean + digamma(df2 / 2.0) - (df2 / 2.0).ln()).exp();
        VariancePrior { scale, df: df2 }
    } else {
        VariancePrior {
            scale: emean.exp(),
            df: f64::INFINITY,
        }
    }
}

/// Posterior variances given a prior
pub fn squeeze_var(s2: &[f64], df: &[f64], prior: &VariancePrior) -> Vec<f64> {
    s2.iter()
        .zip(df.iter())
        .map(|(&x, &d)| {
            if prior.df.is_infinite() {
                prior.scale
            } else if !x.is_finite() || d == 0.0 {
                prior.scale
            } else {
                (d * x + prior.df * prior.scale) / (d + prior.df)
            }
        })
        .collect()
}

/// Moderated t statistics and p-values for every gene and contrast
pub fn ebayes(fit: LinearFit) -> Result<ModeratedFit> {
    if !fit.df_residual.iter().any(|&d| d > 0.0) {
        return Err(ArraySigError::InvalidDesignMatrix {
            reason: "No residual degrees of freedom: each group needs replicate samples"
                .to_string(),
        });
    }

    let prior = fit_f_dist(&fit.sigma2, &fit.df_residual);
    if !prior.scale.is_finite() {
        return Err(ArraySigError::NumericalInstability {
            operation: "empirical Bayes prior".to_string(),
            details: "no finite residual variances".to_string(),
        });
    }
    log::info!(
        "  variance prior: s0^2={:.6}, d0={}",
        prior.scale,
        if prior.df.is_infinite() {
            "Inf".to_string()
        } else {
            format!("{:.3}", prior.df)
        }
    );

    let s2_post = squeeze_var(&fit.sigma2, &fit.df_residual, &prior);

    let df_pooled: f64 = fit.df_residual.iter().sum();
    let df_total: Vec<f64> = fit
        .df_residual
        .iter()
        .map(|&d| {
            let prior_df = if prior.df.is_finite() { prior.df } else { df_pooled };
            (d + prior_df).min(df_pooled)
        })
        .collect();

    let (n_genes, n_coefs) = fit.coefficients.dim();
    let mut t = Array2::zeros((n_genes, n_coefs));
    let mut p_value = Array2::zeros((n_genes, n_coefs));
    for g in 0..n_genes {
        let s_post = s2_post[g].sqrt();
        for k in 0..n_coefs {
            let stat = fit.coefficients[[g, k]] / (fit.stdev_unscaled[[g, k]] * s_post);
            t[[g, k]] = stat;
            p_value[[g, k]] = calculate_pvalue_t(stat, df_total[g]);
        }
    }

    Ok(ModeratedFit {
        fit,
        prior,
        s2_post,
        df_total,
        t,
        p_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::{contrasts_fit, group_design, lm_fit, one_vs_rest_contrasts};
    use ndarray::Array2;

    #[test]
    fn test_fit_f_dist_low_dispersion() {
        // Variances far less spread than chi-square noise imply a large prior df
        let s2: Vec<f64> = (0..200)
            .map(|i| 2.0 * (1.0 + 0.3 * ((i as f64) * 0.7).sin()))
            .collect();
        let df = vec![4.0; 200];
        let prior = fit_f_dist(&s2, &df);
        assert!(prior.df > 4.0, "prior df = {}", prior.df);
        assert!(prior.scale > 1.5 && prior.scale < 3.0, "prior scale = {}", prior.scale);
    }

    #[test]
    fn test_fit_f_dist_degenerate() {
        let prior = fit_f_dist(&[3.0], &[2.0]);
        assert_eq!(prior.scale, 3.0);
        assert_eq!(prior.df, 0.0);
        assert!(fit_f_dist(&[], &[]).scale.is_nan());
    }

    #[test]
    fn test_squeeze_var_between_prior_and_sample() {
        let prior = VariancePrior { scale: 1.0, df: 4.0 };
        let post = squeeze_var(&[9.0, 0.1], &[4.0, 4.0], &prior);
        assert!((post[0] - 5.0).abs() < 1e-12);
        assert!(post[1] > 0.1 && post[1] < 1.0);

        let infinite = VariancePrior { scale: 1.5, df: f64::INFINITY };
        assert_eq!(squeeze_var(&[9.0], &[4.0], &infinite), vec![1.5]);
    }

    #[test]
    fn test_ebayes_detects_group_effect() {
        // 3 groups x 3 replicates, 50 genes; gene 0 strongly up in group "b"
        let labels: Vec<String> = ["a", "a", "a", "b", "b", "b", "c", "c", "c"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let n_genes = 50;
        let mut values = Array2::zeros((n_genes, 9));
        for g in 0..n_genes {
            for j in 0..9 {
                let noise = (((g * 9 + j) as f64) * 1.618).sin() * 0.3;
                values[[g, j]] = 5.0 + noise;
            }
        }
        for j in 3..6 {
            values[[0, j]] += 4.0;
        }

        let gene_ids: Vec<String> = (0..n_genes).map(|g| format!("gene{}", g)).collect();
        let design = group_design(&labels).unwrap();
        let fit = lm_fit(values.view(), &design.matrix, &gene_ids, &design.levels).unwrap();
        let contrasts = one_vs_rest_contrasts(&design.levels).unwrap();
        let moderated = ebayes(contrasts_fit(&fit, &contrasts).unwrap()).unwrap();

        let b = moderated.table(1).unwrap();
        assert_eq!(b.contrast, "b_vs_rest");
        assert!(b.log_fold_changes[0] > 3.0);
        assert!(b.p_values[0] < 1e-6, "p = {}", b.p_values[0]);
        assert!(b.p_values.iter().skip(1).all(|&p| p > b.p_values[0]));
        assert!(moderated.df_total.iter().all(|&d| d <= 6.0 * n_genes as f64));
    }

    #[test]
    fn test_ebayes_without_residual_df() {
        let labels: Vec<String> = vec!["a".to_string(), "b".to_string()];
        let values = Array2::from_elem((3, 2), 1.0);
        let gene_ids: Vec<String> = (0..3).map(|g| format!("g{}", g)).collect();
        let design = group_design(&labels).unwrap();
        let fit = lm_fit(values.view(), &design.matrix, &gene_ids, &design.levels).unwrap();
        assert!(ebayes(fit).is_err());
    }
}
