//! Parametric empirical-Bayes batch adjustment (ComBat)
//!
//! Johnson, Li & Rabinovic (2007). Each gene is modelled as
//! `y = alpha + X beta + gamma_batch + delta_batch * e`. After
//! standardizing by the pooled fit, batch locations `gamma` get a normal prior
//! and batch scales `delta^2` an inverse-gamma prior, both estimated across
//! genes, and the posterior estimates are removed from the data.

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::ExpressionMatrix;
use crate::error::{ArraySigError, Result};
use crate::linear::{check_full_rank, indicator_matrix, invert_spd};
use crate::stats::{mean, sample_variance};

/// Parameters for [`combat`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatParams {
    /// Adjust batch means only, leaving scales alone
    pub mean_only: bool,
    /// Relative change at which the posterior iteration stops
    pub conv: f64,
    /// Iteration cap for the posterior solution
    pub max_iter: usize,
}

impl Default for CombatParams {
    fn default() -> Self {
        Self {
            mean_only: false,
            conv: 1e-4,
            max_iter: 1000,
        }
    }
}

/// Posterior batch effects for one batch, per gene
#[derive(Debug, Clone)]
struct BatchPosterior {
    gamma_star: Array1<f64>,
    delta_star: Array1<f64>,
}

/// Remove batch effects from a genes x samples matrix
///
/// `batches` gives one batch label per column. `covariate` optionally gives
/// one biological label per column whose effect is preserved. Genes with zero
/// variance inside any batch are returned unchanged.
pub fn combat(
    matrix: &ExpressionMatrix,
    batches: &[String],
    covariate: Option<&[String]>,
    params: &CombatParams,
) -> Result<ExpressionMatrix> {
    let n_samples = matrix.n_cols();
    if batches.len() != n_samples {
        return Err(ArraySigError::DimensionMismatch {
            expected: format!("{} batch labels", n_samples),
            got: format!("{} batch labels", batches.len()),
        });
    }
    if let Some(cov) = covariate {
        if cov.len() != n_samples {
            return Err(ArraySigError::DimensionMismatch {
                expected: format!("{} covariate labels", n_samples),
                got: format!("{} covariate labels", cov.len()),
            });
        }
    }

    let levels = crate::linear::sorted_levels(batches);
    if levels.len() < 2 {
        log::warn!("Only one batch present; skipping batch correction");
        return Ok(matrix.clone());
    }

    let batch_cols: Vec<Vec<usize>> = levels
        .iter()
        .map(|level| (0..n_samples).filter(|&i| &batches[i] == level).collect())
        .collect();
    for (level, cols) in levels.iter().zip(batch_cols.iter()) {
        log::debug!("  batch '{}': {} samples", level, cols.len());
    }

    let mut mean_only = params.mean_only;
    if !mean_only && batch_cols.iter().any(|cols| cols.len() == 1) {
        log::warn!("A batch has a single sample; using mean-only adjustment");
        mean_only = true;
    }

    let design = build_design(batches, &levels, covariate)?;

    // Genes constant within some batch cannot be standardized there
    let values = matrix.values();
    let keep: Vec<usize> = (0..matrix.n_rows())
        .filter(|&g| {
            batch_cols.iter().all(|cols| {
                cols.len() < 2 || {
                    let x: Vec<f64> = cols.iter().map(|&i| values[[g, i]]).collect();
                    sample_variance(&x) > 0.0
                }
            })
        })
        .collect();

    let n_skipped = matrix.n_rows() - keep.len();
    if n_skipped > 0 {
        log::info!(
            "  {} genes with zero variance within a batch are left unadjusted",
            n_skipped
        );
    }
    if keep.len() < 2 {
        log::warn!("Fewer than 2 adjustable genes; skipping batch correction");
        return Ok(matrix.clone());
    }

    let dat = values.select(Axis(0), &keep);
    let adjusted = adjust(&dat, &design, &batch_cols, mean_only, params)?;

    let mut out = values.to_owned();
    for (k, &g) in keep.iter().enumerate() {
        out.row_mut(g).assign(&adjusted.row(k));
    }
    matrix.with_values(out)
}

/// Batch indicators followed by non-reference covariate indicators
fn build_design(
    batches: &[String],
    levels: &[String],
    covariate: Option<&[String]>,
) -> Result<Array2<f64>> {
    let batch_design = indicator_matrix(batches, levels, false);

    let design = match covariate {
        None => batch_design,
        Some(cov) => {
            let mut cov_levels: Vec<String> = Vec::new();
            for label in cov {
                if !cov_levels.contains(label) {
                    cov_levels.push(label.clone());
                }
            }
            let cov_design = indicator_matrix(cov, &cov_levels, true);
            ndarray::concatenate(Axis(1), &[batch_design.view(), cov_design.view()]).map_err(
                |e| ArraySigError::InvalidDesignMatrix {
                    reason: e.to_string(),
                },
            )?
        }
    };

    check_full_rank(&design).map_err(|_| ArraySigError::InvalidDesignMatrix {
        reason: "The covariate is confounded with batch".to_string(),
    })?;
    Ok(design)
}

/// Standardize, estimate priors, solve posteriors and back-transform
fn adjust(
    dat: &Array2<f64>,
    design: &Array2<f64>,
    batch_cols: &[Vec<usize>],
    mean_only: bool,
    params: &CombatParams,
) -> Result<Array2<f64>> {
    let (n_genes, n_samples) = dat.dim();
    let n_batch = batch_cols.len();

    let xtx_inv = invert_spd(&design.t().dot(design))?;
    // Genes x design columns
    let b_hat = dat.dot(design).dot(&xtx_inv);

    let weights: Array1<f64> = batch_cols
        .iter()
        .map(|cols| cols.len() as f64 / n_samples as f64)
        .collect();
    let grand_mean: Array1<f64> = b_hat.slice(ndarray::s![.., ..n_batch]).dot(&weights);

    let fitted = b_hat.dot(&design.t());
    let var_pooled: Array1<f64> = (dat - &fitted)
        .mapv(|r| r * r)
        .mean_axis(Axis(1))
        .ok_or_else(|| ArraySigError::EmptyData {
            reason: "no samples to pool".to_string(),
        })?;

    if var_pooled.iter().any(|&v| !(v > 0.0)) {
        return Err(ArraySigError::NumericalInstability {
            operation: "ComBat standardization".to_string(),
            details: "pooled variance is zero; no residual degrees of freedom".to_string(),
        });
    }

    // Grand mean plus covariate effects
    let mut stand_mean = Array2::<f64>::zeros((n_genes, n_samples));
    for mut col in stand_mean.axis_iter_mut(Axis(1)) {
        col.assign(&grand_mean);
    }
    if design.ncols() > n_batch {
        let cov_part = b_hat
            .slice(ndarray::s![.., n_batch..])
            .dot(&design.slice(ndarray::s![.., n_batch..]).t());
        stand_mean += &cov_part;
    }

    let sd_pooled = var_pooled.mapv(f64::sqrt);
    let s_data = (dat - &stand_mean) / &sd_pooled.view().insert_axis(Axis(1));

    let posteriors = batch_cols
        .iter()
        .enumerate()
        .map(|(b, cols)| {
            let posterior = batch_posterior(&s_data, cols, mean_only, params);
            log::debug!(
                "  batch {}: mean gamma*={:.4}, mean delta*={:.4}",
                b,
                posterior.gamma_star.mean().unwrap_or(f64::NAN),
                posterior.delta_star.mean().unwrap_or(f64::NAN)
            );
            posterior
        })
        .collect::<Vec<_>>();

    let mut adjusted = s_data;
    for (cols, post) in batch_cols.iter().zip(posteriors.iter()) {
        for &i in cols {
            let mut col = adjusted.column_mut(i);
            for g in 0..n_genes {
                col[g] = (col[g] - post.gamma_star[g]) / post.delta_star[g].sqrt();
            }
        }
    }

    adjusted *= &sd_pooled.view().insert_axis(Axis(1));
    adjusted += &stand_mean;
    Ok(adjusted)
}

/// Method-of-moments shape of the inverse-gamma prior
fn aprior(delta_hat: &[f64]) -> f64 {
    let m = mean(delta_hat);
    let s2 = sample_variance(delta_hat);
    (2.0 * s2 + m * m) / s2
}

/// Method-of-moments scale of the inverse-gamma prior
fn bprior(delta_hat: &[f64]) -> f64 {
    let m = mean(delta_hat);
    let s2 = sample_variance(delta_hat);
    (m * s2 + m * m * m) / s2
}

fn postmean(g_hat: f64, g_bar: f64, n: f64, d_star: f64, t2: f64) -> f64 {
    (t2 * n * g_hat + d_star * g_bar) / (t2 * n + d_star)
}

fn postvar(sum2: f64, n: f64, a: f64, b: f64) -> f64 {
    (0.5 * sum2 + b) / (n / 2.0 + a - 1.0)
}

fn relative_change(new: f64, old: f64) -> f64 {
    let diff = (new - old).abs();
    if old != 0.0 {
        diff / old.abs()
    } else {
        diff
    }
}

/// Empirical-Bayes location and scale for the samples `cols` of one batch
fn batch_posterior(
    s_data: &Array2<f64>,
    cols: &[usize],
    mean_only: bool,
    params: &CombatParams,
) -> BatchPosterior {
    let n_genes = s_data.nrows();
    let n = cols.len() as f64;
    let batch_data = s_data.select(Axis(1), cols);

    let gamma_hat: Vec<f64> = batch_data
        .axis_iter(Axis(0))
        .map(|row| row.sum() / n)
        .collect();
    let gamma_bar = mean(&gamma_hat);
    let t2 = sample_variance(&gamma_hat);

    if mean_only {
        let gamma_star = gamma_hat
            .iter()
            .map(|&g| postmean(g, gamma_bar, 1.0, 1.0, t2))
            .collect();
        return BatchPosterior {
            gamma_star,
            delta_star: Array1::ones(n_genes),
        };
    }

    let delta_hat: Vec<f64> = batch_data
        .axis_iter(Axis(0))
        .map(|row| sample_variance(&row.to_vec()))
        .collect();
    let a = aprior(&delta_hat);
    let b = bprior(&delta_hat);

    let mut g_old = gamma_hat.clone();
    let mut d_old = delta_hat.clone();
    let mut converged = false;

    for _ in 0..params.max_iter {
        let updated: Vec<(f64, f64)> = (0..n_genes)
            .into_par_iter()
            .map(|g| {
                let g_new = postmean(gamma_hat[g], gamma_bar, n, d_old[g], t2);
                let sum2: f64 = batch_data.row(g).iter().map(|&x| (x - g_new).powi(2)).sum();
                (g_new, postvar(sum2, n, a, b))
            })
            .collect();

        let change = updated
            .iter()
            .enumerate()
            .map(|(g, &(g_new, d_new))| {
                relative_change(g_new, g_old[g]).max(relative_change(d_new, d_old[g]))
            })
            .fold(0.0, f64::max);

        for (g, (g_new, d_new)) in updated.into_iter().enumerate() {
            g_old[g] = g_new;
            d_old[g] = d_new;
        }

        if change <= params.conv {
            converged = true;
            break;
        }
    }

    if !converged {
        log::warn!(
            "ComBat posterior did not converge within {} iterations",
            params.max_iter
        );
    }

    BatchPosterior {
        gamma_star: Array1::from(g_old),
        delta_star: Array1::from(d_old),
    }
}
