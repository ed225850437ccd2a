//! Per-gene ordinary least squares fits sharing one design

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rayon::prelude::*;

use super::design::ContrastMatrix;
use super::linalg::invert_spd;
use crate::error::{ArraySigError, Result};

/// Result of fitting every gene against the same design
#[derive(Debug, Clone)]
pub struct LinearFit {
    /// Gene identifiers, in input row order
    pub gene_ids: Vec<String>,
    /// Coefficient (or contrast) names
    pub coef_names: Vec<String>,
    /// Genes x coefficients
    pub coefficients: Array2<f64>,
    /// Genes x coefficients; multiply by sigma to get standard errors
    pub stdev_unscaled: Array2<f64>,
    /// Unscaled covariance of the coefficients, (X'X)^-1 or C'(X'X)^-1 C
    pub cov_unscaled: Array2<f64>,
    /// Residual variance per gene (NaN with zero residual df)
    pub sigma2: Vec<f64>,
    /// Residual degrees of freedom per gene
    pub df_residual: Vec<f64>,
    /// Average expression per gene over all samples
    pub amean: Vec<f64>,
}

impl LinearFit {
    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }

    pub fn n_coefs(&self) -> usize {
        self.coef_names.len()
    }
}

/// Fit `y = X b + e` for every row of `values` (genes x samples)
pub fn lm_fit(
    values: ArrayView2<f64>,
    design: &Array2<f64>,
    gene_ids: &[String],
    coef_names: &[String],
) -> Result<LinearFit> {
    let (n_genes, n_samples) = values.dim();
    let n_coefs = design.ncols();

    if design.nrows() != n_samples {
        return Err(ArraySigError::DimensionMismatch {
            expected: format!("{} design rows", n_samples),
            got: format!("{} design rows", design.nrows()),
        });
    }
    if gene_ids.len() != n_genes || coef_names.len() != n_coefs {
        return Err(ArraySigError::DimensionMismatch {
            expected: format!("{} genes and {} coefficient names", n_genes, n_coefs),
            got: format!("{} genes and {} coefficient names", gene_ids.len(), coef_names.len()),
        });
    }

    let xtx = design.t().dot(design);
    let xtx_inv = invert_spd(&xtx).map_err(|_| ArraySigError::InvalidDesignMatrix {
        reason: "X'X is singular; the design is not estimable".to_string(),
    })?;

    // (X'X)^-1 X', coefficients x samples
    let projector = xtx_inv.dot(&design.t());
    let coefficients = values.dot(&projector.t());
    let fitted = coefficients.dot(&design.t());

    let df = n_samples as f64 - n_coefs as f64;
    if df <= 0.0 {
        log::warn!(
            "No residual degrees of freedom ({} samples, {} coefficients); variances are undefined",
            n_samples,
            n_coefs
        );
    }

    let sigma2: Vec<f64> = (0..n_genes)
        .into_par_iter()
        .map(|g| {
            if df <= 0.0 {
                return f64::NAN;
            }
            let rss: f64 = values
                .row(g)
                .iter()
                .zip(fitted.row(g).iter())
                .map(|(y, f)| (y - f).powi(2))
                .sum();
            rss / df
        })
        .collect();

    let unscaled_row: Array1<f64> = xtx_inv.diag().mapv(f64::sqrt);
    let stdev_unscaled = broadcast_rows(&unscaled_row, n_genes);

    let amean = values
        .axis_iter(Axis(0))
        .map(|row| row.sum() / n_samples as f64)
        .collect();

    Ok(LinearFit {
        gene_ids: gene_ids.to_vec(),
        coef_names: coef_names.to_vec(),
        coefficients,
        stdev_unscaled,
        cov_unscaled: xtx_inv,
        sigma2,
        df_residual: vec![df.max(0.0); n_genes],
        amean,
    })
}

/// Re-express a fit in terms of contrasts of its coefficients
pub fn contrasts_fit(fit: &LinearFit, contrasts: &ContrastMatrix) -> Result<LinearFit> {
    if contrasts.matrix.nrows() != fit.n_coefs() {
        return Err(ArraySigError::InvalidContrast {
            reason: format!(
                "contrast matrix has {} rows but the fit has {} coefficients",
                contrasts.matrix.nrows(),
                fit.n_coefs()
            ),
        });
    }

    let coefficients = fit.coefficients.dot(&contrasts.matrix);
    let cov_unscaled = contrasts.matrix.t().dot(&fit.cov_unscaled).dot(&contrasts.matrix);
    let unscaled_row: Array1<f64> = cov_unscaled.diag().mapv(f64::sqrt);
    let stdev_unscaled = broadcast_rows(&unscaled_row, fit.n_genes());

    Ok(LinearFit {
        gene_ids: fit.gene_ids.clone(),
        coef_names: contrasts.names.clone(),
        coefficients,
        stdev_unscaled,
        cov_unscaled,
        sigma2: fit.sigma2.clone(),
        df_residual: fit.df_residual.clone(),
        amean: fit.amean.clone(),
    })
}

fn broadcast_rows(row: &Array1<f64>, n_rows: usize) -> Array2<f64> {
    let mut out = Array2::zeros((n_rows, row.len()));
    for mut r in out.axis_iter_mut(Axis(0)) {
        r.assign(row);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::design::{group_design, one_vs_rest_contrasts};
    use ndarray::array;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cell_means_fit() {
        let labels = names(&["a", "a", "b", "b"]);
        let design = group_design(&labels).unwrap();
        let values = array![[1.0, 3.0, 10.0, 14.0], [0.0, 0.0, 0.0, 0.0]];

        let fit = lm_fit(values.view(), &design.matrix, &names(&["g1", "g2"]), &design.levels).unwrap();

        // Coefficients are group means
        assert!((fit.coefficients[[0, 0]] - 2.0).abs() < 1e-12);
        assert!((fit.coefficients[[0, 1]] - 12.0).abs() < 1e-12);
        // RSS = 2 + 8 = 10 over 2 df
        assert!((fit.sigma2[0] - 5.0).abs() < 1e-12);
        assert_eq!(fit.df_residual[0], 2.0);
        // Each group mean uses 2 samples
        assert!((fit.stdev_unscaled[[0, 0]] - 0.5_f64.sqrt()).abs() < 1e-12);
        assert!((fit.amean[0] - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_contrasts_fit_one_vs_rest() {
        let labels = names(&["a", "a", "b", "b", "c", "c"]);
        let design = group_design(&labels).unwrap();
        let values = array![[1.0, 1.0, 2.0, 2.0, 6.0, 6.0]];
        let fit = lm_fit(values.view(), &design.matrix, &names(&["g"]), &design.levels).unwrap();

        let contrasts = one_vs_rest_contrasts(&design.levels).unwrap();
        let cfit = contrasts_fit(&fit, &contrasts).unwrap();

        assert_eq!(cfit.coef_names, vec!["a_vs_rest", "b_vs_rest", "c_vs_rest"]);
        assert!((cfit.coefficients[[0, 0]] - (1.0 - 4.0)).abs() < 1e-12);
        assert!((cfit.coefficients[[0, 2]] - (6.0 - 1.5)).abs() < 1e-12);
        // var = 1/2 + 2 * (0.25 * 1/2) = 0.75
        assert!((cfit.stdev_unscaled[[0, 0]] - 0.75_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_design_row_mismatch() {
        let design = group_design(&names(&["a", "b"])).unwrap();
        let values = array![[1.0, 2.0, 3.0]];
        assert!(lm_fit(values.view(), &design.matrix, &names(&["g"]), &design.levels).is_err());
    }
}
