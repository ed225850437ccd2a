//! Small dense linear algebra helpers for design-sized systems
//!
//! Designs here have a handful of columns (groups, batches, stages), so a
//! plain Cholesky factorization of X'X is all that is needed.

use ndarray::{Array2, ArrayView2};

use crate::error::{ArraySigError, Result};

/// Relative tolerance below which a pivot is treated as zero
const RANK_TOL: f64 = 1e-10;

/// Lower-triangular Cholesky factor of a symmetric positive definite matrix
fn cholesky(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return Err(ArraySigError::NumericalInstability {
                        operation: "Cholesky factorization".to_string(),
                        details: format!("matrix is not positive definite at pivot {}", i),
                    });
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    Ok(l)
}

fn cholesky_solve_factored(l: &Array2<f64>, b: &[f64]) -> Vec<f64> {
    let n = l.nrows();

    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[[i, j]] * y[j];
        }
        y[i] = sum / l[[i, i]];
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[[j, i]] * x[j];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}

/// Inverse of a symmetric positive definite matrix
pub fn invert_spd(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let l = cholesky(a)?;
    let mut inv = Array2::zeros((n, n));
    for i in 0..n {
        let mut e = vec![0.0; n];
        e[i] = 1.0;
        let col = cholesky_solve_factored(&l, &e);
        for j in 0..n {
            inv[[j, i]] = col[j];
        }
    }
    Ok(inv)
}

/// Numerical column rank by modified Gram-Schmidt
pub fn column_rank(matrix: ArrayView2<f64>) -> usize {
    let (nrow, ncol) = matrix.dim();
    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(ncol);

    let scale = matrix
        .columns()
        .into_iter()
        .map(|c| c.iter().map(|v| v * v).sum::<f64>().sqrt())
        .fold(0.0, f64::max);
    if scale == 0.0 {
        return 0;
    }

    for j in 0..ncol {
        let mut v: Vec<f64> = matrix.column(j).to_vec();
        for q in &basis {
            let dot: f64 = v.iter().zip(q.iter()).map(|(a, b)| a * b).sum();
            for i in 0..nrow {
                v[i] -= dot * q[i];
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > RANK_TOL * scale {
            basis.push(v.into_iter().map(|x| x / norm).collect());
        }
    }

    basis.len()
}
