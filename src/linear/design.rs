//! Design and contrast matrices for group comparisons

use ndarray::Array2;

use super::linalg::column_rank;
use crate::error::{ArraySigError, Result};

/// Cell-means design: one indicator column per group, no intercept
#[derive(Debug, Clone)]
pub struct GroupDesign {
    /// Samples x groups indicator matrix
    pub matrix: Array2<f64>,
    /// Group levels, sorted; column `k` of `matrix` is `levels[k]`
    pub levels: Vec<String>,
}

/// Contrast matrix over the coefficients of a design
#[derive(Debug, Clone)]
pub struct ContrastMatrix {
    /// Coefficients x contrasts
    pub matrix: Array2<f64>,
    /// One name per contrast column
    pub names: Vec<String>,
}

/// Sorted unique levels of a label vector
pub fn sorted_levels(labels: &[String]) -> Vec<String> {
    let mut levels = labels.to_vec();
    levels.sort();
    levels.dedup();
    levels
}

/// Indicator columns for `labels` against `levels`
///
/// With `drop_first` the first level is the reference and gets no column,
/// which is how covariates are coded next to batch indicators.
pub fn indicator_matrix(labels: &[String], levels: &[String], drop_first: bool) -> Array2<f64> {
    let skip = usize::from(drop_first);
    let n_cols = levels.len().saturating_sub(skip);
    let mut matrix = Array2::zeros((labels.len(), n_cols));

    for (i, label) in labels.iter().enumerate() {
        if let Some(k) = levels.iter().position(|l| l == label) {
            if k >= skip {
                matrix[[i, k - skip]] = 1.0;
            }
        }
    }
    matrix
}

/// Build the `~0 + group` design for a vector of sample labels
pub fn group_design(labels: &[String]) -> Result<GroupDesign> {
    if labels.is_empty() {
        return Err(ArraySigError::InvalidDesignMatrix {
            reason: "No samples to build a design from".to_string(),
        });
    }

    let levels = sorted_levels(labels);
    if levels.len() < 2 {
        return Err(ArraySigError::InvalidDesignMatrix {
            reason: format!(
                "At least 2 groups are needed for contrasts, found {:?}",
                levels
            ),
        });
    }

    let matrix = indicator_matrix(labels, &levels, false);
    check_full_rank(&matrix)?;

    Ok(GroupDesign { matrix, levels })
}

/// One-vs-rest contrasts for a cell-means design
///
/// Column `k` estimates `level_k - mean(all other levels)`.
pub fn one_vs_rest_contrasts(levels: &[String]) -> Result<ContrastMatrix> {
    let n = levels.len();
    if n < 2 {
        return Err(ArraySigError::InvalidContrast {
            reason: "One-vs-rest contrasts need at least 2 levels".to_string(),
        });
    }

    let rest_weight = -1.0 / (n - 1) as f64;
    let mut matrix = Array2::from_elem((n, n), rest_weight);
    for k in 0..n {
        matrix[[k, k]] = 1.0;
    }

    let names = levels.iter().map(|l| format!("{}_vs_rest", l)).collect();
    Ok(ContrastMatrix { matrix, names })
}

/// Error unless the design has full column rank
pub fn check_full_rank(matrix: &Array2<f64>) -> Result<()> {
    let (nrow, ncol) = matrix.dim();
    if nrow == 0 || ncol == 0 {
        return Err(ArraySigError::InvalidDesignMatrix {
            reason: "Design matrix has zero rows or columns".to_string(),
        });
    }

    let has_zero_column = (0..ncol).any(|j| matrix.column(j).iter().all(|&v| v == 0.0));
    if has_zero_column {
        return Err(ArraySigError::InvalidDesignMatrix {
            reason: "the design matrix has a column of zeros: a level has no samples".to_string(),
        });
    }

    let rank = column_rank(matrix.view());
    if rank < ncol {
        return Err(ArraySigError::InvalidDesignMatrix {
            reason: format!(
                "the design matrix is not full rank ({} of {} columns): \
                 some terms are linear combinations of others",
                rank, ncol
            ),
        });
    }

    Ok(())
}
