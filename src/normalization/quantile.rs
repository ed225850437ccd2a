//! Quantile normalization across the samples of one study

use ndarray::{Array2, ArrayView2};

/// Force every sample to share the same empirical distribution
///
/// The target distribution is the mean of the sorted columns. A run of tied
/// values within a column receives the mean of the target quantiles it spans,
/// so the result does not depend on the input order of tied probes.
pub fn quantile_normalize(values: ArrayView2<f64>) -> Array2<f64> {
    let (n_rows, n_cols) = values.dim();
    let mut result = Array2::zeros((n_rows, n_cols));
    if n_rows == 0 || n_cols == 0 {
        return result;
    }

    // Sort order of every column
    let orders: Vec<Vec<usize>> = (0..n_cols)
        .map(|j| {
            let mut order: Vec<usize> = (0..n_rows).collect();
            order.sort_by(|&a, &b| {
                values[[a, j]]
                    .partial_cmp(&values[[b, j]])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            order
        })
        .collect();

    let mut target = vec![0.0; n_rows];
    for (j, order) in orders.iter().enumerate() {
        for (rank, &i) in order.iter().enumerate() {
            target[rank] += values[[i, j]];
        }
    }
    for t in target.iter_mut() {
        *t /= n_cols as f64;
    }

    for (j, order) in orders.iter().enumerate() {
        let mut start = 0;
        while start < n_rows {
            let value = values[[order[start], j]];
            let mut end = start + 1;
            while end < n_rows && values[[order[end], j]] == value {
                end += 1;
            }
            let tied_mean = target[start..end].iter().sum::<f64>() / (end - start) as f64;
            for &i in &order[start..end] {
                result[[i, j]] = tied_mean;
            }
            start = end;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_quantile_normalize_shares_distribution() {
        let values = array![[5.0, 4.0, 3.0], [2.0, 1.0, 4.0], [3.0, 4.5, 6.0], [4.0, 2.0, 8.0]];
        let qn = quantile_normalize(values.view());

        let mut cols: Vec<Vec<f64>> = (0..3)
            .map(|j| {
                let mut c = qn.column(j).to_vec();
                c.sort_by(|a, b| a.partial_cmp(b).unwrap());
                c
            })
            .collect();
        let first = cols.remove(0);
        for c in cols {
            for (a, b) in first.iter().zip(c.iter()) {
                assert!((a - b).abs() < 1e-12);
            }
        }

        // Rank order within a sample is preserved
        assert!(qn[[1, 0]] < qn[[2, 0]]);
        assert!(qn[[2, 0]] < qn[[3, 0]]);
        assert!(qn[[3, 0]] < qn[[0, 0]]);
    }

    #[test]
    fn test_quantile_normalize_ties() {
        let values = array![[1.0, 1.0], [1.0, 2.0], [3.0, 3.0]];
        let qn = quantile_normalize(values.view());
        // Targets: (1+1)/2=1, (1+2)/2=1.5, 3 -> tied pair in column 0 gets 1.25
        assert!((qn[[0, 0]] - 1.25).abs() < 1e-12);
        assert!((qn[[1, 0]] - 1.25).abs() < 1e-12);
        assert!((qn[[2, 0]] - 3.0).abs() < 1e-12);
        assert!((qn[[1, 1]] - 1.5).abs() < 1e-12);
    }
}
