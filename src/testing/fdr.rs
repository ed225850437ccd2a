//! Benjamini-Hochberg false discovery rate adjustment

use std::cmp::Ordering;

/// Benjamini-Hochberg adjusted p-values
///
/// NaN p-values stay NaN and do not count towards the number of tests.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..pvalues.len())
        .filter(|&i| !pvalues[i].is_nan())
        .collect();
    let m = order.len();

    let mut padj = vec![f64::NAN; pvalues.len()];
    if m == 0 {
        return padj;
    }

    order.sort_by(|&a, &b| pvalues[a].partial_cmp(&pvalues[b]).unwrap_or(Ordering::Equal));

    // Walk from the largest p-value down, keeping a running minimum
    let mut running_min = 1.0_f64;
    for (rank0, &i) in order.iter().enumerate().rev() {
        let adjusted = pvalues[i] * m as f64 / (rank0 + 1) as f64;
        running_min = running_min.min(adjusted);
        padj[i] = running_min;
    }

    padj
}
