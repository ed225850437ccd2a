//! Group signatures from one-vs-rest differential expression
//!
//! Every group is contrasted against the average of the others with a
//! moderated linear model. Genes are ranked per contrast by
//! `|logFC * log10(p)|`, the top genes of all contrasts are pooled, and the
//! signature reports each pooled gene's mean expression per group.

use std::collections::HashSet;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::data::ExpressionMatrix;
use crate::error::{ArraySigError, Result};
use crate::io::DifferentialExpression;
use crate::linear::{contrasts_fit, ebayes, group_design, lm_fit, one_vs_rest_contrasts};

/// Parameters for [`build_signature`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureParams {
    /// Genes taken from each contrast before pooling
    pub top_k: usize,
}

impl Default for SignatureParams {
    fn default() -> Self {
        Self { top_k: 50 }
    }
}

/// Output of the signature step
#[derive(Debug, Clone)]
pub struct Signature {
    /// One table per contrast, in group order
    pub tables: Vec<DifferentialExpression>,
    /// Top genes of each contrast, by rank
    pub per_contrast: Vec<Vec<String>>,
    /// Pooled genes, first-seen order
    pub genes: Vec<String>,
    /// Genes x groups mean expression
    pub means: ExpressionMatrix,
}

/// Unsigned combined effect score
///
/// NaN when either input is NaN; a p-value of zero gives +inf unless the
/// fold change is also zero.
pub fn score(log_fold_change: f64, p_value: f64) -> f64 {
    if log_fold_change.is_nan() || p_value.is_nan() {
        return f64::NAN;
    }
    if log_fold_change == 0.0 {
        return 0.0;
    }
    (log_fold_change * p_value.log10()).abs()
}

/// The `top_k` best-scoring genes of one contrast; NaN scores are never taken
pub fn top_genes(de: &DifferentialExpression, top_k: usize) -> Vec<String> {
    let scores = de.scores();
    de.ranking()
        .into_iter()
        .filter(|&i| !scores[i].is_nan())
        .take(top_k)
        .map(|i| de.gene_ids[i].clone())
        .collect()
}

/// Pool the top genes of every contrast, dropping repeats
pub fn select_top_genes(tables: &[DifferentialExpression], top_k: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    tables
        .iter()
        .flat_map(|de| top_genes(de, top_k))
        .filter(|gene| seen.insert(gene.clone()))
        .collect()
}

/// Mean expression of `genes` within each group
///
/// Columns are the sorted group levels of `labels`, one label per sample.
pub fn group_means(
    matrix: &ExpressionMatrix,
    labels: &[String],
    genes: &[String],
) -> Result<ExpressionMatrix> {
    if labels.len() != matrix.n_cols() {
        return Err(ArraySigError::DimensionMismatch {
            expected: format!("{} sample labels", matrix.n_cols()),
            got: format!("{} sample labels", labels.len()),
        });
    }

    let levels = crate::linear::sorted_levels(labels);
    let rows = matrix.select_rows_by_name(genes)?;
    let values = rows.values();

    let mut means = Array2::zeros((genes.len(), levels.len()));
    for (k, level) in levels.iter().enumerate() {
        let cols: Vec<usize> = (0..labels.len()).filter(|&j| &labels[j] == level).collect();
        let n = cols.len() as f64;
        for g in 0..genes.len() {
            means[[g, k]] = cols.iter().map(|&j| values[[g, j]]).sum::<f64>() / n;
        }
    }

    ExpressionMatrix::new(means, genes.to_vec(), levels)
}

/// Fit, rank, select and summarize one study's samples
pub fn build_signature(
    matrix: &ExpressionMatrix,
    labels: &[String],
    params: &SignatureParams,
) -> Result<Signature> {
    if params.top_k == 0 {
        return Err(ArraySigError::InvalidInput {
            reason: "top_k must be at least 1".to_string(),
        });
    }
    if labels.len() != matrix.n_cols() {
        return Err(ArraySigError::DimensionMismatch {
            expected: format!("{} sample labels", matrix.n_cols()),
            got: format!("{} sample labels", labels.len()),
        });
    }

    let design = group_design(labels)?;
    log::info!(
        "  fitting {} genes over {} samples in {} groups",
        matrix.n_rows(),
        matrix.n_cols(),
        design.levels.len()
    );

    let fit = lm_fit(matrix.values(), &design.matrix, matrix.row_ids(), &design.levels)?;
    let contrasts = one_vs_rest_contrasts(&design.levels)?;
    let moderated = ebayes(contrasts_fit(&fit, &contrasts)?)?;
    let tables = moderated.tables()?;

    let per_contrast: Vec<Vec<String>> = tables.iter().map(|de| top_genes(de, params.top_k)).collect();
    let genes = select_top_genes(&tables, params.top_k);
    if genes.is_empty() {
        return Err(ArraySigError::EmptyData {
            reason: "no gene has a finite score in any contrast".to_string(),
        });
    }
    log::info!("  {} signature genes from {} contrasts", genes.len(), tables.len());

    let means = group_means(matrix, labels, &genes)?;
    Ok(Signature {
        tables,
        per_contrast,
        genes,
        means,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn de(contrast: &str, genes: &[&str], lfc: &[f64], p: &[f64]) -> DifferentialExpression {
        DifferentialExpression {
            contrast: contrast.to_string(),
            gene_ids: genes.iter().map(|s| s.to_string()).collect(),
            log_fold_changes: lfc.to_vec(),
            ave_expr: vec![0.0; genes.len()],
            t: vec![0.0; genes.len()],
            p_values: p.to_vec(),
            adj_p_values: p.to_vec(),
        }
    }

    #[test]
    fn test_score() {
        assert!((score(2.0, 0.01) - 4.0).abs() < 1e-12);
        assert!((score(-2.0, 0.01) - 4.0).abs() < 1e-12);
        assert_eq!(score(1.0, 0.0), f64::INFINITY);
        assert_eq!(score(0.0, 0.0), 0.0);
        assert!(score(f64::NAN, 0.1).is_nan());
        assert!(score(1.0, f64::NAN).is_nan());
    }

    #[test]
    fn test_select_top_genes_dedups_in_order() {
        let a = de("a_vs_rest", &["G1", "G2", "G3"], &[3.0, 1.0, 0.1], &[1e-5, 1e-3, 0.5]);
        let b = de("b_vs_rest", &["G1", "G2", "G3"], &[-0.1, -2.0, 4.0], &[0.9, 1e-4, 1e-6]);

        assert_eq!(top_genes(&a, 2), vec!["G1", "G2"]);
        assert_eq!(top_genes(&b, 2), vec!["G3", "G2"]);
        assert_eq!(select_top_genes(&[a, b], 2), vec!["G1", "G2", "G3"]);
    }

    #[test]
    fn test_top_genes_skips_nan() {
        let a = de("a_vs_rest", &["G1", "G2"], &[f64::NAN, 1.0], &[0.01, 0.01]);
        assert_eq!(top_genes(&a, 5), vec!["G2"]);
    }

    #[test]
    fn test_group_means() {
        let m = ExpressionMatrix::new(
            ndarray::array![[1.0, 3.0, 10.0], [2.0, 2.0, 5.0]],
            vec!["G1".to_string(), "G2".to_string()],
            vec!["s1".to_string(), "s2".to_string(), "s3".to_string()],
        )
        .unwrap();
        let labels = vec!["x".to_string(), "x".to_string(), "w".to_string()];
        let means = group_means(&m, &labels, &["G2".to_string()]).unwrap();
        assert_eq!(means.col_ids(), &["w", "x"]);
        assert_eq!(means.row_ids(), &["G2"]);
        assert_eq!(means.row(0).to_vec(), vec![5.0, 2.0]);
    }

    #[test]
    fn test_build_signature_bounds() {
        let groups = ["a", "a", "a", "b", "b", "b", "c", "c", "c"];
        let labels: Vec<String> = groups.iter().map(|s| s.to_string()).collect();
        let n_genes = 30;
        let mut values = Array2::zeros((n_genes, 9));
        for g in 0..n_genes {
            for j in 0..9 {
                values[[g, j]] = 6.0 + (((g * 9 + j) as f64) * 2.71).sin() * 0.4;
            }
        }
        for j in 0..3 {
            values[[4, j]] += 3.0;
        }
        for j in 6..9 {
            values[[9, j]] -= 3.0;
        }
        let genes: Vec<String> = (0..n_genes).map(|g| format!("G{}", g)).collect();
        let samples: Vec<String> = (0..9).map(|j| format!("s{}", j)).collect();
        let m = ExpressionMatrix::new(values, genes, samples).unwrap();

        let sig = build_signature(&m, &labels, &SignatureParams { top_k: 3 }).unwrap();
        assert_eq!(sig.tables.len(), 3);
        for selected in &sig.per_contrast {
            assert!(selected.len() <= 3);
        }
        assert!(sig.genes.len() <= 9);
        assert!(sig.genes.iter().all(|g| m.row_index(g).is_some()));
        assert_eq!(sig.per_contrast[0][0], "G4");
        assert_eq!(sig.per_contrast[2][0], "G9");
        assert_eq!(sig.means.col_ids(), &["a", "b", "c"]);
        assert_eq!(sig.means.n_rows(), sig.genes.len());
    }

    #[test]
    fn test_build_signature_rejects_zero_top_k() {
        let m = ExpressionMatrix::new(
            ndarray::array![[1.0, 2.0]],
            vec!["G".to_string()],
            vec!["s1".to_string(), "s2".to_string()],
        )
        .unwrap();
        let labels = vec!["a".to_string(), "b".to_string()];
        assert!(build_signature(&m, &labels, &SignatureParams { top_k: 0 }).is_err());
    }
}
