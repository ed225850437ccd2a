//! Differential expression results and signature output

use std::cmp::Ordering;
use std::path::Path;

use csv::WriterBuilder;
use serde::{Deserialize, Serialize};

use super::tables::write_labeled_matrix;
use crate::error::Result;
use crate::signature::{score, Signature};

/// Moderated-t results for one contrast, in gene order of the fit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifferentialExpression {
    /// Contrast name, e.g. `tumor_vs_rest`
    pub contrast: String,
    pub gene_ids: Vec<String>,
    /// Contrast estimate on the log2 scale
    pub log_fold_changes: Vec<f64>,
    /// Average expression over all samples in the fit
    pub ave_expr: Vec<f64>,
    /// Moderated t statistic
    pub t: Vec<f64>,
    pub p_values: Vec<f64>,
    /// Benjamini-Hochberg adjusted p-values
    pub adj_p_values: Vec<f64>,
}

impl DifferentialExpression {
    /// Get number of genes
    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }

    /// Ranking score per gene, `|logFC * log10(p)|`
    pub fn scores(&self) -> Vec<f64> {
        self.log_fold_changes
            .iter()
            .zip(self.p_values.iter())
            .map(|(&lfc, &p)| score(lfc, p))
            .collect()
    }

    /// Gene indices by decreasing score; NaN scores last, ties in gene order
    pub fn ranking(&self) -> Vec<usize> {
        let scores = self.scores();
        let mut order: Vec<usize> = (0..self.n_genes()).collect();
        order.sort_by(|&a, &b| compare_scores(scores[a], scores[b]));
        order
    }

    /// Genes with adjusted p-value below `alpha`
    pub fn significant_genes(&self, alpha: f64) -> Vec<&str> {
        self.gene_ids
            .iter()
            .zip(self.adj_p_values.iter())
            .filter(|(_, &p)| p.is_finite() && p < alpha)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Descending order with NaN after every number
fn compare_scores(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Write one contrast's table, sorted by score
pub fn write_de_table<P: AsRef<Path>>(path: P, de: &DifferentialExpression) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    writer.write_record(["gene", "logFC", "AveExpr", "t", "P.Value", "adj.P.Val", "score"])?;

    let scores = de.scores();
    for i in de.ranking() {
        writer.write_record(&[
            de.gene_ids[i].clone(),
            de.log_fold_changes[i].to_string(),
            de.ave_expr[i].to_string(),
            de.t[i].to_string(),
            de.p_values[i].to_string(),
            de.adj_p_values[i].to_string(),
            scores[i].to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write a signature: genes as rows, groups as columns, mean expression cells
pub fn write_signature<P: AsRef<Path>>(path: P, signature: &Signature) -> Result<()> {
    write_labeled_matrix(path, "gene", &signature.means)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn table() -> DifferentialExpression {
        DifferentialExpression {
            contrast: "a_vs_rest".to_string(),
            gene_ids: vec!["G1".to_string(), "G2".to_string(), "G3".to_string()],
            log_fold_changes: vec![0.5, -3.0, 1.0],
            ave_expr: vec![5.0, 6.0, 7.0],
            t: vec![1.0, -8.0, f64::NAN],
            p_values: vec![0.1, 1e-4, f64::NAN],
            adj_p_values: vec![0.1, 3e-4, f64::NAN],
        }
    }

    #[test]
    fn test_ranking_puts_nan_last() {
        let de = table();
        assert_eq!(de.ranking(), vec![1, 0, 2]);
        assert_eq!(de.significant_genes(0.05), vec!["G2"]);
    }

    #[test]
    fn test_write_de_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("de.tsv");
        write_de_table(&path, &table()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("gene\tlogFC"));
        assert!(lines[1].starts_with("G2\t-3\t"));
        assert!(lines[3].starts_with("G3\t"));
    }
}
