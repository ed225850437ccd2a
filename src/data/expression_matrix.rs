//! Expression matrix representation for microarray data

use std::collections::{HashMap, HashSet};

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{ArraySigError, Result};

/// A real-valued expression matrix
///
/// Rows are probes (before summarization) or gene symbols (after), columns are
/// samples. Row identifiers are unique; this is what makes a gene-level table a
/// valid join key set.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionMatrix {
    /// Expression values (rows x samples)
    values: Array2<f64>,
    /// Probe or gene identifiers
    row_ids: Vec<String>,
    /// Sample identifiers
    col_ids: Vec<String>,
}

impl ExpressionMatrix {
    /// Create a new expression matrix from raw data
    pub fn new(values: Array2<f64>, row_ids: Vec<String>, col_ids: Vec<String>) -> Result<Self> {
        let (n_rows, n_cols) = values.dim();

        if row_ids.len() != n_rows {
            return Err(ArraySigError::DimensionMismatch {
                expected: format!("{} row IDs", n_rows),
                got: format!("{} row IDs", row_ids.len()),
            });
        }

        if col_ids.len() != n_cols {
            return Err(ArraySigError::DimensionMismatch {
                expected: format!("{} sample IDs", n_cols),
                got: format!("{} sample IDs", col_ids.len()),
            });
        }

        if values.iter().any(|x| !x.is_finite()) {
            return Err(ArraySigError::InvalidMatrix {
                reason: "Expression values must be finite".to_string(),
            });
        }

        let mut seen = HashSet::with_capacity(row_ids.len());
        if let Some(dup) = row_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(ArraySigError::InvalidMatrix {
                reason: format!("Duplicate row identifier '{}'", dup),
            });
        }

        let mut seen = HashSet::with_capacity(col_ids.len());
        if let Some(dup) = col_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(ArraySigError::InvalidMatrix {
                reason: format!("Duplicate sample identifier '{}'", dup),
            });
        }

        Ok(Self {
            values,
            row_ids,
            col_ids,
        })
    }

    /// Get the number of rows (probes or genes)
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    /// Get the number of samples
    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }

    /// Get the values as a view
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Get row IDs
    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    /// Get sample IDs
    pub fn col_ids(&self) -> &[String] {
        &self.col_ids
    }

    /// Values for a single row
    pub fn row(&self, row_idx: usize) -> ArrayView1<'_, f64> {
        self.values.row(row_idx)
    }

    /// Get row index by ID
    pub fn row_index(&self, row_id: &str) -> Option<usize> {
        self.row_ids.iter().position(|id| id == row_id)
    }

    /// Get sample index by ID
    pub fn col_index(&self, col_id: &str) -> Option<usize> {
        self.col_ids.iter().position(|id| id == col_id)
    }

    /// Lookup table from row ID to row index
    pub fn row_lookup(&self) -> HashMap<&str, usize> {
        self.row_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect()
    }

    /// Mean value of every row
    pub fn row_means(&self) -> Vec<f64> {
        let n = self.n_cols() as f64;
        self.values
            .axis_iter(Axis(0))
            .map(|row| row.sum() / n)
            .collect()
    }

    /// Subset to specific rows, in the given order
    pub fn subset_rows(&self, row_indices: &[usize]) -> Result<Self> {
        let values = self.values.select(Axis(0), row_indices);
        let row_ids = row_indices.iter().map(|&i| self.row_ids[i].clone()).collect();
        Self::new(values, row_ids, self.col_ids.clone())
    }

    /// Subset to specific samples, in the given order
    pub fn subset_cols(&self, col_indices: &[usize]) -> Result<Self> {
        let values = self.values.select(Axis(1), col_indices);
        let col_ids = col_indices.iter().map(|&i| self.col_ids[i].clone()).collect();
        Self::new(values, self.row_ids.clone(), col_ids)
    }

    /// Subset to named samples, in the given order
    pub fn select_cols_by_name(&self, names: &[String]) -> Result<Self> {
        let indices = names
            .iter()
            .map(|name| {
                self.col_index(name).ok_or_else(|| ArraySigError::InvalidInput {
                    reason: format!("sample '{}' not found in matrix", name),
                })
            })
            .collect::<Result<Vec<usize>>>()?;
        self.subset_cols(&indices)
    }

    /// Subset to named rows, in the given order
    pub fn select_rows_by_name(&self, names: &[String]) -> Result<Self> {
        let lookup = self.row_lookup();
        let indices = names
            .iter()
            .map(|name| {
                lookup.get(name.as_str()).copied().ok_or_else(|| ArraySigError::InvalidInput {
                    reason: format!("row '{}' not found in matrix", name),
                })
            })
            .collect::<Result<Vec<usize>>>()?;
        self.subset_rows(&indices)
    }

    /// Replace the sample identifiers
    pub fn rename_cols(self, col_ids: Vec<String>) -> Result<Self> {
        Self::new(self.values, self.row_ids, col_ids)
    }

    /// Replace the values, keeping identifiers
    pub fn with_values(&self, values: Array2<f64>) -> Result<Self> {
        Self::new(values, self.row_ids.clone(), self.col_ids.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_matrix_creation() {
        let values = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let matrix = ExpressionMatrix::new(values, ids(&["p1", "p2"]), ids(&["s1", "s2", "s3"])).unwrap();
        assert_eq!(matrix.n_rows(), 2);
        assert_eq!(matrix.n_cols(), 3);
        assert_eq!(matrix.row_means(), vec![2.0, 5.0]);
    }

    #[test]
    fn test_duplicate_rows_rejected() {
        let values = array![[1.0], [2.0]];
        let result = ExpressionMatrix::new(values, ids(&["TP53", "TP53"]), ids(&["s1"]));
        assert!(matches!(result, Err(ArraySigError::InvalidMatrix { .. })));
    }

    #[test]
    fn test_non_finite_rejected() {
        let values = array![[1.0, f64::NAN]];
        let result = ExpressionMatrix::new(values, ids(&["p1"]), ids(&["s1", "s2"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_select_cols_by_name_reorders() {
        let values = array![[1.0, 2.0, 3.0]];
        let matrix = ExpressionMatrix::new(values, ids(&["p1"]), ids(&["a", "b", "c"])).unwrap();
        let selected = matrix.select_cols_by_name(&ids(&["c", "a"])).unwrap();
        assert_eq!(selected.col_ids(), &["c", "a"]);
        assert_eq!(selected.values()[[0, 0]], 3.0);
        assert_eq!(selected.values()[[0, 1]], 1.0);

        assert!(matrix.select_cols_by_name(&ids(&["missing"])).is_err());
    }
}
