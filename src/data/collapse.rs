//! Collapse probe-level expression to one row per gene symbol

use std::collections::BTreeMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::{ExpressionMatrix, ProbeAnnotation};
use crate::error::{ArraySigError, Result};

/// How probes sharing a gene symbol are reduced to a single row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollapseMethod {
    /// Per-sample maximum over the gene's probes
    #[default]
    MaxValue,
    /// Keep the single probe with the highest mean expression
    MaxMeanProbe,
}

/// Summarize a probe-level matrix to gene level
///
/// Probes without a symbol in `annotation` are dropped. Output rows are the
/// distinct symbols in sorted order, so the result always has unique row ids.
/// Ties under `MaxMeanProbe` go to the probe appearing first in the input.
pub fn collapse_to_genes(
    probes: &ExpressionMatrix,
    annotation: &ProbeAnnotation,
    method: CollapseMethod,
) -> Result<ExpressionMatrix> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, probe) in probes.row_ids().iter().enumerate() {
        if let Some(symbol) = annotation.symbol(probe) {
            groups.entry(symbol).or_default().push(i);
        }
    }

    let n_dropped = probes.n_rows() - groups.values().map(Vec::len).sum::<usize>();
    if n_dropped > 0 {
        log::info!("  dropped {} probes without a gene symbol", n_dropped);
    }

    if groups.is_empty() {
        return Err(ArraySigError::EmptyData {
            reason: "No probes could be mapped to a gene symbol".to_string(),
        });
    }

    let n_cols = probes.n_cols();
    let values = probes.values();
    let mut collapsed = Array2::zeros((groups.len(), n_cols));

    match method {
        CollapseMethod::MaxValue => {
            for (new_i, rows) in groups.values().enumerate() {
                for j in 0..n_cols {
                    collapsed[[new_i, j]] = rows
                        .iter()
                        .map(|&i| values[[i, j]])
                        .fold(f64::NEG_INFINITY, f64::max);
                }
            }
        }
        CollapseMethod::MaxMeanProbe => {
            let means = probes.row_means();
            for (new_i, rows) in groups.values().enumerate() {
                let mut best = rows[0];
                for &i in &rows[1..] {
                    if means[i] > means[best] {
                        best = i;
                    }
                }
                collapsed.row_mut(new_i).assign(&values.row(best));
            }
        }
    }

    let gene_ids: Vec<String> = groups.keys().map(|s| s.to_string()).collect();
    ExpressionMatrix::new(collapsed, gene_ids, probes.col_ids().to_vec())
}
