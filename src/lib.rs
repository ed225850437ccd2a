//! rust_arraysig: microarray preprocessing and group signatures in Rust
//!
//! Normalizes raw intensities of several GEO studies, collapses probes to
//! gene symbols, joins the studies, removes the study batch effect with
//! ComBat and derives one-vs-rest group signatures from a moderated linear
//! model.
//!
//! # Example
//!
//! ```ignore
//! use rust_arraysig::prelude::*;
//!
//! let config = PipelineConfig::from_file("pipeline.json")?;
//! let summary = run_pipeline(&config)?;
//! println!("{} shared genes", summary.n_combined_genes);
//! ```

pub mod batch;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod linear;
pub mod merge;
pub mod normalization;
pub mod pipeline;
pub mod signature;
pub mod stats;
pub mod testing;

pub use pipeline::run_pipeline;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::batch::{combat, BatchCovariate, CombatParams};
    pub use crate::config::{PipelineConfig, ReferenceConfig, StudyConfig};
    pub use crate::data::{
        collapse_to_genes, CollapseMethod, ExpressionMatrix, GroupColumn, ProbeAnnotation,
        SampleRecord, SampleTable,
    };
    pub use crate::error::{ArraySigError, Result};
    pub use crate::io::{
        read_annotation, read_expression_matrix, read_raw, read_sample_table, write_de_table,
        write_expression_matrix, write_signature, DifferentialExpression,
    };
    pub use crate::linear::{contrasts_fit, ebayes, group_design, lm_fit, one_vs_rest_contrasts};
    pub use crate::merge::{
        accession_from_column, align_to_metadata, column_records, inner_join, restrict_to_labeled,
        slice_group, slice_study,
    };
    pub use crate::normalization::{normalize, NormalizationMethod};
    pub use crate::pipeline::{run_pipeline, RunSummary};
    pub use crate::signature::{build_signature, Signature, SignatureParams};
    pub use crate::testing::benjamini_hochberg;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use ndarray::Array2;

    #[test]
    fn test_join_correct_and_sign() {
        // Two studies on different scales, same 12 genes, groups x and y
        let genes: Vec<String> = (0..12).map(|g| format!("G{:02}", g)).collect();
        let make = |offset: f64, prefix: &str| {
            let mut values = Array2::zeros((12, 6));
            for g in 0..12 {
                for j in 0..6 {
                    let noise = (((g * 6 + j) as f64) * 1.3 + offset).sin() * 0.2;
                    let effect = if g == 5 && j % 2 == 0 { 2.0 } else { 0.0 };
                    values[[g, j]] = 4.0 + offset + noise + effect;
                }
            }
            let cols = (0..6).map(|j| format!("{}{}", prefix, j)).collect();
            ExpressionMatrix::new(values, genes.clone(), cols).unwrap()
        };

        let joined = inner_join(&[make(0.0, "a"), make(3.0, "b")]).unwrap();
        let batches: Vec<String> = (0..12).map(|j| if j < 6 { "A" } else { "B" }.to_string()).collect();
        let corrected = combat(&joined, &batches, None, &CombatParams::default()).unwrap();

        let v = corrected.values();
        let gap = v.slice(ndarray::s![.., 6..]).mean().unwrap() - v.slice(ndarray::s![.., ..6]).mean().unwrap();
        assert!(gap.abs() < 0.3, "gap = {}", gap);

        let labels: Vec<String> = (0..12).map(|j| if j % 2 == 0 { "x" } else { "y" }.to_string()).collect();
        let signature = build_signature(&corrected, &labels, &SignatureParams { top_k: 2 }).unwrap();
        assert!(signature.genes.contains(&"G05".to_string()));
        assert_eq!(signature.means.col_ids(), &["x", "y"]);
    }
}
