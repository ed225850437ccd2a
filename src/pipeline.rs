//! End-to-end preprocessing and signature pipeline
//!
//! Normalize each study (cached), collapse probes to genes, join studies,
//! rename samples from the sample table, batch-correct labeled samples,
//! write slices, then build signatures for the reference studies.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::batch::{combat, BatchCovariate};
use crate::config::{PipelineConfig, ReferenceConfig, StudyConfig};
use crate::data::{collapse_to_genes, ExpressionMatrix, SampleTable};
use crate::error::{ArraySigError, Result};
use crate::io::{
    read_annotation, read_expression_matrix, read_raw, read_sample_table, write_de_table,
    write_expression_matrix, write_signature,
};
use crate::merge::{
    align_to_metadata, column_records, inner_join, restrict_to_labeled, slice_group, slice_study,
};
use crate::normalization::normalize;
use crate::signature::build_signature;

/// Per-study counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySummary {
    pub name: String,
    pub n_probes: usize,
    pub n_genes: usize,
    pub n_samples: usize,
    /// Normalized matrix came from the cache
    pub cached: bool,
}

/// Per-contrast selection size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastSummary {
    pub contrast: String,
    pub n_samples: usize,
    pub n_selected: usize,
    pub n_significant: usize,
}

/// Signature built for one reference study
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureSummary {
    pub study: String,
    pub groups: Vec<String>,
    pub n_genes: usize,
    pub contrasts: Vec<ContrastSummary>,
    pub path: PathBuf,
}

/// What a pipeline run produced, written as `run_summary.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub studies: Vec<StudySummary>,
    pub n_combined_genes: usize,
    pub n_combined_samples: usize,
    pub n_labeled_samples: usize,
    pub signatures: Vec<SignatureSummary>,
    /// Every table written, in write order
    pub outputs: Vec<PathBuf>,
}

/// Adjusted p-value cutoff reported in the summary
const SUMMARY_ALPHA: f64 = 0.05;

/// File name component for free-text labels
fn file_component(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

struct OutputWriter {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl OutputWriter {
    fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: Vec::new(),
        })
    }

    /// Reserve an output path; two tables mapping to one file name is an error
    fn path(&mut self, file_name: &str) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        if self.written.contains(&path) {
            return Err(ArraySigError::InvalidInput {
                reason: format!(
                    "output {} would be written twice; labels must stay distinct after mapping to file names",
                    path.display()
                ),
            });
        }
        self.written.push(path.clone());
        Ok(path)
    }

    fn matrix(&mut self, file_name: &str, matrix: &ExpressionMatrix) -> Result<()> {
        let path = self.path(file_name)?;
        log::debug!("  writing {}", path.display());
        write_expression_matrix(&path, matrix)
    }
}

/// Cache file for a study under the configured normalization settings
pub fn cache_path(study: &StudyConfig, config: &PipelineConfig) -> PathBuf {
    let log_tag = if config.log_transform { "" } else { "_nolog" };
    config.cache_dir.join(format!(
        "{}_{}{}_normalized.tsv",
        file_component(&study.name),
        config.normalization.as_str(),
        log_tag
    ))
}

/// Normalized probe-level matrix for a study, reusing the cache when present
pub fn load_or_normalize(study: &StudyConfig, config: &PipelineConfig) -> Result<(ExpressionMatrix, bool)> {
    let cache_path = cache_path(study, config);

    if cache_path.is_file() {
        log::info!("  loading cached {}", cache_path.display());
        return Ok((read_expression_matrix(&cache_path)?, true));
    }

    let raw = read_raw(&study.raw)?;
    log::info!(
        "  read {} probes x {} samples from {}",
        raw.n_rows(),
        raw.n_cols(),
        study.raw.display()
    );
    let normalized = normalize(&raw, config.normalization, config.log_transform)?;

    fs::create_dir_all(&config.cache_dir)?;
    write_expression_matrix(&cache_path, &normalized)?;
    Ok((normalized, false))
}

/// Run every step and write all outputs
pub fn run_pipeline(config: &PipelineConfig) -> Result<RunSummary> {
    config.validate()?;
    let mut out = OutputWriter::new(&config.output_dir)?;

    log::info!("Reading sample table {}", config.metadata.display());
    let samples = read_sample_table(&config.metadata)?;

    // Normalize and collapse each study
    let mut gene_tables = Vec::with_capacity(config.studies.len());
    let mut study_summaries = Vec::with_capacity(config.studies.len());
    for study in &config.studies {
        log::info!("Study {}", study.name);
        let (probes, cached) = load_or_normalize(study, config)?;

        let annotation = read_annotation(&study.annotation, &study.probe_column, &study.symbol_column)?;
        let genes = collapse_to_genes(&probes, &annotation, config.collapse)?;
        log::info!("  {} probes -> {} genes", probes.n_rows(), genes.n_rows());
        out.matrix(&format!("{}_genes.tsv", file_component(&study.name)), &genes)?;

        study_summaries.push(StudySummary {
            name: study.name.clone(),
            n_probes: probes.n_rows(),
            n_genes: genes.n_rows(),
            n_samples: genes.n_cols(),
            cached,
        });
        gene_tables.push(genes);
    }

    // Join and rename
    log::info!("Merging {} studies", gene_tables.len());
    let combined = align_to_metadata(&inner_join(&gene_tables)?, &samples)?;
    drop(gene_tables);
    out.matrix("combined.tsv", &combined)?;

    let labeled = restrict_to_labeled(&combined, &samples, config.label_column)?;
    out.matrix("combined_labeled.tsv", &labeled)?;

    // Batch correction over labeled samples
    log::info!(
        "Batch correction: {} genes x {} samples",
        labeled.n_rows(),
        labeled.n_cols()
    );
    let records = column_records(&labeled, &samples)?;
    let batches: Vec<String> = records.iter().map(|r| r.study.clone()).collect();
    let stages: Vec<String> = records.iter().map(|r| r.stage.clone()).collect();
    let covariate = match config.batch_covariate {
        BatchCovariate::None => None,
        BatchCovariate::Stage => Some(stages.as_slice()),
    };
    let corrected = combat(&labeled, &batches, covariate, &config.combat)?;
    out.matrix("batch_corrected.tsv", &corrected)?;

    write_slices(config, &samples, &combined, &corrected, &mut out)?;

    let mut signatures = Vec::with_capacity(config.reference.len());
    for reference in &config.reference {
        signatures.push(reference_signature(reference, &samples, &corrected, &mut out)?);
    }

    let summary = RunSummary {
        studies: study_summaries,
        n_combined_genes: combined.n_rows(),
        n_combined_samples: combined.n_cols(),
        n_labeled_samples: corrected.n_cols(),
        signatures,
        outputs: out.written.clone(),
    };

    let summary_path = config.output_dir.join("run_summary.json");
    fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;
    log::info!("Wrote {} tables to {}", summary.outputs.len(), config.output_dir.display());

    Ok(summary)
}

/// Per-study and per-(study, group) tables
fn write_slices(
    config: &PipelineConfig,
    samples: &SampleTable,
    combined: &ExpressionMatrix,
    corrected: &ExpressionMatrix,
    out: &mut OutputWriter,
) -> Result<()> {
    let groups = samples.group_levels(config.label_column);

    for study in &config.studies {
        let name = file_component(&study.name);
        match slice_study(combined, samples, &study.name) {
            Ok(slice) => out.matrix(&format!("{}_combined.tsv", name), &slice)?,
            Err(ArraySigError::EmptyData { .. }) => {
                log::warn!("Study {} has no samples in the sample table", study.name);
                continue;
            }
            Err(e) => return Err(e),
        }

        match slice_study(corrected, samples, &study.name) {
            Ok(slice) => out.matrix(&format!("{}_batch_corrected.tsv", name), &slice)?,
            Err(ArraySigError::EmptyData { .. }) => {
                log::warn!("Study {} has no labeled samples", study.name);
                continue;
            }
            Err(e) => return Err(e),
        }

        for group in &groups {
            if let Some(slice) = slice_group(corrected, samples, &study.name, config.label_column, group)? {
                out.matrix(
                    &format!("{}_{}_batch_corrected.tsv", name, file_component(group)),
                    &slice,
                )?;
            }
        }
    }

    Ok(())
}

fn reference_signature(
    reference: &ReferenceConfig,
    samples: &SampleTable,
    corrected: &ExpressionMatrix,
    out: &mut OutputWriter,
) -> Result<SignatureSummary> {
    log::info!(
        "Signature for {} by {} (top {})",
        reference.study,
        reference.group_column,
        reference.params.top_k
    );

    let study = slice_study(corrected, samples, &reference.study)?;
    let study = restrict_to_labeled(&study, samples, reference.group_column)?;
    let labels: Vec<String> = column_records(&study, samples)?
        .iter()
        .filter_map(|r| r.group(reference.group_column).map(str::to_string))
        .collect();

    let signature = build_signature(&study, &labels, &reference.params)?;

    let name = file_component(&reference.study);
    let mut contrasts = Vec::with_capacity(signature.tables.len());
    for (de, selected) in signature.tables.iter().zip(signature.per_contrast.iter()) {
        let path = out.path(&format!("{}_{}_de.tsv", name, file_component(&de.contrast)))?;
        write_de_table(&path, de)?;
        contrasts.push(ContrastSummary {
            contrast: de.contrast.clone(),
            n_samples: labels.len(),
            n_selected: selected.len(),
            n_significant: de.significant_genes(SUMMARY_ALPHA).len(),
        });
    }

    let path = out.path(&format!("{}_signature.txt", name))?;
    write_signature(&path, &signature)?;

    Ok(SignatureSummary {
        study: reference.study.clone(),
        groups: signature.means.col_ids().to_vec(),
        n_genes: signature.genes.len(),
        contrasts,
        path,
    })
}
