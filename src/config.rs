//! Pipeline configuration, read from JSON

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::batch::{BatchCovariate, CombatParams};
use crate::data::{CollapseMethod, GroupColumn};
use crate::error::{ArraySigError, Result};
use crate::io::{DEFAULT_PROBE_COLUMN, DEFAULT_SYMBOL_COLUMN};
use crate::normalization::NormalizationMethod;
use crate::signature::SignatureParams;

fn default_probe_column() -> String {
    DEFAULT_PROBE_COLUMN.to_string()
}

fn default_symbol_column() -> String {
    DEFAULT_SYMBOL_COLUMN.to_string()
}

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

/// One input study (a GEO series on one platform)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    /// Study name; must match the study column of the sample table
    pub name: String,
    /// Directory of per-sample files or a probe x sample matrix
    pub raw: PathBuf,
    /// Platform annotation table
    pub annotation: PathBuf,
    #[serde(default = "default_probe_column")]
    pub probe_column: String,
    #[serde(default = "default_symbol_column")]
    pub symbol_column: String,
}

/// A study for which group signatures are built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub study: String,
    #[serde(default)]
    pub group_column: GroupColumn,
    #[serde(flatten)]
    pub params: SignatureParams,
}

/// Full pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub studies: Vec<StudyConfig>,
    /// Six-column sample table
    pub metadata: PathBuf,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub normalization: NormalizationMethod,
    /// Raw intensities need log2 before normalization
    #[serde(default = "default_true")]
    pub log_transform: bool,
    #[serde(default)]
    pub collapse: CollapseMethod,
    /// Label column deciding which samples are kept for batch correction
    #[serde(default)]
    pub label_column: GroupColumn,
    #[serde(default)]
    pub batch_covariate: BatchCovariate,
    #[serde(default)]
    pub combat: CombatParams,
    #[serde(default)]
    pub reference: Vec<ReferenceConfig>,
}

impl PipelineConfig {
    /// Parse from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read and validate a configuration file
    ///
    /// Relative paths in the file are resolved against the file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut config = Self::from_json(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for study in &mut self.studies {
            resolve(&mut study.raw);
            resolve(&mut study.annotation);
        }
        resolve(&mut self.metadata);
        resolve(&mut self.cache_dir);
        resolve(&mut self.output_dir);
    }

    /// Check study names and reference studies
    pub fn validate(&self) -> Result<()> {
        if self.studies.len() < 2 {
            return Err(ArraySigError::InvalidConfig {
                reason: format!("at least 2 studies are required, found {}", self.studies.len()),
            });
        }

        let mut names = HashSet::new();
        for study in &self.studies {
            if study.name.trim().is_empty() {
                return Err(ArraySigError::InvalidConfig {
                    reason: "study names must not be empty".to_string(),
                });
            }
            if !names.insert(study.name.as_str()) {
                return Err(ArraySigError::InvalidConfig {
                    reason: format!("duplicate study name '{}'", study.name),
                });
            }
        }

        for reference in &self.reference {
            if !names.contains(reference.study.as_str()) {
                return Err(ArraySigError::InvalidConfig {
                    reason: format!("reference study '{}' is not a configured study", reference.study),
                });
            }
            if reference.params.top_k == 0 {
                return Err(ArraySigError::InvalidConfig {
                    reason: format!("top_k for '{}' must be at least 1", reference.study),
                });
            }
        }

        if !(self.combat.conv > 0.0) || self.combat.max_iter == 0 {
            return Err(ArraySigError::InvalidConfig {
                reason: "combat.conv must be positive and combat.max_iter at least 1".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "studies": [
            {"name": "GSE1", "raw": "raw/GSE1", "annotation": "GPL570.tsv"},
            {"name": "GSE2", "raw": "raw/GSE2.tsv", "annotation": "GPL96.tsv", "symbol_column": "Symbol"}
        ],
        "metadata": "samples.tsv",
        "reference": [{"study": "GSE2", "top_k": 25}]
    }"#;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_json(MINIMAL).unwrap();
        assert_eq!(config.normalization, NormalizationMethod::Standardize);
        assert!(config.log_transform);
        assert_eq!(config.collapse, CollapseMethod::MaxValue);
        assert_eq!(config.label_column, GroupColumn::Group1);
        assert_eq!(config.batch_covariate, BatchCovariate::None);
        assert_eq!(config.combat, CombatParams::default());
        assert_eq!(config.studies[0].probe_column, "ID");
        assert_eq!(config.studies[0].symbol_column, "Gene Symbol");
        assert_eq!(config.studies[1].symbol_column, "Symbol");
        assert_eq!(config.reference[0].params.top_k, 25);
        assert_eq!(config.reference[0].group_column, GroupColumn::Group1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = PipelineConfig::from_json(MINIMAL).unwrap();
        let back = PipelineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = PipelineConfig::from_json(MINIMAL).unwrap();
        config.reference[0].study = "GSE9".to_string();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::from_json(MINIMAL).unwrap();
        config.studies[1].name = "GSE1".to_string();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::from_json(MINIMAL).unwrap();
        config.studies.truncate(1);
        config.reference.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, MINIMAL).unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.metadata, dir.path().join("samples.tsv"));
        assert_eq!(config.studies[0].raw, dir.path().join("raw/GSE1"));
        assert_eq!(config.output_dir, dir.path().join("output"));
    }
}
