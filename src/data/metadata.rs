//! Sample metadata: accession, display name, study, stage and group labels

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{ArraySigError, Result};

/// Which of the two free-text group label columns to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupColumn {
    #[default]
    Group1,
    Group2,
}

impl std::fmt::Display for GroupColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupColumn::Group1 => write!(f, "group1"),
            GroupColumn::Group2 => write!(f, "group2"),
        }
    }
}

impl std::str::FromStr for GroupColumn {
    type Err = ArraySigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "group1" => Ok(GroupColumn::Group1),
            "group2" => Ok(GroupColumn::Group2),
            other => Err(ArraySigError::InvalidInput {
                reason: format!("Unknown group column '{}'. Use 'group1' or 'group2'.", other),
            }),
        }
    }
}

/// One row of the sample table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// GEO sample accession (GSM...)
    pub accession: String,
    /// Human-readable sample name used as the column name downstream
    pub name: String,
    /// Study of origin; used as the batch
    pub study: String,
    /// Ordered developmental or disease stage
    pub stage: String,
    pub group1: String,
    pub group2: String,
}

impl SampleRecord {
    /// Group label in the given column, `None` when empty
    pub fn group(&self, column: GroupColumn) -> Option<&str> {
        let label = match column {
            GroupColumn::Group1 => self.group1.as_str(),
            GroupColumn::Group2 => self.group2.as_str(),
        };
        if label.trim().is_empty() {
            None
        } else {
            Some(label)
        }
    }
}

/// Sample metadata table, in file order
#[derive(Debug, Clone)]
pub struct SampleTable {
    records: Vec<SampleRecord>,
    by_accession: HashMap<String, usize>,
}

impl SampleTable {
    /// Create a sample table; accessions and display names must be unique
    pub fn new(records: Vec<SampleRecord>) -> Result<Self> {
        let mut by_accession = HashMap::with_capacity(records.len());
        let mut names = HashSet::with_capacity(records.len());

        for (i, record) in records.iter().enumerate() {
            if record.accession.is_empty() {
                return Err(ArraySigError::InvalidMetadata {
                    reason: format!("Row {} has an empty accession", i + 1),
                });
            }
            if by_accession.insert(record.accession.clone(), i).is_some() {
                return Err(ArraySigError::InvalidMetadata {
                    reason: format!("Duplicate accession '{}'", record.accession),
                });
            }
            if !names.insert(record.name.as_str()) {
                return Err(ArraySigError::InvalidMetadata {
                    reason: format!("Duplicate display name '{}'", record.name),
                });
            }
        }

        Ok(Self {
            records,
            by_accession,
        })
    }

    /// All records in file order
    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    /// Get number of samples
    pub fn n_samples(&self) -> usize {
        self.records.len()
    }

    /// Look up a record by GSM accession
    pub fn by_accession(&self, accession: &str) -> Option<&SampleRecord> {
        self.by_accession.get(accession).map(|&i| &self.records[i])
    }

    /// Look up a record by display name
    pub fn by_name(&self, name: &str) -> Option<&SampleRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Display name for an accession
    pub fn display_name(&self, accession: &str) -> Option<&str> {
        self.by_accession(accession).map(|r| r.name.as_str())
    }

    /// Records with a non-empty label in `column`, in file order
    pub fn labeled(&self, column: GroupColumn) -> Vec<&SampleRecord> {
        self.records
            .iter()
            .filter(|r| r.group(column).is_some())
            .collect()
    }

    /// Stage levels in order of first appearance
    pub fn stage_levels(&self) -> Vec<String> {
        let mut levels: Vec<String> = Vec::new();
        for record in &self.records {
            if !levels.contains(&record.stage) {
                levels.push(record.stage.clone());
            }
        }
        levels
    }

    /// Unique non-empty group labels (sorted)
    pub fn group_levels(&self, column: GroupColumn) -> Vec<String> {
        let mut unique: Vec<String> = self
            .records
            .iter()
            .filter_map(|r| r.group(column).map(str::to_string))
            .collect();
        unique.sort();
        unique.dedup();
        unique
    }
}
