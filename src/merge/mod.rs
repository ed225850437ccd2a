//! Cross-study join, sample renaming and slicing
//!
//! Sample columns arrive named after their raw files (usually starting with
//! a GSM accession) and leave named by the display names of the sample
//! table, in sample table order.

use std::collections::{BTreeSet, HashMap, HashSet};

use ndarray::{concatenate, Axis};

use crate::data::{ExpressionMatrix, GroupColumn, SampleRecord, SampleTable};
use crate::error::{ArraySigError, Result};

/// Inner join of gene-level tables on row id
///
/// Rows present in every table survive, sorted; columns are concatenated in
/// table order.
pub fn inner_join(tables: &[ExpressionMatrix]) -> Result<ExpressionMatrix> {
    let (first, rest) = tables.split_first().ok_or_else(|| ArraySigError::EmptyData {
        reason: "No tables to join".to_string(),
    })?;

    let mut shared: BTreeSet<&str> = first.row_ids().iter().map(String::as_str).collect();
    for table in rest {
        let ids: HashSet<&str> = table.row_ids().iter().map(String::as_str).collect();
        shared.retain(|id| ids.contains(id));
    }

    if shared.is_empty() {
        return Err(ArraySigError::EmptyJoin {
            n_tables: tables.len(),
        });
    }

    let mut seen = HashSet::new();
    for table in tables {
        if let Some(dup) = table.col_ids().iter().find(|c| !seen.insert(c.as_str())) {
            return Err(ArraySigError::InvalidMatrix {
                reason: format!("Sample column '{}' appears in more than one table", dup),
            });
        }
    }

    let genes: Vec<String> = shared.into_iter().map(str::to_string).collect();
    let parts = tables
        .iter()
        .map(|t| t.select_rows_by_name(&genes))
        .collect::<Result<Vec<_>>>()?;

    let views: Vec<_> = parts.iter().map(|p| p.values()).collect();
    let values = concatenate(Axis(1), &views).map_err(|e| ArraySigError::InvalidMatrix {
        reason: format!("cannot concatenate tables: {}", e),
    })?;
    let col_ids = tables.iter().flat_map(|t| t.col_ids().iter().cloned()).collect();

    log::info!(
        "Joined {} tables: {} shared genes, {} samples",
        tables.len(),
        genes.len(),
        values.ncols()
    );
    ExpressionMatrix::new(values, genes, col_ids)
}

/// GEO sample accession at the start of a column name
///
/// `GSM1234_tumor.CEL` gives `GSM1234`; names without a leading accession are
/// returned unchanged.
pub fn accession_from_column(col: &str) -> &str {
    let digits = col
        .strip_prefix("GSM")
        .map(|rest| rest.bytes().take_while(u8::is_ascii_digit).count())
        .unwrap_or(0);
    if digits == 0 {
        col
    } else {
        &col[..3 + digits]
    }
}

/// Reorder and rename columns to follow the sample table
///
/// Columns without a sample table row are dropped.
pub fn align_to_metadata(matrix: &ExpressionMatrix, samples: &SampleTable) -> Result<ExpressionMatrix> {
    let mut by_accession: HashMap<&str, usize> = HashMap::with_capacity(matrix.n_cols());
    for (j, col) in matrix.col_ids().iter().enumerate() {
        let accession = accession_from_column(col);
        if by_accession.insert(accession, j).is_some() {
            return Err(ArraySigError::InvalidMatrix {
                reason: format!("More than one column for sample '{}'", accession),
            });
        }
    }

    let mut indices = Vec::with_capacity(samples.n_samples());
    let mut names = Vec::with_capacity(samples.n_samples());
    let mut missing = Vec::new();
    for record in samples.records() {
        match by_accession.remove(record.accession.as_str()) {
            Some(j) => {
                indices.push(j);
                names.push(record.name.clone());
            }
            None => missing.push(record.accession.as_str()),
        }
    }

    if !by_accession.is_empty() {
        let mut dropped: Vec<&str> = by_accession.keys().copied().collect();
        dropped.sort_unstable();
        log::warn!(
            "Dropping {} samples absent from the sample table: {}",
            dropped.len(),
            dropped.join(", ")
        );
    }
    if !missing.is_empty() {
        log::warn!(
            "{} sample table rows have no expression data: {}",
            missing.len(),
            missing.join(", ")
        );
    }

    if indices.is_empty() {
        return Err(ArraySigError::EmptyData {
            reason: "No expression column matches the sample table".to_string(),
        });
    }

    matrix.subset_cols(&indices)?.rename_cols(names)
}

/// Sample table record of every column, looked up by display name
pub fn column_records<'a>(
    matrix: &ExpressionMatrix,
    samples: &'a SampleTable,
) -> Result<Vec<&'a SampleRecord>> {
    matrix
        .col_ids()
        .iter()
        .map(|name| {
            samples.by_name(name).ok_or_else(|| ArraySigError::InvalidMetadata {
                reason: format!("Sample '{}' is not in the sample table", name),
            })
        })
        .collect()
}

fn select_where<F>(matrix: &ExpressionMatrix, samples: &SampleTable, keep: F) -> Result<Vec<usize>>
where
    F: Fn(&SampleRecord) -> bool,
{
    Ok(column_records(matrix, samples)?
        .into_iter()
        .enumerate()
        .filter(|(_, r)| keep(r))
        .map(|(j, _)| j)
        .collect())
}

/// Keep only samples with a non-empty label in `label`
pub fn restrict_to_labeled(
    matrix: &ExpressionMatrix,
    samples: &SampleTable,
    label: GroupColumn,
) -> Result<ExpressionMatrix> {
    let indices = select_where(matrix, samples, |r| r.group(label).is_some())?;
    if indices.is_empty() {
        return Err(ArraySigError::EmptyData {
            reason: format!("No sample has a {} label", label),
        });
    }

    let dropped = matrix.n_cols() - indices.len();
    if dropped > 0 {
        log::info!("Excluding {} samples without a {} label", dropped, label);
    }
    matrix.subset_cols(&indices)
}

/// Columns belonging to one study
pub fn slice_study(
    matrix: &ExpressionMatrix,
    samples: &SampleTable,
    study: &str,
) -> Result<ExpressionMatrix> {
    let indices = select_where(matrix, samples, |r| r.study == study)?;
    if indices.is_empty() {
        return Err(ArraySigError::EmptyData {
            reason: format!("No samples from study '{}'", study),
        });
    }
    matrix.subset_cols(&indices)
}

/// Columns of one study carrying one group label, `None` when there are none
pub fn slice_group(
    matrix: &ExpressionMatrix,
    samples: &SampleTable,
    study: &str,
    label: GroupColumn,
    group: &str,
) -> Result<Option<ExpressionMatrix>> {
    let indices = select_where(matrix, samples, |r| {
        r.study == study && r.group(label) == Some(group)
    })?;
    if indices.is_empty() {
        return Ok(None);
    }
    matrix.subset_cols(&indices).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn record(acc: &str, name: &str, study: &str, g1: &str) -> SampleRecord {
        SampleRecord {
            accession: acc.to_string(),
            name: name.to_string(),
            study: study.to_string(),
            stage: "I".to_string(),
            group1: g1.to_string(),
            group2: String::new(),
        }
    }

    fn samples() -> SampleTable {
        SampleTable::new(vec![
            record("GSM3", "c_1", "B", "normal"),
            record("GSM1", "a_1", "A", "tumor"),
            record("GSM2", "a_2", "A", ""),
            record("GSM9", "z_9", "C", "tumor"),
        ])
        .unwrap()
    }

    #[test]
    fn test_inner_join() {
        let a = ExpressionMatrix::new(array![[1.0], [2.0], [3.0]], ids(&["TP53", "BRCA1", "MYC"]), ids(&["s1"])).unwrap();
        let b = ExpressionMatrix::new(array![[4.0], [5.0]], ids(&["MYC", "TP53"]), ids(&["s2"])).unwrap();

        let joined = inner_join(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(joined.row_ids(), &["MYC", "TP53"]);
        assert_eq!(joined.col_ids(), &["s1", "s2"]);
        assert_eq!(joined.values(), array![[3.0, 4.0], [1.0, 5.0]]);

        // Every joined gene exists in every input
        for gene in joined.row_ids() {
            assert!(a.row_index(gene).is_some() && b.row_index(gene).is_some());
        }
    }

    #[test]
    fn test_inner_join_errors() {
        let a = ExpressionMatrix::new(array![[1.0]], ids(&["TP53"]), ids(&["s1"])).unwrap();
        let b = ExpressionMatrix::new(array![[1.0]], ids(&["MYC"]), ids(&["s2"])).unwrap();
        assert!(matches!(inner_join(&[a.clone(), b]), Err(ArraySigError::EmptyJoin { n_tables: 2 })));

        let dup = ExpressionMatrix::new(array![[1.0]], ids(&["TP53"]), ids(&["s1"])).unwrap();
        assert!(inner_join(&[a, dup]).is_err());
        assert!(inner_join(&[]).is_err());
    }

    #[test]
    fn test_accession_from_column() {
        assert_eq!(accession_from_column("GSM1234_tumor.CEL"), "GSM1234");
        assert_eq!(accession_from_column("GSM99"), "GSM99");
        assert_eq!(accession_from_column("GSMx"), "GSMx");
        assert_eq!(accession_from_column("sample_1"), "sample_1");
    }

    #[test]
    fn test_align_to_metadata() {
        let m = ExpressionMatrix::new(
            array![[1.0, 2.0, 3.0, 4.0]],
            ids(&["G"]),
            ids(&["GSM1_x.CEL", "GSM2_y.CEL", "GSM3", "GSM7_stray"]),
        )
        .unwrap();

        let aligned = align_to_metadata(&m, &samples()).unwrap();
        assert_eq!(aligned.col_ids(), &["c_1", "a_1", "a_2"]);
        assert_eq!(aligned.row(0).to_vec(), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_restrict_and_slice() {
        let m = ExpressionMatrix::new(array![[1.0, 2.0, 3.0, 4.0]], ids(&["G"]), ids(&["c_1", "a_1", "a_2", "z_9"])).unwrap();
        let table = samples();

        let labeled = restrict_to_labeled(&m, &table, GroupColumn::Group1).unwrap();
        assert_eq!(labeled.col_ids(), &["c_1", "a_1", "z_9"]);
        assert!(restrict_to_labeled(&m, &table, GroupColumn::Group2).is_err());

        let study_a = slice_study(&m, &table, "A").unwrap();
        assert_eq!(study_a.col_ids(), &["a_1", "a_2"]);
        assert!(slice_study(&m, &table, "Q").is_err());

        let tumor_a = slice_group(&labeled, &table, "A", GroupColumn::Group1, "tumor").unwrap().unwrap();
        assert_eq!(tumor_a.col_ids(), &["a_1"]);
        assert!(slice_group(&labeled, &table, "A", GroupColumn::Group1, "normal").unwrap().is_none());
    }

    #[test]
    fn test_column_records_requires_known_names() {
        let m = ExpressionMatrix::new(array![[1.0]], ids(&["G"]), ids(&["unknown"])).unwrap();
        assert!(column_records(&m, &samples()).is_err());
    }
}
