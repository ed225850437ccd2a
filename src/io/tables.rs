//! Tab-separated readers and writers for expression data and metadata

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use ndarray::Array2;

use crate::data::{ExpressionMatrix, ProbeAnnotation, SampleRecord, SampleTable};
use crate::error::{ArraySigError, Result};

/// Default probe column of a platform annotation table
pub const DEFAULT_PROBE_COLUMN: &str = "ID";
/// Default symbol column of a platform annotation table
pub const DEFAULT_SYMBOL_COLUMN: &str = "Gene Symbol";

/// Header of the first column in written expression tables
const ROW_ID_HEADER: &str = "id";

const SAMPLE_TABLE_COLUMNS: [&str; 6] = ["accession", "name", "study", "stage", "group1", "group2"];

fn tsv_reader<P: AsRef<Path>>(path: P) -> Result<csv::Reader<fs::File>> {
    let reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .has_headers(true)
        .from_path(path)?;
    Ok(reader)
}

fn parse_value(field: &str, row_id: &str) -> Result<f64> {
    let field = field.trim();
    field.parse::<f64>().map_err(|_| ArraySigError::InvalidMatrix {
        reason: format!("Invalid numeric value '{}' in row '{}'", field, row_id),
    })
}

/// Read an expression matrix: first column row ids, first row sample ids
pub fn read_expression_matrix<P: AsRef<Path>>(path: P) -> Result<ExpressionMatrix> {
    let path = path.as_ref();
    let mut reader = tsv_reader(path)?;

    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(ArraySigError::InvalidMatrix {
            reason: format!("{}: expected an id column and at least one sample", path.display()),
        });
    }
    let col_ids: Vec<String> = headers.iter().skip(1).map(|s| s.trim().to_string()).collect();
    let n_cols = col_ids.len();

    let mut row_ids = Vec::new();
    let mut data = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row_id = record.get(0).unwrap_or_default().trim().to_string();
        for field in record.iter().skip(1) {
            data.push(parse_value(field, &row_id)?);
        }
        row_ids.push(row_id);
    }

    if row_ids.is_empty() {
        return Err(ArraySigError::EmptyData {
            reason: format!("{} has no data rows", path.display()),
        });
    }

    let values = Array2::from_shape_vec((row_ids.len(), n_cols), data).map_err(|e| {
        ArraySigError::InvalidMatrix {
            reason: format!("{}: {}", path.display(), e),
        }
    })?;
    ExpressionMatrix::new(values, row_ids, col_ids)
}

/// Write an expression matrix with the shortest round-trip float formatting
pub fn write_expression_matrix<P: AsRef<Path>>(path: P, matrix: &ExpressionMatrix) -> Result<()> {
    write_labeled_matrix(path, ROW_ID_HEADER, matrix)
}

pub(crate) fn write_labeled_matrix<P: AsRef<Path>>(
    path: P,
    row_header: &str,
    matrix: &ExpressionMatrix,
) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_path(path)?;

    let mut header = Vec::with_capacity(matrix.n_cols() + 1);
    header.push(row_header.to_string());
    header.extend(matrix.col_ids().iter().cloned());
    writer.write_record(&header)?;

    for (i, row_id) in matrix.row_ids().iter().enumerate() {
        let mut fields = Vec::with_capacity(matrix.n_cols() + 1);
        fields.push(row_id.clone());
        fields.extend(matrix.row(i).iter().map(|v| v.to_string()));
        writer.write_record(&fields)?;
    }

    writer.flush()?;
    Ok(())
}

/// Read the six-column sample table
///
/// Columns are matched by position; the header row is required but its
/// labels are not checked beyond the column count.
pub fn read_sample_table<P: AsRef<Path>>(path: P) -> Result<SampleTable> {
    let path = path.as_ref();
    let mut reader = tsv_reader(path)?;

    let n_header = reader.headers()?.len();
    if n_header != SAMPLE_TABLE_COLUMNS.len() {
        return Err(ArraySigError::InvalidMetadata {
            reason: format!(
                "{}: expected {} columns ({}), found {}",
                path.display(),
                SAMPLE_TABLE_COLUMNS.len(),
                SAMPLE_TABLE_COLUMNS.join(", "),
                n_header
            ),
        });
    }

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = |k: usize| record.get(k).unwrap_or_default().trim().to_string();
        records.push(SampleRecord {
            accession: field(0),
            name: field(1),
            study: field(2),
            stage: field(3),
            group1: field(4),
            group2: field(5),
        });
    }

    if records.is_empty() {
        return Err(ArraySigError::EmptyData {
            reason: format!("{} lists no samples", path.display()),
        });
    }

    SampleTable::new(records)
}

fn column_position(headers: &StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| ArraySigError::InvalidAnnotation {
            reason: format!("{}: column '{}' not found", path.display(), name),
        })
}

/// Read a platform annotation table mapping probes to gene symbols
pub fn read_annotation<P: AsRef<Path>>(
    path: P,
    probe_column: &str,
    symbol_column: &str,
) -> Result<ProbeAnnotation> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let probe_idx = column_position(&headers, probe_column, path)?;
    let symbol_idx = column_position(&headers, symbol_column, path)?;

    let mut pairs = Vec::new();
    for record in reader.records() {
        let record = record?;
        let probe = record.get(probe_idx).unwrap_or_default().trim();
        if probe.is_empty() {
            continue;
        }
        let symbol = record.get(symbol_idx).unwrap_or_default().trim();
        pairs.push((probe.to_string(), symbol.to_string()));
    }

    let annotation = ProbeAnnotation::from_pairs(pairs);
    if annotation.is_empty() {
        return Err(ArraySigError::InvalidAnnotation {
            reason: format!("{} maps no probe to a gene symbol", path.display()),
        });
    }
    log::debug!("{}: {} annotated probes", path.display(), annotation.len());
    Ok(annotation)
}

/// Read raw intensities from a directory of per-sample files or a matrix file
pub fn read_raw<P: AsRef<Path>>(path: P) -> Result<ExpressionMatrix> {
    let path = path.as_ref();
    if path.is_dir() {
        read_raw_dir(path)
    } else {
        read_expression_matrix(path)
    }
}

/// Read a directory of two-column (probe, intensity) files, one per sample
///
/// Files are taken in name order and each file stem becomes a sample column.
/// Every file must measure the same probes; rows follow the first file.
pub fn read_raw_dir<P: AsRef<Path>>(dir: P) -> Result<ExpressionMatrix> {
    let dir = dir.as_ref();
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| !n.starts_with('.'))
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(ArraySigError::EmptyData {
            reason: format!("no sample files in {}", dir.display()),
        });
    }

    let mut probe_ids: Vec<String> = Vec::new();
    let mut probe_index: HashMap<String, usize> = HashMap::new();
    let mut sample_ids = Vec::with_capacity(files.len());
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(files.len());

    for (k, file) in files.iter().enumerate() {
        let sample = file
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| ArraySigError::InvalidInput {
                reason: format!("unusable file name {}", file.display()),
            })?;

        let mut reader = tsv_reader(file)?;
        let mut column = if k == 0 {
            Vec::new()
        } else {
            vec![f64::NAN; probe_ids.len()]
        };
        let mut seen = vec![false; probe_ids.len()];

        for record in reader.records() {
            let record = record?;
            let probe = record.get(0).unwrap_or_default().trim().to_string();
            let value = parse_value(record.get(1).unwrap_or_default(), &probe)?;

            if k == 0 {
                if probe_index.insert(probe.clone(), probe_ids.len()).is_some() {
                    return Err(ArraySigError::InvalidMatrix {
                        reason: format!("{}: duplicate probe '{}'", file.display(), probe),
                    });
                }
                probe_ids.push(probe);
                column.push(value);
            } else {
                let i = *probe_index.get(&probe).ok_or_else(|| ArraySigError::InvalidMatrix {
                    reason: format!("{}: probe '{}' not in {}", file.display(), probe, files[0].display()),
                })?;
                if std::mem::replace(&mut seen[i], true) {
                    return Err(ArraySigError::InvalidMatrix {
                        reason: format!("{}: duplicate probe '{}'", file.display(), probe),
                    });
                }
                column[i] = value;
            }
        }

        if let Some(i) = column.iter().position(|v| v.is_nan()) {
            return Err(ArraySigError::InvalidMatrix {
                reason: format!("{}: missing probe '{}'", file.display(), probe_ids[i]),
            });
        }

        sample_ids.push(sample);
        columns.push(column);
    }

    let n_probes = probe_ids.len();
    if n_probes == 0 {
        return Err(ArraySigError::EmptyData {
            reason: format!("{} has no probes", files[0].display()),
        });
    }

    let mut values = Array2::zeros((n_probes, columns.len()));
    for (j, column) in columns.iter().enumerate() {
        for (i, &v) in column.iter().enumerate() {
            values[[i, j]] = v;
        }
    }

    log::debug!("{}: {} probes x {} samples", dir.display(), n_probes, sample_ids.len());
    ExpressionMatrix::new(values, probe_ids, sample_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_matrix_roundtrip_is_exact() {
        let values = ndarray::array![[0.1, 1.0 / 3.0], [-2.5e-8, 12345.678]];
        let matrix = ExpressionMatrix::new(
            values.clone(),
            vec!["A".to_string(), "B".to_string()],
            vec!["s1".to_string(), "s2".to_string()],
        )
        .unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("m.tsv");
        write_expression_matrix(&path, &matrix).unwrap();
        let back = read_expression_matrix(&path).unwrap();
        assert_eq!(back, matrix);

        let first = fs::read(&path).unwrap();
        write_expression_matrix(&path, &back).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn test_read_matrix_skips_comments() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# exported from GEO").unwrap();
        writeln!(file, "ID_REF\tGSM1\tGSM2").unwrap();
        writeln!(file, "p1\t100\t200").unwrap();
        writeln!(file, "p2\t50.5\t75").unwrap();

        let matrix = read_expression_matrix(file.path()).unwrap();
        assert_eq!(matrix.n_rows(), 2);
        assert_eq!(matrix.col_ids(), &["GSM1", "GSM2"]);
        assert_eq!(matrix.values()[[1, 0]], 50.5);
    }

    #[test]
    fn test_read_matrix_rejects_text() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id\ts1").unwrap();
        writeln!(file, "p1\thigh").unwrap();
        assert!(read_expression_matrix(file.path()).is_err());
    }

    #[test]
    fn test_read_sample_table() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "accession\tname\tstudy\tstage\tgroup1\tgroup2").unwrap();
        writeln!(file, "GSM1\tctl_1\tS1\tearly\tcontrol\t").unwrap();
        writeln!(file, "GSM2\ttum_1\tS1\tlate\t\t").unwrap();

        let table = read_sample_table(file.path()).unwrap();
        assert_eq!(table.n_samples(), 2);
        assert_eq!(table.display_name("GSM2"), Some("tum_1"));
        assert_eq!(table.by_accession("GSM1").unwrap().group1, "control");
        assert_eq!(table.labeled(crate::data::GroupColumn::Group1).len(), 1);
    }

    #[test]
    fn test_read_sample_table_wrong_columns() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "accession\tname\tstudy").unwrap();
        writeln!(file, "GSM1\tctl_1\tS1").unwrap();
        assert!(read_sample_table(file.path()).is_err());
    }

    #[test]
    fn test_read_annotation_columns() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "#ID = probe identifier").unwrap();
        writeln!(file, "ID\tGB_ACC\tGene Symbol").unwrap();
        writeln!(file, "1007_s_at\tU48705\tDDR1 /// MIR4640").unwrap();
        writeln!(file, "1053_at\tM87338\tRFC2").unwrap();
        writeln!(file, "AFFX-BioB\t\t").unwrap();

        let annotation = read_annotation(file.path(), DEFAULT_PROBE_COLUMN, DEFAULT_SYMBOL_COLUMN).unwrap();
        assert_eq!(annotation.symbol("1007_s_at"), Some("DDR1"));
        assert_eq!(annotation.symbol("1053_at"), Some("RFC2"));
        assert_eq!(annotation.symbol("AFFX-BioB"), None);

        assert!(read_annotation(file.path(), "ID", "Symbol").is_err());
    }

    #[test]
    fn test_read_raw_dir() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("GSM2_b.txt"), "probe_id\tintensity\np2\t20\np1\t10\n").unwrap();
        fs::write(dir.path().join("GSM1_a.txt"), "probe_id\tintensity\np1\t1\np2\t2\n").unwrap();

        let matrix = read_raw(dir.path()).unwrap();
        assert_eq!(matrix.col_ids(), &["GSM1_a", "GSM2_b"]);
        assert_eq!(matrix.row_ids(), &["p1", "p2"]);
        assert_eq!(matrix.values()[[0, 1]], 10.0);
        assert_eq!(matrix.values()[[1, 1]], 20.0);
    }

    #[test]
    fn test_read_raw_dir_probe_mismatch() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "probe_id\tintensity\np1\t1\np2\t2\n").unwrap();
        fs::write(dir.path().join("b.txt"), "probe_id\tintensity\np1\t1\n").unwrap();
        assert!(read_raw_dir(dir.path()).is_err());
    }

    #[test]
    fn test_read_raw_dir_duplicate_probe_in_later_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "probe_id\tintensity\np1\t1\np2\t2\n").unwrap();
        fs::write(dir.path().join("b.txt"), "probe_id\tintensity\np1\t5\np2\t6\np1\t999\n").unwrap();

        match read_raw_dir(dir.path()) {
            Err(ArraySigError::InvalidMatrix { reason }) => assert!(reason.contains("duplicate probe 'p1'")),
            other => panic!("expected duplicate probe error, got {:?}", other.map(|m| m.n_cols())),
        }
    }
}
