//! Sample-wise transformations: log2 and per-sample standardization

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{ArraySigError, Result};

/// Intensities below this are floored before taking log2
pub const LOG2_FLOOR: f64 = 1.0;

/// log2 of raw intensities, flooring at `LOG2_FLOOR`
pub fn log2_intensities(raw: ArrayView2<f64>) -> Array2<f64> {
    raw.mapv(|x| x.max(LOG2_FLOOR).log2())
}

/// Center every sample to mean 0 and scale to unit standard deviation
///
/// Each column is transformed using only its own values, so adding or removing
/// samples never changes the normalized values of the others.
pub fn standardize_samples(logged: ArrayView2<f64>) -> Result<Array2<f64>> {
    let n_rows = logged.nrows();
    if n_rows < 2 {
        return Err(ArraySigError::EmptyData {
            reason: "Standardization needs at least 2 probes per sample".to_string(),
        });
    }

    let mut result = logged.to_owned();
    for (j, mut col) in result.axis_iter_mut(Axis(1)).enumerate() {
        let mean = col.sum() / n_rows as f64;
        let var = col.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n_rows as f64 - 1.0);
        let sd = var.sqrt();

        if !(sd > 0.0) || !sd.is_finite() {
            return Err(ArraySigError::NumericalInstability {
                operation: "sample standardization".to_string(),
                details: format!("sample {} has zero variance", j),
            });
        }

        log::debug!("sample {}: mean={:.6}, sd={:.6}", j, mean, sd);
        col.mapv_inplace(|x| (x - mean) / sd);
    }

    Ok(result)
}
