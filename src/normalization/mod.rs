//! Per-study normalization of raw microarray intensities

mod per_sample;
mod quantile;

pub use per_sample::{log2_intensities, standardize_samples, LOG2_FLOOR};
pub use quantile::quantile_normalize;

use serde::{Deserialize, Serialize};

use crate::data::ExpressionMatrix;
use crate::error::{ArraySigError, Result};

/// Normalization applied to a study's probe-level intensities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationMethod {
    /// Log2, then each sample independently centered and scaled
    #[default]
    Standardize,
    /// Log2, then quantile normalization across the study's samples
    Quantile,
    /// Log2 only
    Log2,
}

impl NormalizationMethod {
    /// Lowercase name, as accepted by `FromStr`
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizationMethod::Standardize => "standardize",
            NormalizationMethod::Quantile => "quantile",
            NormalizationMethod::Log2 => "log2",
        }
    }
}

impl std::str::FromStr for NormalizationMethod {
    type Err = ArraySigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standardize" => Ok(NormalizationMethod::Standardize),
            "quantile" => Ok(NormalizationMethod::Quantile),
            "log2" => Ok(NormalizationMethod::Log2),
            other => Err(ArraySigError::InvalidInput {
                reason: format!(
                    "Unknown normalization method '{}'. Use: standardize, quantile, or log2",
                    other
                ),
            }),
        }
    }
}

/// Normalize a probe-level intensity matrix
///
/// When `log_transform` is false the input is taken to be on log scale already
/// and only the method's between-sample step is applied.
pub fn normalize(
    raw: &ExpressionMatrix,
    method: NormalizationMethod,
    log_transform: bool,
) -> Result<ExpressionMatrix> {
    if raw.n_rows() == 0 || raw.n_cols() == 0 {
        return Err(ArraySigError::EmptyData {
            reason: "Intensity matrix is empty".to_string(),
        });
    }

    let logged = if log_transform {
        log2_intensities(raw.values())
    } else {
        raw.values().to_owned()
    };

    let normalized = match method {
        NormalizationMethod::Log2 => logged,
        NormalizationMethod::Standardize => standardize_samples(logged.view())?,
        NormalizationMethod::Quantile => quantile_normalize(logged.view()),
    };

    raw.with_values(normalized)
}
