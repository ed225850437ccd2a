//! Batch effect removal across studies

mod combat;

pub use combat::{combat, CombatParams};

use serde::{Deserialize, Serialize};

use crate::error::{ArraySigError, Result};

/// Biological covariate protected during batch adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchCovariate {
    /// Intercept-only model
    #[default]
    None,
    /// Keep stage differences
    Stage,
}

impl std::str::FromStr for BatchCovariate {
    type Err = ArraySigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(BatchCovariate::None),
            "stage" => Ok(BatchCovariate::Stage),
            other => Err(ArraySigError::InvalidInput {
                reason: format!("Unknown batch covariate '{}'. Use 'none' or 'stage'.", other),
            }),
        }
    }
}
