//! P-values and multiple testing correction

mod fdr;
mod pvalue;

pub use fdr::benjamini_hochberg;
pub use pvalue::calculate_pvalue_t;
