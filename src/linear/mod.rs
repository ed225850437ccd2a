//! Linear models with empirical-Bayes moderated statistics

mod design;
mod ebayes;
mod fitting;
mod linalg;

pub use design::{
    check_full_rank, group_design, indicator_matrix, one_vs_rest_contrasts, sorted_levels,
    ContrastMatrix, GroupDesign,
};
pub use ebayes::{ebayes, fit_f_dist, squeeze_var, ModeratedFit, VariancePrior};
pub use fitting::{contrasts_fit, lm_fit, LinearFit};
pub use linalg::{column_rank, invert_spd};
