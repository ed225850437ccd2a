//! Data structures for expression preprocessing

mod annotation;
mod collapse;
mod expression_matrix;
mod metadata;

pub use annotation::ProbeAnnotation;
pub use collapse::{collapse_to_genes, CollapseMethod};
pub use expression_matrix::ExpressionMatrix;
pub use metadata::{GroupColumn, SampleRecord, SampleTable};
