//! Input/Output for expression tables, metadata and results

mod results;
mod tables;

pub use results::{write_de_table, write_signature, DifferentialExpression};
pub use tables::{
    read_annotation, read_expression_matrix, read_raw, read_raw_dir, read_sample_table,
    write_expression_matrix, DEFAULT_PROBE_COLUMN, DEFAULT_SYMBOL_COLUMN,
};
