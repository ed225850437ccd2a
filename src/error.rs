//! Error types for rust_arraysig

use thiserror::Error;

/// Main error type for the preprocessing and signature pipeline
#[derive(Error, Debug)]
pub enum ArraySigError {
    #[error("Invalid expression matrix: {reason}")]
    InvalidMatrix { reason: String },

    #[error("Invalid sample metadata: {reason}")]
    InvalidMetadata { reason: String },

    #[error("Invalid probe annotation: {reason}")]
    InvalidAnnotation { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("Join produced no shared genes across {n_tables} tables")]
    EmptyJoin { n_tables: usize },

    #[error("Invalid design matrix: {reason}")]
    InvalidDesignMatrix { reason: String },

    #[error("Invalid contrast: {reason}")]
    InvalidContrast { reason: String },

    #[error("Numerical instability in {operation}: {details}")]
    NumericalInstability { operation: String, details: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ArraySigError>;
