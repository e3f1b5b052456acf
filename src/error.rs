//! Error taxonomy for the pipeline.
//!
//! Library-level failures are typed here with `thiserror`; orchestration code
//! carries them inside `anyhow::Error` so the stage boundary in
//! [`GeneralOrchestrator`](crate::orchestrators::GeneralOrchestrator) can log
//! them without losing the concrete type.

use thiserror::Error;

/// Errors raised while loading or validating the application configuration.
///
/// Always fatal: no stage runs with an invalid configuration.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration invalid: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("Configuration invalid: {0}")]
    Source(#[from] config::ConfigError),
}

/// Data-shape and data-type errors raised while preparing a dataset.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Unsupported raw data type: {0}")]
    UnsupportedRawData(String),

    #[error("Insufficient samples: {found} < {required}")]
    InsufficientSamples { found: usize, required: usize },

    #[error("Feature/target length mismatch: {features} != {target}")]
    LengthMismatch { features: usize, target: usize },

    #[error("Column '{0}' is not numeric")]
    NonNumericFeature(String),

    #[error("Target column '{0}' contains missing values")]
    MissingTargetValues(String),

    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Column '{column}' has {found} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        found: usize,
        expected: usize,
    },

    #[error("Unsupported extension: {0}")]
    UnsupportedExtension(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Dataframe error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

/// Errors raised while building or evaluating a model pipeline.
#[derive(Error, Debug)]
pub enum ModelingError {
    #[error("Unknown estimator {0}")]
    UnknownEstimator(String),

    #[error("Unknown AutoML library: {0}")]
    UnknownAutoMl(String),

    #[error("Unknown scoring metric: {0}")]
    UnknownMetric(String),

    #[error("Invalid scoring configuration: {0}")]
    InvalidScoring(String),

    #[error("{0}")]
    MissingDependency(String),

    #[error("Invalid parameter '{param}' for {step}: {reason}")]
    InvalidParameter {
        step: String,
        param: String,
        reason: String,
    },

    #[error("Unknown pipeline step '{0}'")]
    UnknownStep(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Model used before fit: {0}")]
    NotFitted(&'static str),
}

/// Errors raised while rendering reports.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Report I/O error: {0}")]
    Io(#[from] std::io::Error),
}
