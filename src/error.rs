//! Error types shared by the library.
//!
//! Configuration problems are rejected eagerly when the parameters are turned into a
//! `GaConfig`. Model failures stay local to one fitness evaluation. Data problems belong to
//! the CSV loading step and never reach the GA core.

use thiserror::Error;

/// Invalid parameter combination, detected before any evaluation happens.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid min_features={min_features}. Must be in range [1, {n_features}].")]
    MinFeatures { min_features: usize, n_features: usize },

    #[error("min_features must be >= 1.")]
    ZeroMinFeatures,

    #[error("Invalid population_size={pop_size}. Must be >= elitism + 2 = {}.", .elitism + 2)]
    PopulationTooSmall { pop_size: usize, elitism: usize },

    #[error("Invalid {name}={value:.3}. Must be in range [0, 1].")]
    Probability { name: &'static str, value: f64 },

    #[error("Invalid penalty_weight={0:.3}. Must be >= 0.")]
    NegativePenalty(f64),

    #[error("Invalid tournament_size={size}. Must be in range [1, {pop_size}].")]
    TournamentSize { size: usize, pop_size: usize },

    #[error("Invalid cv folds={0}. At least 2 folds are required.")]
    TooFewFolds(usize),

    #[error("Cannot build {folds} stratified folds: class {class} only has {count} samples.")]
    FoldsExceedClass { folds: usize, class: u8, count: usize },

    #[error("Early stopping requires patience >= 1.")]
    ZeroPatience,

    #[error("thread_number must be >= 1.")]
    ZeroThreads,

    #[error("Unknown model '{0}'. Expected one of: logreg, dt.")]
    UnknownModel(String),

    #[error("Unknown scorer '{0}'. Expected one of: accuracy, f1.")]
    UnknownScorer(String),

    #[error("Invalid model parameter {name}={value}. {reason}")]
    ModelParameter { name: &'static str, value: f64, reason: &'static str },

    #[error("Unable to read parameter file: {0}")]
    Read(String),
}

/// Failure of a single model fit or prediction.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Training set contains a single class ({0}), at least 2 are required.")]
    SingleClass(u8),

    #[error("Empty training set ({samples} samples x {features} features).")]
    EmptyDesign { samples: usize, features: usize },

    #[error("Non finite value at sample {row}, feature {col}.")]
    NonFinite { row: usize, col: usize },

    #[error("Model used before being fitted.")]
    NotFitted,

    #[error("Optimizer failure: {0}")]
    Optimizer(String),

    #[error("Cannot select {k} features out of {available}.")]
    SelectorSize { k: usize, available: usize },
}

/// Data contract violations found while loading a dataset.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error on {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Target column '{0}' not found.")]
    MissingTarget(String),

    #[error("Dataset {0} contains no sample.")]
    Empty(String),

    #[error("Row {row}: target value '{value}' cannot be mapped to 0/1.")]
    UnmappableLabel { row: usize, value: String },

    #[error("Target column '{target}' must contain both classes, found only {class}.")]
    SingleClass { target: String, class: u8 },

    #[error("No usable numeric feature column left after cleaning.")]
    NoFeature,
}

/// Top level error returned by `run` and the report writers.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
