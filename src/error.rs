//! Dashboard error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading data, segmenting customers or rendering
#[derive(Debug, Error)]
pub enum DashboardError {
    /// A required input file is missing or malformed
    #[error("failed to load {path}: {reason}")]
    DataLoad { path: PathBuf, reason: String },

    /// Polars failed while scanning or joining tables
    #[error("data frame error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// The analysis date cannot be compared against order timestamps
    #[error("invalid reference date: {0}")]
    InvalidReferenceDate(String),

    /// A filter value given on the command line is malformed
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// The dashboard config file is unreadable or invalid
    #[error("invalid config: {0}")]
    Config(String),

    /// Chart rendering failed
    #[error("render failed: {0}")]
    Render(String),
}

impl DashboardError {
    pub(crate) fn data_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DataLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, DashboardError>;
