use std::path::PathBuf;

use thiserror::Error;

/// Fatal problems with an input dataset. The current computation stops and the
/// caller is told which file/column is at fault.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{file}: missing required column '{column}'")]
    MissingColumn { file: String, column: String },

    #[error("{file}: column '{column}' has no parseable values")]
    UnparseableColumn { file: String, column: String },

    #[error("{file}: no usable rows")]
    EmptyDataset { file: String },
}

impl DataError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DataError::FileNotFound { .. })
    }
}

/// A filter combination matched nothing. Recoverable: render an empty state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no rows match {filter}")]
pub struct FilterEmptyError {
    pub filter: String,
}

impl FilterEmptyError {
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
        }
    }
}

/// Non-finite raw counter seen while normalizing. Recovered locally by treating
/// the strength as missing.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationWarning {
    pub player: String,
    pub counter: &'static str,
    pub raw: f64,
}

impl std::fmt::Display for NormalizationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: non-finite {} ({}) treated as missing",
            self.player, self.counter, self.raw
        )
    }
}
