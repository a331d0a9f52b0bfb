//! # Store Errors
//!
//! Fatal load errors, non-fatal decode warnings and per-request query errors.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The dataset could not be turned into a snapshot. Fatal at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read dataset {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed dataset: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataset contains no records")]
    Empty,

    #[error("dataset is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("no dataset source to reload from")]
    NoSource,
}

/// A request against the catalog was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Capability absent or expired. Carries no dataset details.
    #[error("not authorized")]
    Unauthorized,
}

/// One cell that failed to parse. The row was kept with a default value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeWarning {
    /// Ordinal of the record the cell belongs to.
    pub row: usize,
    pub column: &'static str,
    pub value: String,
    pub reason: &'static str,
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {} column {}: {} ({:?})",
            self.row, self.column, self.reason, self.value
        )
    }
}
