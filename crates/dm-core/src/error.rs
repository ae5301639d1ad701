//! Error types for dm-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in dm-core
///
/// Unreadable source files are deliberately absent: readers swallow those
/// and the file simply contributes no columns or rows.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Workbook error from calamine
    #[error("workbook error in '{path}': {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    /// The workbook has no worksheet to read
    #[error("workbook '{path}' has no worksheet")]
    EmptyWorkbook { path: PathBuf },

    /// Workbook encoding error from rust_xlsxwriter
    #[error("failed to build workbook '{path}': {source}")]
    Xlsx {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Writing the consolidated output failed
    #[error("failed to export to '{path}': {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The export destination has an extension the writer cannot encode
    #[error("unsupported export format for '{path}' (expected .csv, .tsv, .json or .xlsx)")]
    UnsupportedFormat { path: PathBuf },

    /// Two output columns resolve to the same header
    #[error("duplicate output header '{0}'")]
    DuplicateHeader(String),

    /// A selected column has no header name
    #[error("selected column at position {0} has an empty header name")]
    BlankHeader(usize),

    /// A plan action could not be interpreted
    #[error("plan action #{index}: {message}")]
    PlanAction { index: usize, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn export(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Export {
            path: path.into(),
            source,
        }
    }
}
