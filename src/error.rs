//! Error types shared by both pipelines.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors for a single batch run. No variant is retried; every failure
/// aborts the current invocation and carries the offending path.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Malformed or unparseable tabular/sequence input, or a required column
    /// is missing from a header row.
    #[error("Input format error in {path}: {detail}")]
    InputFormat { path: PathBuf, detail: String },

    /// Destination path could not be written.
    #[error("Failed to write {path}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    pub fn input_format(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        ToolError::InputFormat {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ToolError::FileWrite {
            path: path.into(),
            source,
        }
    }
}
