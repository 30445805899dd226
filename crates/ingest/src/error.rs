use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tag list line {line}: {reason}")]
    TagList { line: usize, reason: String },

    #[error("expected {expected} columns, got {got}")]
    ColumnCount { expected: usize, got: usize },

    #[error("header command '{command}' failed: {reason}")]
    Command { command: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ReaderError>;
