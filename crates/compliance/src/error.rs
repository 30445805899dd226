use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RulesError {
    #[error("cannot read rules file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid rules document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{field}: rounded_list supports at most {max} decimals, got {decimals}")]
    TooManyDecimals { field: String, decimals: u32, max: u32 },

    #[error("unknown field name: {0}")]
    UnknownField(String),
}

pub type Result<T> = std::result::Result<T, RulesError>;
