use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown field name: {0}")]
    UnknownField(String),

    #[error("Invalid date '{0}': expected YYYYMMDD or YYYY-MM-DD")]
    InvalidDate(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
