use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("core error: {0}")]
    Core(#[from] mrqa_core::CoreError),

    #[error("invalid protocol pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("parameter set {0} not found")]
    ParamSetNotFound(i64),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
