use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LiveError {
    #[error("cannot watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("store error: {0}")]
    Store(#[from] mrqa_store::StoreError),
}

pub type Result<T> = std::result::Result<T, LiveError>;
