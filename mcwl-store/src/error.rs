use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store file i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed store file: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
