use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("slot store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
