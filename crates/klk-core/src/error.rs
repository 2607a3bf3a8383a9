use klk_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed configuration response: {0}")]
    MalformedResponse(#[source] serde_json::Error),

    #[error("response is not valid percent-encoded UTF-8: {0}")]
    InvalidEncoding(String),

    #[error("config store error: {0}")]
    Store(#[from] StoreError),

    #[error("settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
