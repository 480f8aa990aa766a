use thiserror::Error;

#[derive(Debug, Error)]
#[allow(clippy::enum_variant_names)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Quota exceeded for {key}: {size} bytes (limit {limit})")]
    QuotaExceeded {
        key: String,
        size: usize,
        limit: usize,
    },

    #[error("Path error: {0}")]
    PathError(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
