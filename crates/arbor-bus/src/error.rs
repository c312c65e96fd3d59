use thiserror::Error;

use arbor_store::StoreError;

pub type Result<T> = std::result::Result<T, BusError>;

#[derive(Debug, Error)]
pub enum BusError {
    /// Authorization failed; surfaced to the caller, never retried.
    #[error("forbidden")]
    Forbidden,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl BusError {
    /// Short name used for Error documents attached to activity results.
    pub fn name(&self) -> &'static str {
        match self {
            BusError::Forbidden => "Forbidden",
            BusError::Validation(_) => "ValidationError",
            BusError::Store(_) => "StorageError",
        }
    }
}
