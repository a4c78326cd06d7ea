use thiserror::Error;

use crate::store::StoreError;

/// Backend errors.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{kind} name '{name}' is already taken")]
    DuplicateName { kind: &'static str, name: String },

    #[error("A job with the same workflow and params already exists for target '{target}'")]
    DuplicateTarget { target: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Serialization(err.to_string())
    }
}
