//! Shared error types

use thiserror::Error;

/// Core errors shared between the scoring engine and the service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },
}

impl CoreError {
    pub(crate) fn unknown(kind: &'static str, value: &str) -> Self {
        CoreError::UnknownValue {
            kind,
            value: value.to_string(),
        }
    }
}
