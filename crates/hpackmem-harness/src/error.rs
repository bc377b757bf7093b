//! Harness errors.

use hpackmem_core::{AllocError, LifecycleError};

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("lifecycle call failed: {0}")]
    Lifecycle(#[from] LifecycleError),
    #[error("allocation failed: {0}")]
    Alloc(#[from] AllocError),
    #[error("scenario `{scenario}` violated an invariant: {detail}")]
    Invariant {
        scenario: &'static str,
        detail: String,
    },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    pub(crate) fn invariant(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self::Invariant {
            scenario,
            detail: detail.into(),
        }
    }
}
