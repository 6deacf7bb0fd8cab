//! Error types for the view engine
//!
//! `StoreError` classifies remote failures; the first three variants are the
//! "endpoint not available" family that degrades to local-only mode.

use view_types::ViewId;

/// Failures reported by a `ViewStore`
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("View store unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unexpected store error: {0}")]
    Unexpected(String),
}

impl StoreError {
    /// Transport failure, missing endpoint or refused operation
    pub fn is_endpoint_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::NotFound(_) | StoreError::Forbidden(_)
        )
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            StoreError::Unavailable(e.to_string())
        } else if e.is_decode() {
            StoreError::Unexpected(format!("Failed to parse JSON: {e}"))
        } else {
            StoreError::Unexpected(e.to_string())
        }
    }
}

/// Errors surfaced by the draft manager and the view controller
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("View not found: {0}")]
    ViewNotFound(ViewId),

    #[error("No view is selected")]
    NothingSelected,

    #[error("A save for view {0} is already in flight")]
    SaveInProgress(ViewId),

    #[error("A view needs a name before it can be saved")]
    NameRequired,

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for ViewError {
    fn from(e: tokio::task::JoinError) -> Self {
        ViewError::Task(e.to_string())
    }
}

pub type ViewResult<T> = Result<T, ViewError>;
