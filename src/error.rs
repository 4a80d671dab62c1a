use thiserror::Error;
use crate::history::HistoryError;

/// Failures a caller of the chat service can observe.
///
/// Provider failures never show up here: the agent answers with a fallback
/// reply instead.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("failed to persist conversation: {0}")]
    Persistence(#[from] HistoryError),
    #[error("conversation {0} not found")]
    NotFound(String),
}
