//! Errors surfaced by chat operations.

use thiserror::Error;

use crate::database::StoreError;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message content is empty")]
    EmptyMessage,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("page {page} is out of range (1..={max_page})")]
    InvalidPage { page: i64, max_page: i64 },
    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type ChatResult<T> = Result<T, ChatError>;
