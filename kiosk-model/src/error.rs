use std::fmt::{self, Display};

/// Errors produced by model parsers and validation routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    InvalidDateRange(String),
    InvalidHistoryToken(String),
    InvalidAsset(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidDateRange(token) => {
                write!(f, "invalid date range: {token}")
            }
            ModelError::InvalidHistoryToken(token) => {
                write!(f, "invalid history token: {token}")
            }
            ModelError::InvalidAsset(msg) => write!(f, "invalid asset: {msg}"),
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
