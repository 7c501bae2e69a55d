use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cause-based categories of a failed generation, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    UnsupportedFormat,
    RateLimited,
    Generation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct UserFacingError {
    pub code: ErrorCode,
    pub message: String,
}

impl UserFacingError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
