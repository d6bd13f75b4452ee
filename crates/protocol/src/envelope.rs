//! The `{code, message, data}` response envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ApiError, ErrorCode};

/// Envelope wrapped around every response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// A successful response carrying `data`.
    pub fn success(data: T) -> Self {
        Self {
            code: ErrorCode::Ok.code(),
            message: String::new(),
            data,
        }
    }

    /// A successful response with a human-readable note.
    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Ok.code(),
            message: message.into(),
            data,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == ErrorCode::Ok.code()
    }
}

impl ApiResponse<Value> {
    /// A failure envelope. `data` is the error's detail, or an empty object.
    pub fn failure(error: ApiError) -> Self {
        Self {
            code: error.code,
            message: error.message,
            data: error.data.unwrap_or_else(|| Value::Object(Default::default())),
        }
    }
}

impl From<ApiError> for ApiResponse<Value> {
    fn from(error: ApiError) -> Self {
        Self::failure(error)
    }
}
