//! Internal error codes and the error payload.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Internal response codes carried in the envelope's `code` field.
///
/// Zero means success. Every failure kind has its own negative code so
/// clients can tell denials apart without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Ok = 0,
    /// Unexpected server-side failure
    Internal = -1,
    /// The identity provider rejected or could not complete a code exchange
    IdentityExchange = -102,
    /// No credential was presented
    Unauthorized = -103,
    /// The credential has expired
    TokenExpired = -104,
    /// The credential is malformed or its signature does not verify
    InvalidToken = -105,
    /// The caller has no account yet
    NotRegistered = -106,

    /// A field is missing or out of range
    Validation = -401,
    /// The request conflicts with existing state (e.g. a taken email)
    Conflict = -402,
    /// The caller may see the resource but not perform this action
    Forbidden = -403,
    /// The resource does not exist for this caller
    NotFound = -404,
    /// The student is already enrolled in the app
    AlreadyEnrolled = -405,
    /// The student is not enrolled in the app
    NotEnrolled = -406,
    /// The app has reached its maximum number of students
    CapacityExceeded = -407,

    /// The text analytics engine could not serve the request
    UpstreamUnavailable = -501,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ErrorCode::Ok
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        match code {
            0 => ErrorCode::Ok,
            -102 => ErrorCode::IdentityExchange,
            -103 => ErrorCode::Unauthorized,
            -104 => ErrorCode::TokenExpired,
            -105 => ErrorCode::InvalidToken,
            -106 => ErrorCode::NotRegistered,
            -401 => ErrorCode::Validation,
            -402 => ErrorCode::Conflict,
            -403 => ErrorCode::Forbidden,
            -404 => ErrorCode::NotFound,
            -405 => ErrorCode::AlreadyEnrolled,
            -406 => ErrorCode::NotEnrolled,
            -407 => ErrorCode::CapacityExceeded,
            -501 => ErrorCode::UpstreamUnavailable,
            _ => ErrorCode::Internal,
        }
    }
}

/// A failed API call, before it is wrapped into an envelope.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct ApiError {
    pub code: i32,
    pub message: String,
    /// Optional structured detail, e.g. the capacity that was hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: ErrorCode, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from(self.code)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "Authentication required")
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamUnavailable, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_and_negative() {
        let codes = [
            ErrorCode::Internal,
            ErrorCode::IdentityExchange,
            ErrorCode::Unauthorized,
            ErrorCode::TokenExpired,
            ErrorCode::InvalidToken,
            ErrorCode::NotRegistered,
            ErrorCode::Validation,
            ErrorCode::Conflict,
            ErrorCode::Forbidden,
            ErrorCode::NotFound,
            ErrorCode::AlreadyEnrolled,
            ErrorCode::NotEnrolled,
            ErrorCode::CapacityExceeded,
            ErrorCode::UpstreamUnavailable,
        ];
        let mut seen = std::collections::HashSet::new();
        for code in codes {
            assert!(code.code() < 0);
            assert!(seen.insert(code.code()));
            assert_eq!(ErrorCode::from(code.code()), code);
        }
    }

    #[test]
    fn test_token_codes() {
        assert_eq!(ErrorCode::TokenExpired.code(), -104);
        assert_eq!(ErrorCode::InvalidToken.code(), -105);
    }

    #[test]
    fn test_unknown_code_is_internal() {
        assert_eq!(ErrorCode::from(-9999), ErrorCode::Internal);
    }

    #[test]
    fn test_error_serialization() {
        let error = ApiError::not_found("Course");
        let json = serde_json::to_string(&error).unwrap();

        assert!(json.contains("-404"));
        assert!(json.contains("Course not found"));
        assert!(!json.contains("data"));
    }

    #[test]
    fn test_error_with_data() {
        let error = ApiError::with_data(
            ErrorCode::CapacityExceeded,
            "App is full",
            serde_json::json!({"maxStudents": 2}),
        );

        assert_eq!(error.error_code(), ErrorCode::CapacityExceeded);
        assert_eq!(error.data.unwrap()["maxStudents"], 2);
    }
}
