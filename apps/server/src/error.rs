//! Server error types.

use access::{AccessError, Denial};
use analytics::AnalyticsError;
use auth::AuthError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use diary_store::StoreError;
use protocol::{ApiError, ApiResponse, ErrorCode};
use serde_json::json;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Invalid request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No credential was presented.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// The credential belongs to nobody registered yet.
    #[error("User is not registered")]
    NotRegistered,

    /// Token validation or issuing failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// The identity provider did not vouch for the caller.
    #[error("Identity exchange failed: {0}")]
    IdentityExchange(AuthError),

    /// An access check said no.
    #[error(transparent)]
    Denied(#[from] Denial),

    #[error("Already enrolled")]
    AlreadyEnrolled { enrolled_count: u32 },

    #[error("App is full")]
    CapacityExceeded { max_students: u32 },

    /// Storage failure.
    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    /// Analytics could not be computed.
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AccessError> for ServerError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::Denied(denial) => ServerError::Denied(denial),
            AccessError::CapacityExceeded { max_students } => {
                ServerError::CapacityExceeded { max_students }
            }
            AccessError::AlreadyEnrolled { enrolled_count } => {
                ServerError::AlreadyEnrolled { enrolled_count }
            }
            AccessError::Validation(msg) => ServerError::InvalidRequest(msg),
            AccessError::Store(e) => ServerError::Store(e),
        }
    }
}

impl ServerError {
    /// HTTP status and envelope payload for this error.
    fn parts(&self) -> (StatusCode, ApiError) {
        match self {
            ServerError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::validation(msg.clone()))
            }
            ServerError::AuthenticationRequired => {
                (StatusCode::UNAUTHORIZED, ApiError::unauthorized())
            }
            ServerError::NotRegistered => (
                StatusCode::FORBIDDEN,
                ApiError::new(ErrorCode::NotRegistered, "User is not registered"),
            ),
            ServerError::Auth(e) => auth_parts(e),
            ServerError::IdentityExchange(e) => {
                let status = match e {
                    AuthError::InvalidToken | AuthError::EmailNotVerified => {
                        StatusCode::BAD_REQUEST
                    }
                    AuthError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, ApiError::new(ErrorCode::IdentityExchange, e.to_string()))
            }
            ServerError::Denied(denial) => denial_parts(denial),
            ServerError::AlreadyEnrolled { enrolled_count } => (
                StatusCode::CONFLICT,
                ApiError::with_data(
                    ErrorCode::AlreadyEnrolled,
                    "Student is already enrolled in the app",
                    json!({ "enrolledCount": enrolled_count }),
                ),
            ),
            ServerError::CapacityExceeded { max_students } => (
                StatusCode::CONFLICT,
                ApiError::with_data(
                    ErrorCode::CapacityExceeded,
                    "App has reached its maximum number of students",
                    json!({ "maxStudents": max_students }),
                ),
            ),
            ServerError::Store(e) => store_parts(e),
            ServerError::Analytics(AnalyticsError::InvalidLimit(_)) => {
                (StatusCode::BAD_REQUEST, ApiError::validation(self.to_string()))
            }
            ServerError::Analytics(AnalyticsError::UpstreamUnavailable(msg)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiError::upstream_unavailable(msg.clone()),
            ),
            ServerError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ApiError::internal(msg.clone()))
            }
        }
    }
}

fn auth_parts(e: &AuthError) -> (StatusCode, ApiError) {
    match e {
        AuthError::TokenExpired => (
            StatusCode::UNAUTHORIZED,
            ApiError::new(ErrorCode::TokenExpired, "Token expired"),
        ),
        AuthError::InvalidToken | AuthError::JwtValidation(_) => (
            StatusCode::UNAUTHORIZED,
            ApiError::new(ErrorCode::InvalidToken, "Invalid token"),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::internal(e.to_string()),
        ),
    }
}

fn denial_parts(denial: &Denial) -> (StatusCode, ApiError) {
    match denial {
        Denial::NotFound { kind } => (StatusCode::NOT_FOUND, ApiError::not_found(kind.as_str())),
        Denial::NotEnrolledInApp => (
            StatusCode::FORBIDDEN,
            ApiError::new(ErrorCode::NotEnrolled, "Student is not enrolled in the app"),
        ),
        Denial::Forbidden { .. } => (
            StatusCode::FORBIDDEN,
            ApiError::with_data(
                ErrorCode::Forbidden,
                denial.to_string(),
                json!(denial),
            ),
        ),
    }
}

fn store_parts(e: &StoreError) -> (StatusCode, ApiError) {
    match e {
        StoreError::NotFound { entity_type, .. } => {
            (StatusCode::NOT_FOUND, ApiError::not_found(entity_type))
        }
        StoreError::AlreadyExists { .. } | StoreError::ForeignKeyViolation(_) => {
            (StatusCode::CONFLICT, ApiError::conflict(e.to_string()))
        }
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::internal("Storage failure"),
        ),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error) = self.parts();

        if status.is_server_error() {
            tracing::error!(error = %self, code = error.code, "Request failed");
        } else {
            tracing::debug!(error = %self, code = error.code, "Request rejected");
        }

        (status, Json(ApiResponse::failure(error))).into_response()
    }
}

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Result of a handler: the success envelope or an error response.
pub type ApiResult<T> = ServerResult<Json<ApiResponse<T>>>;

/// Wraps `data` in a success envelope.
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}
