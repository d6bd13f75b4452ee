//! Authentication middleware.

use std::sync::Arc;

use auth::VerifiedIdentity;
use axum::{
    extract::{Query, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use diary_store::DiaryStore;
use serde::Deserialize;

use crate::error::ServerError;
use crate::state::AppState;

/// Extracts the token from the Authorization header, falling back to a
/// `jwt` query parameter.
fn extract_token(request: &Request) -> Option<String> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = header {
        return Some(token.to_string());
    }

    Query::<TokenQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(query)| query.jwt)
        .filter(|token| !token.is_empty())
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    jwt: Option<String>,
}

/// Authentication middleware.
///
/// Validates the presented token and stores the [`VerifiedIdentity`] in the
/// request extensions. Whether the identity belongs to a registered user is
/// left to the handlers: registration itself runs behind this middleware.
pub async fn auth_middleware<S: DiaryStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_token(&request) else {
        return ServerError::AuthenticationRequired.into_response();
    };

    match state.jwt_manager.verify(&token) {
        Ok(identity) => {
            tracing::debug!(email = %identity.email, "Authenticated request");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => ServerError::Auth(e).into_response(),
    }
}
