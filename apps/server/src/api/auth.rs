//! Sign-in endpoint.

use std::sync::Arc;

use auth::AuthError;
use axum::extract::{Query, State};
use diary_store::DiaryStore;
use protocol::{GoogleAuthQuery, GoogleAuthResponse};

use crate::error::{ApiResult, ServerError, ok};
use crate::state::AppState;

/// Exchanges an authorization code for a session token.
///
/// The token is issued whether or not the email is registered yet, so the
/// client can go on to register with it.
pub async fn google_sign_in<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<GoogleAuthQuery>,
) -> ApiResult<GoogleAuthResponse> {
    let code = query
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ServerError::InvalidRequest("No code provided".to_string()))?;

    let provider = state.identity_provider.as_ref().ok_or_else(|| {
        ServerError::IdentityExchange(AuthError::Configuration(
            "No identity provider configured".to_string(),
        ))
    })?;

    let identity = provider
        .exchange_code(&code)
        .await
        .map_err(ServerError::IdentityExchange)?;

    let registered = state.store.get_user_by_email(&identity.email).await?;
    let jwt = state.jwt_manager.generate_token(identity.email.clone())?;

    tracing::info!(
        email = %identity.email,
        is_registered = registered.is_some(),
        "User signed in"
    );

    ok(GoogleAuthResponse {
        is_registered: registered.is_some(),
        email: identity.email,
        jwt,
    })
}
