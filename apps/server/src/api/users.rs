//! User directory endpoints.

use std::sync::Arc;

use access::{Denial, ForbiddenReason};
use auth::VerifiedIdentity;
use axum::{Extension, Json, extract::State};
use diary_store::DiaryStore;
use entities::Role;
use protocol::{RegisterRequest, TokenResponse, UserProfileResponse, UserView};

use crate::error::{ApiResult, ServerError, ok};
use crate::state::AppState;

/// Returns the caller's profile. Students also get their memberships.
pub async fn get_profile<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
) -> ApiResult<UserProfileResponse> {
    let (user, _) = state.current_user(&identity).await?;

    let student = match user.role {
        Role::Student => state
            .store
            .get_student_profile(user.id)
            .await?
            .map(Into::into),
        Role::Professor => None,
    };

    ok(UserProfileResponse {
        user: UserView::from(&user),
        student,
    })
}

/// Registers the caller. The submitted email must be the one the token was
/// issued for, up to ASCII case; the account is stored under the token's
/// spelling.
pub async fn register<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<TokenResponse> {
    request.validate().map_err(ServerError::InvalidRequest)?;

    if !request.email.trim().eq_ignore_ascii_case(&identity.email) {
        return Err(Denial::forbidden(ForbiddenReason::IdentityMismatch).into());
    }

    let user = state.store.create_user(request.into_new_user(&identity.email)).await?;
    tracing::info!(user_id = user.id, role = %user.role, "User registered");

    let jwt = state.jwt_manager.generate_token(user.email)?;
    ok(TokenResponse { jwt })
}
