//! App endpoints.

use std::sync::Arc;

use access::{
    Actor, Denial, ForbiddenReason,
    policy::{AppAccess, CourseAccess},
};
use auth::VerifiedIdentity;
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use diary_store::DiaryStore;
use entities::{AppId, CourseId, Role};
use protocol::{
    AppDetailResponse, AppListResponse, AppRequest, AppSavedResponse, AppView, JoinAppResponse,
};

use crate::error::{ApiResult, ServerError, ServerResult, ok};
use crate::state::AppState;

/// Ids of the apps a student is enrolled in; empty for professors.
async fn enrolled_apps<S: DiaryStore>(state: &AppState<S>, actor: &Actor) -> ServerResult<Vec<AppId>> {
    match actor.role {
        Role::Student => Ok(state.store.list_enrolled_app_ids(actor.user_id).await?),
        Role::Professor => Ok(Vec::new()),
    }
}

/// Lists a course's apps with their enrollment counts.
pub async fn list_apps<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(course_id): Path<CourseId>,
) -> ApiResult<AppListResponse> {
    let (_, actor) = state.current_user(&identity).await?;
    state
        .resolver
        .course(&actor, course_id, CourseAccess::View)
        .await?
        .into_result()?;

    let summaries = state.store.list_apps(course_id).await?;
    let enrolled = enrolled_apps(&state, &actor).await?;

    let apps = summaries
        .iter()
        .map(|summary| {
            let view = AppView::from(summary);
            match actor.role {
                Role::Student => view.with_enrollment(enrolled.contains(&summary.app.id)),
                Role::Professor => view,
            }
        })
        .collect();

    ok(AppListResponse { apps })
}

/// Creates an app in a course, together with its initial stopwords.
pub async fn create_app<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(course_id): Path<CourseId>,
    Json(request): Json<AppRequest>,
) -> ApiResult<AppSavedResponse> {
    let (_, actor) = state.current_user(&identity).await?;
    state
        .resolver
        .course(&actor, course_id, CourseAccess::Edit)
        .await?
        .into_result()?;
    let (draft, stopwords) = request.into_parts().map_err(ServerError::InvalidRequest)?;

    let (app, report) = state.stopwords.create_app(course_id, draft, &stopwords).await?;
    tracing::info!(course_id, app_id = app.id, "App created");

    ok(AppSavedResponse {
        app: AppView::from(&app).with_count(0),
        stopwords: report.into(),
    })
}

/// Returns an app's metadata and enabled stopwords.
pub async fn get_app<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path((course_id, app_id)): Path<(CourseId, AppId)>,
) -> ApiResult<AppDetailResponse> {
    let (_, actor) = state.current_user(&identity).await?;
    let resolved = state
        .resolver
        .app(&actor, course_id, app_id, AppAccess::Metadata)
        .await?
        .into_result()?;

    let count = state.store.enrollment_count(app_id).await?;
    let stopwords = state.stopwords.enabled_words(app_id).await?;

    let mut view = AppView::from(&resolved.app).with_count(count);
    if actor.role == Role::Student {
        let enrolled = enrolled_apps(&state, &actor).await?;
        view = view.with_enrollment(enrolled.contains(&app_id));
    }

    ok(AppDetailResponse {
        app: view,
        stopwords,
    })
}

/// Edits an app and reconciles its stopword list against the submitted one.
pub async fn update_app<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path((course_id, app_id)): Path<(CourseId, AppId)>,
    Json(request): Json<AppRequest>,
) -> ApiResult<AppSavedResponse> {
    let (_, actor) = state.current_user(&identity).await?;
    state
        .resolver
        .app(&actor, course_id, app_id, AppAccess::Manage)
        .await?
        .into_result()?;
    let (draft, stopwords) = request.into_parts().map_err(ServerError::InvalidRequest)?;

    let (app, report) = state.stopwords.update_app(app_id, draft, &stopwords).await?;
    let count = state.store.enrollment_count(app_id).await?;
    tracing::info!(course_id, app_id, "App updated");

    ok(AppSavedResponse {
        app: AppView::from(&app).with_count(count),
        stopwords: report.into(),
    })
}

/// Enrolls the calling student in an app of a course they belong to.
pub async fn join_app<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path((course_id, app_id)): Path<(CourseId, AppId)>,
) -> ApiResult<JoinAppResponse> {
    let (_, actor) = state.current_user(&identity).await?;
    state
        .resolver
        .app(&actor, course_id, app_id, AppAccess::Metadata)
        .await?
        .into_result()?;
    if actor.role != Role::Student {
        return Err(Denial::forbidden(ForbiddenReason::StudentRequired).into());
    }

    let enrolled_count = state
        .enrollment
        .enroll_student_in_app(app_id, actor.user_id)
        .await?;

    ok(JoinAppResponse {
        app_id,
        enrolled_count,
    })
}
