//! Course endpoints.

use std::sync::Arc;

use access::{Denial, ForbiddenReason, policy::CourseAccess};
use auth::VerifiedIdentity;
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use diary_store::DiaryStore;
use entities::{CourseId, Role};
use protocol::{CourseListResponse, CourseRequest, CourseResponse, CourseView, JoinCourseResponse};

use crate::error::{ApiResult, ServerError, ok};
use crate::state::AppState;

/// Lists the courses the caller is bound to.
pub async fn list_courses<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
) -> ApiResult<CourseListResponse> {
    let (user, _) = state.current_user(&identity).await?;
    let courses = state.store.list_courses_for(user.id).await?;

    ok(CourseListResponse {
        courses: courses.iter().map(CourseView::from).collect(),
    })
}

/// Creates a course and binds the calling professor to it.
pub async fn create_course<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Json(request): Json<CourseRequest>,
) -> ApiResult<CourseResponse> {
    let (user, _) = state.current_user(&identity).await?;
    if user.role != Role::Professor {
        return Err(Denial::forbidden(ForbiddenReason::ProfessorRequired).into());
    }
    let draft = request.into_draft().map_err(ServerError::InvalidRequest)?;

    let course = state.store.create_course(draft, user.id).await?;
    tracing::info!(course_id = course.id, professor_id = user.id, "Course created");

    ok(CourseResponse {
        course: CourseView::from(&course),
    })
}

pub async fn get_course<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(course_id): Path<CourseId>,
) -> ApiResult<CourseResponse> {
    let (_, actor) = state.current_user(&identity).await?;
    let course = state
        .resolver
        .course(&actor, course_id, CourseAccess::View)
        .await?
        .into_result()?;

    ok(CourseResponse {
        course: CourseView::from(&course),
    })
}

/// Renames a course. Only professors bound to it may.
pub async fn update_course<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(course_id): Path<CourseId>,
    Json(request): Json<CourseRequest>,
) -> ApiResult<CourseResponse> {
    let (_, actor) = state.current_user(&identity).await?;
    state
        .resolver
        .course(&actor, course_id, CourseAccess::Edit)
        .await?
        .into_result()?;
    let draft = request.into_draft().map_err(ServerError::InvalidRequest)?;

    let course = state.store.update_course(course_id, draft).await?;
    tracing::info!(course_id, "Course updated");

    ok(CourseResponse {
        course: CourseView::from(&course),
    })
}

/// Binds the caller to a course: students as students, professors as
/// co-instructors. Joining twice is reported, not refused.
pub async fn join_course<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path(course_id): Path<CourseId>,
) -> ApiResult<JoinCourseResponse> {
    let (_, actor) = state.current_user(&identity).await?;
    let outcome = state.enrollment.join_course(&actor, course_id).await?;

    ok(JoinCourseResponse {
        course_id: outcome.course_id,
        role: outcome.role,
        already_member: outcome.already_member,
    })
}
