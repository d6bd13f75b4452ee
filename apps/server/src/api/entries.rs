//! Entry endpoints.

use std::sync::Arc;

use access::policy::{AppAccess, EntryAccess};
use auth::VerifiedIdentity;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use diary_store::DiaryStore;
use entities::{AppId, CourseId, EntryId};
use protocol::{EntryListQuery, EntryListResponse, EntryRequest, EntryResponse, EntryView};

use crate::error::{ApiResult, ServerError, ok};
use crate::state::AppState;

/// Lists an app's entries.
///
/// Students get their own entries. Professors get all of them, or a single
/// student's when `studentId` is given.
pub async fn list_entries<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path((course_id, app_id)): Path<(CourseId, AppId)>,
    Query(query): Query<EntryListQuery>,
) -> ApiResult<EntryListResponse> {
    let (_, actor) = state.current_user(&identity).await?;
    let (_, filter) = state
        .resolver
        .entry_scope(&actor, course_id, app_id, query.student_id)
        .await?
        .into_result()?;

    let entries = state.store.list_entries(app_id, &filter).await?;

    ok(EntryListResponse {
        entries: entries.iter().map(EntryView::from).collect(),
    })
}

/// Submits an entry as the calling, enrolled student.
pub async fn create_entry<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path((course_id, app_id)): Path<(CourseId, AppId)>,
    Json(request): Json<EntryRequest>,
) -> ApiResult<EntryResponse> {
    let (_, actor) = state.current_user(&identity).await?;
    state
        .resolver
        .app(&actor, course_id, app_id, AppAccess::Contribute)
        .await?
        .into_result()?;
    let new_entry = request
        .into_new_entry(actor.user_id, app_id)
        .map_err(ServerError::InvalidRequest)?;

    let entry = state.store.create_entry(new_entry).await?;
    tracing::info!(entry_id = entry.id, app_id, student_id = actor.user_id, "Entry created");

    ok(EntryResponse {
        entry: EntryView::from(&entry),
    })
}

pub async fn get_entry<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path((course_id, app_id, entry_id)): Path<(CourseId, AppId, EntryId)>,
) -> ApiResult<EntryResponse> {
    let (_, actor) = state.current_user(&identity).await?;
    let entry = state
        .resolver
        .entry(&actor, course_id, app_id, entry_id, EntryAccess::Read)
        .await?
        .into_result()?;

    ok(EntryResponse {
        entry: EntryView::from(&entry),
    })
}

/// Edits the content and study fields of the caller's own entry.
pub async fn update_entry<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path((course_id, app_id, entry_id)): Path<(CourseId, AppId, EntryId)>,
    Json(request): Json<EntryRequest>,
) -> ApiResult<EntryResponse> {
    let (_, actor) = state.current_user(&identity).await?;
    state
        .resolver
        .entry(&actor, course_id, app_id, entry_id, EntryAccess::Write)
        .await?
        .into_result()?;
    let edit = request.into_edit().map_err(ServerError::InvalidRequest)?;

    let entry = state.store.update_entry(entry_id, edit).await?;
    tracing::debug!(entry_id, "Entry updated");

    ok(EntryResponse {
        entry: EntryView::from(&entry),
    })
}
