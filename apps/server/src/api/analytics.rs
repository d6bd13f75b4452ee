//! Analytics endpoints.

use std::sync::Arc;

use ::analytics::{Dashboard, WordCloudLimit, WordRelations};
use access::{Actor, policy::AppAccess};
use auth::VerifiedIdentity;
use axum::{
    Extension,
    extract::{Path, Query, State},
};
use diary_store::DiaryStore;
use entities::{AppId, CourseId, Entry, EntryFilter};
use protocol::AnalyticsQuery;

use crate::error::{ApiResult, ServerResult, ok};
use crate::state::AppState;

/// Resolves the app for analytics and loads every entry with the app's
/// enabled stopwords.
async fn load_corpus<S: DiaryStore>(
    state: &AppState<S>,
    actor: &Actor,
    course_id: CourseId,
    app_id: AppId,
) -> ServerResult<(Vec<Entry>, Vec<String>)> {
    state
        .resolver
        .app(actor, course_id, app_id, AppAccess::Manage)
        .await?
        .into_result()?;

    let entries = state.store.list_entries(app_id, &EntryFilter::new()).await?;
    let stopwords = state.stopwords.enabled_words(app_id).await?;
    Ok((entries, stopwords))
}

/// Word cloud, sentence highlights and sentiment scatter for an app.
pub async fn dashboard<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path((course_id, app_id)): Path<(CourseId, AppId)>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Dashboard> {
    let (_, actor) = state.current_user(&identity).await?;
    let limit = WordCloudLimit::parse(query.limit.as_deref())?;
    let (entries, stopwords) = load_corpus(&state, &actor, course_id, app_id).await?;

    let dashboard = state.aggregator.dashboard(&entries, &stopwords, limit).await?;
    tracing::debug!(
        app_id,
        entries = entries.len(),
        failed = dashboard.failed_entry_ids.len(),
        "Dashboard computed"
    );

    ok(dashboard)
}

/// Words used around `word`, and the sentences mentioning it.
pub async fn word_relations<S: DiaryStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Path((course_id, app_id, word)): Path<(CourseId, AppId, String)>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<WordRelations> {
    let (_, actor) = state.current_user(&identity).await?;
    let limit = WordCloudLimit::parse(query.limit.as_deref())?;
    let (entries, stopwords) = load_corpus(&state, &actor, course_id, app_id).await?;

    let relations = state
        .aggregator
        .word_relations(&entries, &word, &stopwords, limit)
        .await?;

    ok(relations)
}
