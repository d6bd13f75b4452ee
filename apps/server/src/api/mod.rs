//! API endpoints.

pub mod analytics;
pub mod apps;
pub mod auth;
pub mod courses;
pub mod entries;
pub mod users;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use diary_store::DiaryStore;

use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

/// Creates the API router with all endpoints.
///
/// Everything except sign-in and the health check requires a valid token.
pub fn create_router<S: DiaryStore + 'static>(state: Arc<AppState<S>>) -> Router {
    let protected = Router::new()
        // User endpoints
        .route("/api/users", get(users::get_profile::<S>))
        .route("/api/users/register", post(users::register::<S>))
        // Course endpoints
        .route(
            "/api/courses",
            get(courses::list_courses::<S>).post(courses::create_course::<S>),
        )
        .route(
            "/api/courses/{course_id}",
            get(courses::get_course::<S>).put(courses::update_course::<S>),
        )
        .route("/api/courses/{course_id}/join", post(courses::join_course::<S>))
        // App endpoints
        .route(
            "/api/courses/{course_id}/apps",
            get(apps::list_apps::<S>).post(apps::create_app::<S>),
        )
        .route(
            "/api/courses/{course_id}/apps/{app_id}",
            get(apps::get_app::<S>).put(apps::update_app::<S>),
        )
        .route(
            "/api/courses/{course_id}/apps/{app_id}/join",
            post(apps::join_app::<S>),
        )
        // Entry endpoints
        .route(
            "/api/courses/{course_id}/apps/{app_id}/entries",
            get(entries::list_entries::<S>).post(entries::create_entry::<S>),
        )
        .route(
            "/api/courses/{course_id}/apps/{app_id}/entries/{entry_id}",
            get(entries::get_entry::<S>).put(entries::update_entry::<S>),
        )
        // Analytics endpoints
        .route(
            "/api/courses/{course_id}/apps/{app_id}/analytics",
            get(analytics::dashboard::<S>),
        )
        .route(
            "/api/courses/{course_id}/apps/{app_id}/analytics/word_relations/{word}",
            get(analytics::word_relations::<S>),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::<S>,
        ));

    Router::new()
        .route("/api/auth/google", get(auth::google_sign_in::<S>))
        .route("/health", get(health_check))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
