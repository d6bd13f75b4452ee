//! Store-backed access resolution.

use std::sync::Arc;

use diary_store::{ChainQuery, DiaryStore};
use entities::{AppId, Course, CourseId, Entry, EntryFilter, EntryId, UserId};

use crate::{
    policy::{self, AppAccess, CourseAccess, EntryAccess, ResolvedApp},
    AccessResult, Actor, Resolution,
};

/// Resolves courses, apps and entries for an actor.
///
/// Each call performs exactly one [`DiaryStore::load_chain`], so the whole
/// course → app → entry chain is judged from a single snapshot.
pub struct AccessResolver<S: DiaryStore + ?Sized> {
    store: Arc<S>,
}

impl<S: DiaryStore + ?Sized> Clone for AccessResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: DiaryStore + ?Sized> AccessResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn course(
        &self,
        actor: &Actor,
        course_id: CourseId,
        access: CourseAccess,
    ) -> AccessResult<Resolution<Course>> {
        let query = ChainQuery::course(actor.user_id, course_id);
        let snapshot = self.store.load_chain(&query).await?;
        Ok(policy::course(actor, &snapshot, access))
    }

    pub async fn app(
        &self,
        actor: &Actor,
        course_id: CourseId,
        app_id: AppId,
        access: AppAccess,
    ) -> AccessResult<Resolution<ResolvedApp>> {
        let query = ChainQuery::course(actor.user_id, course_id).app(app_id);
        let snapshot = self.store.load_chain(&query).await?;
        Ok(policy::app(actor, &snapshot, access))
    }

    pub async fn entry(
        &self,
        actor: &Actor,
        course_id: CourseId,
        app_id: AppId,
        entry_id: EntryId,
        access: EntryAccess,
    ) -> AccessResult<Resolution<Entry>> {
        let query = ChainQuery::course(actor.user_id, course_id)
            .app(app_id)
            .entry(entry_id);
        let snapshot = self.store.load_chain(&query).await?;
        let resolution = policy::entry(actor, &snapshot, access);
        if let Some(denial) = resolution.denial() {
            tracing::debug!(
                user_id = actor.user_id,
                course_id,
                app_id,
                entry_id,
                %denial,
                "Entry access denied"
            );
        }
        Ok(resolution)
    }

    /// Resolves the app together with the entry filter the actor may list.
    pub async fn entry_scope(
        &self,
        actor: &Actor,
        course_id: CourseId,
        app_id: AppId,
        requested: Option<UserId>,
    ) -> AccessResult<Resolution<(ResolvedApp, EntryFilter)>> {
        let mut query = ChainQuery::course(actor.user_id, course_id).app(app_id);
        if let Some(student_id) = requested {
            query = query.subject(student_id);
        }
        let snapshot = self.store.load_chain(&query).await?;

        Ok(policy::entry_scope(actor, &snapshot, requested))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use diary_store::MemoryDiaryStore;
    use entities::{AppDraft, CourseDraft, NewEntry, NewUser, Role};

    use super::*;
    use crate::{Denial, EntityKind};

    struct World {
        resolver: AccessResolver<MemoryDiaryStore>,
        p1: Actor,
        p2: Actor,
        s1: Actor,
        s2: Actor,
        course_id: CourseId,
        app_id: AppId,
        entry_id: EntryId,
    }

    async fn world() -> World {
        let store = Arc::new(MemoryDiaryStore::new());
        let mut actors = Vec::new();
        for (email, role) in [
            ("p1@example.edu", Role::Professor),
            ("p2@example.edu", Role::Professor),
            ("s1@example.edu", Role::Student),
            ("s2@example.edu", Role::Student),
        ] {
            let user = store
                .create_user(NewUser::new("First", "Last", email, role))
                .await
                .unwrap();
            actors.push(Actor::from(&user));
        }
        let (p1, p2, s1, s2) = (actors[0], actors[1], actors[2], actors[3]);

        let course = store
            .create_course(CourseDraft::new("Diaries", "PSY 101"), p1.user_id)
            .await
            .unwrap();
        let start = Utc::now();
        let app = store
            .create_app(
                course.id,
                AppDraft {
                    name: "A1".to_string(),
                    intro: String::new(),
                    start_time: start,
                    end_time: start + Duration::days(7),
                    num_entries: 3,
                    max_students: 2,
                    template_link: None,
                },
            )
            .await
            .unwrap();
        for s in [s1, s2] {
            store
                .bind_to_course(course.id, s.user_id, Role::Student)
                .await
                .unwrap();
        }
        store.enroll_in_app(app.id, s1.user_id).await.unwrap();
        let entry = store
            .create_entry(NewEntry {
                student_id: s1.user_id,
                app_id: app.id,
                content: "Flashcards for an hour".to_string(),
                study_start_time: None,
                study_duration_minutes: Some(60),
            })
            .await
            .unwrap();

        World {
            resolver: AccessResolver::new(store),
            p1,
            p2,
            s1,
            s2,
            course_id: course.id,
            app_id: app.id,
            entry_id: entry.id,
        }
    }

    #[tokio::test]
    async fn test_unbound_professor_never_sees_entry() {
        let w = world().await;
        let resolution = w
            .resolver
            .entry(&w.p2, w.course_id, w.app_id, w.entry_id, EntryAccess::Read)
            .await
            .unwrap();
        assert_eq!(
            resolution.denial(),
            Some(Denial::not_found(EntityKind::Course))
        );
    }

    #[tokio::test]
    async fn test_bound_professor_reads_entry() {
        let w = world().await;
        let entry = w
            .resolver
            .entry(&w.p1, w.course_id, w.app_id, w.entry_id, EntryAccess::Read)
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(entry.student_id, w.s1.user_id);
    }

    #[tokio::test]
    async fn test_unenrolled_student() {
        let w = world().await;
        let metadata = w
            .resolver
            .app(&w.s2, w.course_id, w.app_id, AppAccess::Metadata)
            .await
            .unwrap();
        assert!(metadata.is_granted());

        let entries = w
            .resolver
            .entry_scope(&w.s2, w.course_id, w.app_id, None)
            .await
            .unwrap();
        assert_eq!(entries.denial(), Some(Denial::NotEnrolledInApp));
    }

    #[tokio::test]
    async fn test_wrong_course_path_hides_app() {
        let w = world().await;
        let resolution = w
            .resolver
            .app(&w.p1, w.course_id + 100, w.app_id, AppAccess::Metadata)
            .await
            .unwrap();
        assert_eq!(
            resolution.denial(),
            Some(Denial::not_found(EntityKind::Course))
        );
    }

    #[tokio::test]
    async fn test_professor_filters_by_enrolled_student() {
        let w = world().await;
        let (resolved, filter) = w
            .resolver
            .entry_scope(&w.p1, w.course_id, w.app_id, Some(w.s1.user_id))
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(resolved.app.id, w.app_id);
        assert_eq!(filter.student_id, Some(w.s1.user_id));

        let not_enrolled = w
            .resolver
            .entry_scope(&w.p1, w.course_id, w.app_id, Some(w.s2.user_id))
            .await
            .unwrap();
        assert_eq!(not_enrolled.denial(), Some(Denial::NotEnrolledInApp));
    }
}
