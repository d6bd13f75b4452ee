//! Course bindings and app enrollment.

use std::sync::Arc;

use diary_store::DiaryStore;
use entities::{AppId, CourseId, EnrollOutcome, Role, UserId};
use serde::Serialize;

use crate::{AccessError, AccessResult, Actor};

/// Result of binding a user to a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindOutcome {
    pub course_id: CourseId,
    pub role: Role,
    /// The binding existed before the call; nothing changed.
    pub already_member: bool,
}

/// Membership transitions. Bindings only ever grow.
pub struct EnrollmentGraph<S: DiaryStore + ?Sized> {
    store: Arc<S>,
}

impl<S: DiaryStore + ?Sized> Clone for EnrollmentGraph<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: DiaryStore + ?Sized> EnrollmentGraph<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn bind_professor_to_course(
        &self,
        course_id: CourseId,
        professor_id: UserId,
    ) -> AccessResult<BindOutcome> {
        self.bind(course_id, professor_id, Role::Professor).await
    }

    pub async fn bind_student_to_course(
        &self,
        course_id: CourseId,
        student_id: UserId,
    ) -> AccessResult<BindOutcome> {
        self.bind(course_id, student_id, Role::Student).await
    }

    /// Binds the actor to a course in the capacity of their role.
    /// Professors join as co-instructors.
    pub async fn join_course(&self, actor: &Actor, course_id: CourseId) -> AccessResult<BindOutcome> {
        self.bind(course_id, actor.user_id, actor.role).await
    }

    async fn bind(&self, course_id: CourseId, user_id: UserId, role: Role) -> AccessResult<BindOutcome> {
        let inserted = self.store.bind_to_course(course_id, user_id, role).await?;
        if inserted {
            tracing::info!(course_id, user_id, %role, "Bound user to course");
        } else {
            tracing::debug!(course_id, user_id, %role, "User already bound to course");
        }

        Ok(BindOutcome {
            course_id,
            role,
            already_member: !inserted,
        })
    }

    /// Enrolls a student in an app and returns the new enrollment count.
    ///
    /// The duplicate and capacity checks happen inside the store's atomic
    /// step; the outcome is reported, never retried.
    pub async fn enroll_student_in_app(&self, app_id: AppId, student_id: UserId) -> AccessResult<u32> {
        match self.store.enroll_in_app(app_id, student_id).await? {
            EnrollOutcome::Enrolled { enrolled_count } => {
                tracing::info!(app_id, student_id, enrolled_count, "Student enrolled in app");
                Ok(enrolled_count)
            }
            EnrollOutcome::AlreadyEnrolled { enrolled_count } => {
                Err(AccessError::AlreadyEnrolled { enrolled_count })
            }
            EnrollOutcome::CapacityExceeded { max_students } => {
                tracing::info!(app_id, student_id, max_students, "App is full");
                Err(AccessError::CapacityExceeded { max_students })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use diary_store::MemoryDiaryStore;
    use entities::{AppDraft, CourseDraft, NewUser};

    use super::*;

    async fn user(store: &MemoryDiaryStore, email: &str, role: Role) -> Actor {
        let user = store
            .create_user(NewUser::new("First", "Last", email, role))
            .await
            .unwrap();
        Actor::from(&user)
    }

    #[tokio::test]
    async fn test_join_course_is_idempotent() {
        let store = Arc::new(MemoryDiaryStore::new());
        let p1 = user(&store, "p1@example.edu", Role::Professor).await;
        let p2 = user(&store, "p2@example.edu", Role::Professor).await;
        let s1 = user(&store, "s1@example.edu", Role::Student).await;
        let course = store
            .create_course(CourseDraft::new("Diaries", "PSY 101"), p1.user_id)
            .await
            .unwrap();
        let graph = EnrollmentGraph::new(store);

        let first = graph.join_course(&s1, course.id).await.unwrap();
        let second = graph.join_course(&s1, course.id).await.unwrap();
        assert!(!first.already_member);
        assert!(second.already_member);

        let co = graph.join_course(&p2, course.id).await.unwrap();
        assert_eq!(co.role, Role::Professor);
        assert!(!co.already_member);

        let creator = graph
            .bind_professor_to_course(course.id, p1.user_id)
            .await
            .unwrap();
        assert!(creator.already_member);
    }

    #[tokio::test]
    async fn test_enrollment_scenario() {
        let store = Arc::new(MemoryDiaryStore::new());
        let p1 = user(&store, "p1@example.edu", Role::Professor).await;
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
        let s1 = user(&store, "s1@example.edu", Role::Student).await;
        let s2 = user(&store, "s2@example.edu", Role::Student).await;
        let s3 = user(&store, "s3@example.edu", Role::Student).await;
        let graph = EnrollmentGraph::new(store);

        assert_eq!(graph.enroll_student_in_app(app.id, s1.user_id).await.unwrap(), 1);
        assert!(matches!(
            graph.enroll_student_in_app(app.id, s1.user_id).await,
            Err(AccessError::AlreadyEnrolled { enrolled_count: 1 })
        ));
        assert_eq!(graph.enroll_student_in_app(app.id, s2.user_id).await.unwrap(), 2);
        assert!(matches!(
            graph.enroll_student_in_app(app.id, s3.user_id).await,
            Err(AccessError::CapacityExceeded { max_students: 2 })
        ));
    }
}
