//! In-memory store implementation for testing and single-process mode.
//!
//! All tables live behind one lock, so every trait method observes and
//! mutates a single consistent state.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use entities::{
    App, AppDraft, AppId, AppSummary, Course, CourseDraft, CourseId, CourseMembership,
    EnrollOutcome, Entry, EntryEdit, EntryFilter, EntryId, NewEntry, NewUser, ReconcileReport,
    Role, Stopword, StopwordId, StudentProfile, User, UserId,
};
use tokio::sync::RwLock;

use crate::{ChainQuery, ChainSnapshot, DiaryStore, StopwordPlan, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    last_user_id: UserId,
    last_course_id: CourseId,
    last_app_id: AppId,
    last_entry_id: EntryId,
    last_stopword_id: StopwordId,

    users: BTreeMap<UserId, User>,
    /// Role profiles, keyed by the owning user id.
    students: BTreeMap<UserId, String>,
    professors: BTreeMap<UserId, String>,

    courses: BTreeMap<CourseId, Course>,
    course_students: BTreeSet<(CourseId, UserId)>,
    course_professors: BTreeSet<(CourseId, UserId)>,

    apps: BTreeMap<AppId, App>,
    app_students: BTreeSet<(AppId, UserId)>,

    stopwords: BTreeMap<StopwordId, Stopword>,
    entries: BTreeMap<EntryId, Entry>,
}

fn next_id(last: &mut i64) -> i64 {
    *last += 1;
    *last
}

impl Tables {
    fn membership(&self, course_id: CourseId, user_id: UserId) -> CourseMembership {
        CourseMembership {
            as_student: self.course_students.contains(&(course_id, user_id)),
            as_professor: self.course_professors.contains(&(course_id, user_id)),
        }
    }

    fn enrollment_count(&self, app_id: AppId) -> u32 {
        self.app_students
            .range((app_id, UserId::MIN)..=(app_id, UserId::MAX))
            .count() as u32
    }

    fn has_profile(&self, user_id: UserId, role: Role) -> bool {
        match role {
            Role::Student => self.students.contains_key(&user_id),
            Role::Professor => self.professors.contains_key(&user_id),
        }
    }

    fn insert_app(&mut self, course_id: CourseId, draft: AppDraft) -> StoreResult<App> {
        if !self.courses.contains_key(&course_id) {
            return Err(StoreError::not_found("Course", course_id));
        }

        let id = next_id(&mut self.last_app_id);
        let app = App {
            id,
            course_id,
            name: draft.name,
            intro: draft.intro,
            start_time: draft.start_time,
            end_time: draft.end_time,
            num_entries: draft.num_entries,
            max_students: draft.max_students,
            template_link: draft.template_link,
        };
        self.apps.insert(id, app.clone());
        Ok(app)
    }

    fn replace_app(&mut self, id: AppId, draft: AppDraft) -> StoreResult<App> {
        let app = self
            .apps
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("App", id))?;
        app.name = draft.name;
        app.intro = draft.intro;
        app.start_time = draft.start_time;
        app.end_time = draft.end_time;
        app.num_entries = draft.num_entries;
        app.max_students = draft.max_students;
        app.template_link = draft.template_link;
        Ok(app.clone())
    }

    fn reconcile(&mut self, app_id: AppId, desired: &[String]) -> StoreResult<ReconcileReport> {
        if !self.apps.contains_key(&app_id) {
            return Err(StoreError::not_found("App", app_id));
        }

        let existing: Vec<Stopword> = self
            .stopwords
            .values()
            .filter(|s| s.app_id == app_id)
            .cloned()
            .collect();
        let plan = StopwordPlan::between(&existing, desired);

        for id in &plan.reenable {
            if let Some(row) = self.stopwords.get_mut(id) {
                row.enabled = true;
            }
        }
        for id in &plan.disable {
            if let Some(row) = self.stopwords.get_mut(id) {
                row.enabled = false;
            }
        }
        for word in &plan.insert {
            let id = next_id(&mut self.last_stopword_id);
            self.stopwords.insert(
                id,
                Stopword {
                    id,
                    app_id,
                    word: word.clone(),
                    enabled: true,
                },
            );
        }

        Ok(plan.report())
    }
}

/// In-memory diary store.
#[derive(Debug, Default)]
pub struct MemoryDiaryStore {
    tables: RwLock<Tables>,
}

impl MemoryDiaryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiaryStore for MemoryDiaryStore {
    // =========================================================================
    // User operations
    // =========================================================================

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StoreError::already_exists("User", &user.email));
        }

        let id = next_id(&mut tables.last_user_id);
        let created = User {
            id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            role: user.role,
        };
        match created.role {
            Role::Student => tables.students.insert(id, created.email.clone()),
            Role::Professor => tables.professors.insert(id, created.email.clone()),
        };
        tables.users.insert(id, created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn get_student_profile(&self, id: UserId) -> StoreResult<Option<StudentProfile>> {
        let tables = self.tables.read().await;
        let Some(email) = tables.students.get(&id) else {
            return Ok(None);
        };

        Ok(Some(StudentProfile {
            id,
            email: email.clone(),
            course_ids: tables
                .course_students
                .iter()
                .filter(|(_, s)| *s == id)
                .map(|(c, _)| *c)
                .collect(),
            enrolled_app_ids: tables
                .app_students
                .iter()
                .filter(|(_, s)| *s == id)
                .map(|(a, _)| *a)
                .collect(),
        }))
    }

    // =========================================================================
    // Course operations
    // =========================================================================

    async fn create_course(
        &self,
        draft: CourseDraft,
        professor_id: UserId,
    ) -> StoreResult<Course> {
        let mut tables = self.tables.write().await;
        if !tables.has_profile(professor_id, Role::Professor) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "user {} has no professor profile",
                professor_id
            )));
        }

        let id = next_id(&mut tables.last_course_id);
        let course = Course {
            id,
            name: draft.name,
            identifier: draft.identifier,
        };
        tables.courses.insert(id, course.clone());
        tables.course_professors.insert((id, professor_id));
        Ok(course)
    }

    async fn update_course(&self, id: CourseId, draft: CourseDraft) -> StoreResult<Course> {
        let mut tables = self.tables.write().await;
        let course = tables
            .courses
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Course", id))?;
        course.name = draft.name;
        course.identifier = draft.identifier;
        Ok(course.clone())
    }

    async fn list_courses_for(&self, user_id: UserId) -> StoreResult<Vec<Course>> {
        let tables = self.tables.read().await;
        Ok(tables
            .courses
            .values()
            .filter(|c| tables.membership(c.id, user_id).is_member())
            .cloned()
            .collect())
    }

    // =========================================================================
    // Membership operations
    // =========================================================================

    async fn bind_to_course(
        &self,
        course_id: CourseId,
        user_id: UserId,
        role: Role,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.courses.contains_key(&course_id) {
            return Err(StoreError::not_found("Course", course_id));
        }
        if !tables.has_profile(user_id, role) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "user {} has no {} profile",
                user_id, role
            )));
        }

        let inserted = match role {
            Role::Student => tables.course_students.insert((course_id, user_id)),
            Role::Professor => tables.course_professors.insert((course_id, user_id)),
        };
        Ok(inserted)
    }

    async fn enroll_in_app(
        &self,
        app_id: AppId,
        student_id: UserId,
    ) -> StoreResult<EnrollOutcome> {
        let mut tables = self.tables.write().await;
        let max_students = tables
            .apps
            .get(&app_id)
            .map(|a| a.max_students)
            .ok_or_else(|| StoreError::not_found("App", app_id))?;
        if !tables.has_profile(student_id, Role::Student) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "user {} has no student profile",
                student_id
            )));
        }

        let enrolled_count = tables.enrollment_count(app_id);
        if tables.app_students.contains(&(app_id, student_id)) {
            return Ok(EnrollOutcome::AlreadyEnrolled { enrolled_count });
        }
        if enrolled_count >= max_students {
            return Ok(EnrollOutcome::CapacityExceeded { max_students });
        }

        tables.app_students.insert((app_id, student_id));
        Ok(EnrollOutcome::Enrolled {
            enrolled_count: enrolled_count + 1,
        })
    }

    async fn list_enrolled_app_ids(&self, student_id: UserId) -> StoreResult<Vec<AppId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .app_students
            .iter()
            .filter(|(_, s)| *s == student_id)
            .map(|(a, _)| *a)
            .collect())
    }

    // =========================================================================
    // Hierarchy reads
    // =========================================================================

    async fn load_chain(&self, query: &ChainQuery) -> StoreResult<ChainSnapshot> {
        let tables = self.tables.read().await;

        let mut snapshot = ChainSnapshot {
            course: tables.courses.get(&query.course_id).cloned(),
            membership: tables.membership(query.course_id, query.user_id),
            ..Default::default()
        };

        if let Some(app_id) = query.app_id {
            snapshot.app = tables.apps.get(&app_id).cloned();
            snapshot.app_enrolled = tables.app_students.contains(&(app_id, query.user_id));
            if let Some(subject_id) = query.subject_id {
                snapshot.subject_enrolled = tables.app_students.contains(&(app_id, subject_id));
            }
        }
        if let Some(subject_id) = query.subject_id {
            snapshot.subject_membership = tables.membership(query.course_id, subject_id);
        }
        if let Some(entry_id) = query.entry_id {
            snapshot.entry = tables.entries.get(&entry_id).cloned();
        }

        Ok(snapshot)
    }

    // =========================================================================
    // App operations
    // =========================================================================

    async fn create_app(&self, course_id: CourseId, draft: AppDraft) -> StoreResult<App> {
        self.tables.write().await.insert_app(course_id, draft)
    }

    async fn create_app_with_stopwords(
        &self,
        course_id: CourseId,
        draft: AppDraft,
        stopwords: &[String],
    ) -> StoreResult<(App, ReconcileReport)> {
        let mut tables = self.tables.write().await;
        let app = tables.insert_app(course_id, draft)?;
        let report = tables.reconcile(app.id, stopwords)?;
        Ok((app, report))
    }

    async fn update_app_with_stopwords(
        &self,
        id: AppId,
        draft: AppDraft,
        stopwords: &[String],
    ) -> StoreResult<(App, ReconcileReport)> {
        let mut tables = self.tables.write().await;
        let app = tables.replace_app(id, draft)?;
        let report = tables.reconcile(id, stopwords)?;
        Ok((app, report))
    }

    async fn list_apps(&self, course_id: CourseId) -> StoreResult<Vec<AppSummary>> {
        let tables = self.tables.read().await;
        Ok(tables
            .apps
            .values()
            .filter(|a| a.course_id == course_id)
            .map(|a| AppSummary {
                app: a.clone(),
                enrolled_count: tables.enrollment_count(a.id),
            })
            .collect())
    }

    async fn enrollment_count(&self, app_id: AppId) -> StoreResult<u32> {
        let tables = self.tables.read().await;
        if !tables.apps.contains_key(&app_id) {
            return Err(StoreError::not_found("App", app_id));
        }
        Ok(tables.enrollment_count(app_id))
    }

    // =========================================================================
    // Stopword operations
    // =========================================================================

    async fn list_stopwords(&self, app_id: AppId) -> StoreResult<Vec<Stopword>> {
        let tables = self.tables.read().await;
        Ok(tables
            .stopwords
            .values()
            .filter(|s| s.app_id == app_id)
            .cloned()
            .collect())
    }

    async fn reconcile_stopwords(
        &self,
        app_id: AppId,
        desired: &[String],
    ) -> StoreResult<ReconcileReport> {
        self.tables.write().await.reconcile(app_id, desired)
    }

    // =========================================================================
    // Entry operations
    // =========================================================================

    async fn create_entry(&self, entry: NewEntry) -> StoreResult<Entry> {
        let mut tables = self.tables.write().await;
        if !tables.apps.contains_key(&entry.app_id) {
            return Err(StoreError::not_found("App", entry.app_id));
        }
        if !tables
            .app_students
            .contains(&(entry.app_id, entry.student_id))
        {
            return Err(StoreError::ForeignKeyViolation(format!(
                "student {} is not enrolled in app {}",
                entry.student_id, entry.app_id
            )));
        }

        let id = next_id(&mut tables.last_entry_id);
        let now = Utc::now();
        let created = Entry {
            id,
            student_id: entry.student_id,
            app_id: entry.app_id,
            content: entry.content,
            study_start_time: entry.study_start_time,
            study_duration_minutes: entry.study_duration_minutes,
            created_at: now,
            updated_at: now,
        };
        tables.entries.insert(id, created.clone());
        Ok(created)
    }

    async fn update_entry(&self, id: EntryId, edit: EntryEdit) -> StoreResult<Entry> {
        let mut tables = self.tables.write().await;
        let entry = tables
            .entries
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Entry", id))?;
        entry.apply(edit, Utc::now());
        Ok(entry.clone())
    }

    async fn list_entries(&self, app_id: AppId, filter: &EntryFilter) -> StoreResult<Vec<Entry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .entries
            .values()
            .filter(|e| {
                e.app_id == app_id && filter.student_id.is_none_or(|s| e.student_id == s)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;

    async fn professor(store: &MemoryDiaryStore, email: &str) -> User {
        store
            .create_user(NewUser::new("Pat", "Prof", email, Role::Professor))
            .await
            .unwrap()
    }

    async fn student(store: &MemoryDiaryStore, email: &str) -> User {
        store
            .create_user(NewUser::new("Sam", "Student", email, Role::Student))
            .await
            .unwrap()
    }

    fn app_draft(max_students: u32) -> AppDraft {
        let start = Utc::now();
        AppDraft {
            name: "Reflections".to_string(),
            intro: "Weekly study diary".to_string(),
            start_time: start,
            end_time: start + Duration::days(14),
            num_entries: 4,
            max_students,
            template_link: None,
        }
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicate_email() {
        let store = MemoryDiaryStore::new();
        student(&store, "s@example.edu").await;

        let result = store
            .create_user(NewUser::new("Other", "Person", "s@example.edu", Role::Professor))
            .await;
        assert!(matches!(result, Err(StoreError::AlreadyExists { .. })));

        let result = store
            .create_user(NewUser::new("Other", "Person", "S@Example.edu", Role::Professor))
            .await;
        assert!(matches!(result, Err(StoreError::AlreadyExists { .. })));

        let found = store.get_user_by_email("S@EXAMPLE.EDU").await.unwrap();
        assert_eq!(found.map(|u| u.email), Some("s@example.edu".to_string()));
    }

    #[tokio::test]
    async fn test_bind_is_idempotent() {
        let store = MemoryDiaryStore::new();
        let p = professor(&store, "p@example.edu").await;
        let s = student(&store, "s@example.edu").await;
        let course = store
            .create_course(CourseDraft::new("Diaries", "PSY 101"), p.id)
            .await
            .unwrap();

        assert!(store.bind_to_course(course.id, s.id, Role::Student).await.unwrap());
        assert!(!store.bind_to_course(course.id, s.id, Role::Student).await.unwrap());
        assert!(!store.bind_to_course(course.id, p.id, Role::Professor).await.unwrap());
    }

    #[tokio::test]
    async fn test_bind_requires_matching_profile() {
        let store = MemoryDiaryStore::new();
        let p = professor(&store, "p@example.edu").await;
        let course = store
            .create_course(CourseDraft::new("Diaries", "PSY 101"), p.id)
            .await
            .unwrap();

        let result = store.bind_to_course(course.id, p.id, Role::Student).await;
        assert!(matches!(result, Err(StoreError::ForeignKeyViolation(_))));
    }

    #[tokio::test]
    async fn test_enrollment_scenario() {
        let store = MemoryDiaryStore::new();
        let p = professor(&store, "p@example.edu").await;
        let course = store
            .create_course(CourseDraft::new("Diaries", "PSY 101"), p.id)
            .await
            .unwrap();
        let app = store.create_app(course.id, app_draft(2)).await.unwrap();
        let s1 = student(&store, "s1@example.edu").await;
        let s2 = student(&store, "s2@example.edu").await;
        let s3 = student(&store, "s3@example.edu").await;

        assert_eq!(
            store.enroll_in_app(app.id, s1.id).await.unwrap(),
            EnrollOutcome::Enrolled { enrolled_count: 1 }
        );
        assert_eq!(
            store.enroll_in_app(app.id, s1.id).await.unwrap(),
            EnrollOutcome::AlreadyEnrolled { enrolled_count: 1 }
        );
        assert_eq!(store.enrollment_count(app.id).await.unwrap(), 1);
        assert_eq!(
            store.enroll_in_app(app.id, s2.id).await.unwrap(),
            EnrollOutcome::Enrolled { enrolled_count: 2 }
        );
        assert_eq!(
            store.enroll_in_app(app.id, s3.id).await.unwrap(),
            EnrollOutcome::CapacityExceeded { max_students: 2 }
        );
        assert_eq!(store.enrollment_count(app.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_enrollment_respects_capacity() {
        let store = Arc::new(MemoryDiaryStore::new());
        let p = professor(&store, "p@example.edu").await;
        let course = store
            .create_course(CourseDraft::new("Diaries", "PSY 101"), p.id)
            .await
            .unwrap();
        let app = store.create_app(course.id, app_draft(1)).await.unwrap();
        let s1 = student(&store, "s1@example.edu").await;
        let s2 = student(&store, "s2@example.edu").await;
        let (app_id, s1_id, s2_id) = (app.id, s1.id, s2.id);

        let a = tokio::spawn({
            let store = store.clone();
            async move { store.enroll_in_app(app_id, s1_id).await.unwrap() }
        });
        let b = tokio::spawn({
            let store = store.clone();
            async move { store.enroll_in_app(app_id, s2_id).await.unwrap() }
        });
        let outcomes = [a.await.unwrap(), b.await.unwrap()];

        let enrolled = outcomes
            .iter()
            .filter(|o| matches!(o, EnrollOutcome::Enrolled { .. }))
            .count();
        let rejected = outcomes
            .iter()
            .filter(|o| matches!(o, EnrollOutcome::CapacityExceeded { .. }))
            .count();
        assert_eq!((enrolled, rejected), (1, 1));
        assert_eq!(store.enrollment_count(app_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_scenario() {
        let store = MemoryDiaryStore::new();
        let p = professor(&store, "p@example.edu").await;
        let course = store
            .create_course(CourseDraft::new("Diaries", "PSY 101"), p.id)
            .await
            .unwrap();
        let app = store.create_app(course.id, app_draft(10)).await.unwrap();

        let report = store
            .reconcile_stopwords(app.id, &["the".to_string(), "a".to_string()])
            .await
            .unwrap();
        assert_eq!(report.inserted, 2);

        let report = store
            .reconcile_stopwords(app.id, &["a".to_string()])
            .await
            .unwrap();
        assert_eq!((report.inserted, report.disabled), (0, 1));

        let rows = store.list_stopwords(app.id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.word == "the" && !r.enabled));
        assert!(rows.iter().any(|r| r.word == "a" && r.enabled));
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let store = MemoryDiaryStore::new();
        let p = professor(&store, "p@example.edu").await;
        let course = store
            .create_course(CourseDraft::new("Diaries", "PSY 101"), p.id)
            .await
            .unwrap();
        let app = store.create_app(course.id, app_draft(10)).await.unwrap();
        let desired = vec!["like".to_string(), "really".to_string()];

        store.reconcile_stopwords(app.id, &desired).await.unwrap();
        let first = store.list_stopwords(app.id).await.unwrap();
        let report = store.reconcile_stopwords(app.id, &desired).await.unwrap();
        let second = store.list_stopwords(app.id).await.unwrap();

        assert!(report.is_noop());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_entry_requires_enrollment() {
        let store = MemoryDiaryStore::new();
        let p = professor(&store, "p@example.edu").await;
        let course = store
            .create_course(CourseDraft::new("Diaries", "PSY 101"), p.id)
            .await
            .unwrap();
        let app = store.create_app(course.id, app_draft(10)).await.unwrap();
        let s = student(&store, "s@example.edu").await;

        let new_entry = NewEntry {
            student_id: s.id,
            app_id: app.id,
            content: "Studied for two hours".to_string(),
            study_start_time: None,
            study_duration_minutes: Some(120),
        };
        let result = store.create_entry(new_entry.clone()).await;
        assert!(matches!(result, Err(StoreError::ForeignKeyViolation(_))));

        store.enroll_in_app(app.id, s.id).await.unwrap();
        let entry = store.create_entry(new_entry).await.unwrap();
        assert_eq!(entry.student_id, s.id);

        let listed = store
            .list_entries(app.id, &EntryFilter::new().with_student(s.id))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_load_chain_reports_memberships() {
        let store = MemoryDiaryStore::new();
        let p = professor(&store, "p@example.edu").await;
        let s = student(&store, "s@example.edu").await;
        let course = store
            .create_course(CourseDraft::new("Diaries", "PSY 101"), p.id)
            .await
            .unwrap();
        let app = store.create_app(course.id, app_draft(10)).await.unwrap();
        store.bind_to_course(course.id, s.id, Role::Student).await.unwrap();

        let snapshot = store
            .load_chain(&ChainQuery::course(p.id, course.id).app(app.id).subject(s.id))
            .await
            .unwrap();
        assert_eq!(snapshot.course, Some(course));
        assert!(snapshot.membership.as_professor);
        assert!(snapshot.subject_membership.as_student);
        assert!(!snapshot.subject_enrolled);
        assert_eq!(snapshot.app.map(|a| a.id), Some(app.id));
    }
}
