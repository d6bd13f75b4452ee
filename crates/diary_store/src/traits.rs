//! Store trait definitions.

use async_trait::async_trait;
use entities::{
    App, AppDraft, AppId, AppSummary, Course, CourseDraft, CourseId, EnrollOutcome, Entry,
    EntryEdit, EntryFilter, EntryId, NewEntry, NewUser, ReconcileReport, Role, Stopword,
    StudentProfile, User, UserId,
};

use crate::{ChainQuery, ChainSnapshot, StoreResult};

/// Trait for diary storage operations.
///
/// Implementations must make each call atomic. Nothing is ever deleted.
#[async_trait]
pub trait DiaryStore: Send + Sync {
    // =========================================================================
    // User operations
    // =========================================================================

    /// Creates a user and its role profile in one step. Fails with
    /// `AlreadyExists` when the email is taken, ignoring ASCII case.
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    /// Gets a user by ID.
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Gets a user by email, ignoring ASCII case.
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Gets a student's profile with its course and app memberships.
    async fn get_student_profile(&self, id: UserId) -> StoreResult<Option<StudentProfile>>;

    // =========================================================================
    // Course operations
    // =========================================================================

    /// Creates a course and binds the creating professor to it.
    async fn create_course(&self, draft: CourseDraft, professor_id: UserId)
        -> StoreResult<Course>;

    /// Replaces a course's name and number.
    async fn update_course(&self, id: CourseId, draft: CourseDraft) -> StoreResult<Course>;

    /// Lists the courses a user is bound to, in any capacity.
    async fn list_courses_for(&self, user_id: UserId) -> StoreResult<Vec<Course>>;

    // =========================================================================
    // Membership operations
    // =========================================================================

    /// Binds a user to a course in the given capacity. The user must hold a
    /// profile of that role. Returns `false` if the binding already existed.
    async fn bind_to_course(
        &self,
        course_id: CourseId,
        user_id: UserId,
        role: Role,
    ) -> StoreResult<bool>;

    /// Enrolls a student in an app. Duplicate and capacity checks happen in
    /// the same atomic step as the insert.
    async fn enroll_in_app(&self, app_id: AppId, student_id: UserId)
        -> StoreResult<EnrollOutcome>;

    /// Lists the ids of the apps a student is enrolled in.
    async fn list_enrolled_app_ids(&self, student_id: UserId) -> StoreResult<Vec<AppId>>;

    // =========================================================================
    // Hierarchy reads
    // =========================================================================

    /// Loads everything a [`ChainQuery`] names from one consistent snapshot.
    async fn load_chain(&self, query: &ChainQuery) -> StoreResult<ChainSnapshot>;

    // =========================================================================
    // App operations
    // =========================================================================

    /// Creates an app bound to a course.
    async fn create_app(&self, course_id: CourseId, draft: AppDraft) -> StoreResult<App>;

    /// Creates an app and reconciles its initial stopwords in the same
    /// transaction.
    async fn create_app_with_stopwords(
        &self,
        course_id: CourseId,
        draft: AppDraft,
        stopwords: &[String],
    ) -> StoreResult<(App, ReconcileReport)>;

    /// Replaces an app's editable fields and reconciles its stopwords in the
    /// same transaction. The course binding is untouched.
    async fn update_app_with_stopwords(
        &self,
        id: AppId,
        draft: AppDraft,
        stopwords: &[String],
    ) -> StoreResult<(App, ReconcileReport)>;

    /// Lists the apps of a course with their enrollment counts.
    async fn list_apps(&self, course_id: CourseId) -> StoreResult<Vec<AppSummary>>;

    /// Returns the number of students enrolled in an app.
    async fn enrollment_count(&self, app_id: AppId) -> StoreResult<u32>;

    // =========================================================================
    // Stopword operations
    // =========================================================================

    /// Lists all stopword rows of an app, disabled ones included.
    async fn list_stopwords(&self, app_id: AppId) -> StoreResult<Vec<Stopword>>;

    /// Reconciles an app's stopwords against the desired set in a single
    /// transaction. See [`crate::StopwordPlan`].
    async fn reconcile_stopwords(
        &self,
        app_id: AppId,
        desired: &[String],
    ) -> StoreResult<ReconcileReport>;

    // =========================================================================
    // Entry operations
    // =========================================================================

    /// Creates an entry. The author must be enrolled in the app at this
    /// moment, otherwise `ForeignKeyViolation`.
    async fn create_entry(&self, entry: NewEntry) -> StoreResult<Entry>;

    /// Applies an edit to an entry's content and study fields.
    async fn update_entry(&self, id: EntryId, edit: EntryEdit) -> StoreResult<Entry>;

    /// Lists an app's entries, oldest first.
    async fn list_entries(&self, app_id: AppId, filter: &EntryFilter) -> StoreResult<Vec<Entry>>;
}
