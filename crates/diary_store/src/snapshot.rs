//! Consistent reads of the course → app → entry hierarchy.

use entities::{App, AppId, Course, CourseId, CourseMembership, Entry, EntryId, UserId};

/// What to load for one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainQuery {
    /// The acting user.
    pub user_id: UserId,
    pub course_id: CourseId,
    pub app_id: Option<AppId>,
    pub entry_id: Option<EntryId>,
    /// Another user whose memberships should be loaded alongside (used when
    /// a professor filters entries by student).
    pub subject_id: Option<UserId>,
}

impl ChainQuery {
    /// Loads a course and the actor's membership in it.
    pub fn course(user_id: UserId, course_id: CourseId) -> Self {
        Self {
            user_id,
            course_id,
            app_id: None,
            entry_id: None,
            subject_id: None,
        }
    }

    /// Also loads an app and the actor's enrollment in it.
    pub fn app(mut self, app_id: AppId) -> Self {
        self.app_id = Some(app_id);
        self
    }

    /// Also loads an entry.
    pub fn entry(mut self, entry_id: EntryId) -> Self {
        self.entry_id = Some(entry_id);
        self
    }

    /// Also loads another user's course membership and app enrollment.
    pub fn subject(mut self, subject_id: UserId) -> Self {
        self.subject_id = Some(subject_id);
        self
    }
}

/// The rows a [`ChainQuery`] asked for, read from a single snapshot.
///
/// Missing rows are `None`; memberships of missing rows are `false`. The
/// snapshot holds no judgement about visibility, that is the resolver's job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainSnapshot {
    pub course: Option<Course>,
    /// The actor's binding to the requested course.
    pub membership: CourseMembership,
    pub app: Option<App>,
    /// Whether the actor is enrolled in the requested app.
    pub app_enrolled: bool,
    pub entry: Option<Entry>,
    /// The subject's binding to the requested course.
    pub subject_membership: CourseMembership,
    /// Whether the subject is enrolled in the requested app.
    pub subject_enrolled: bool,
}
