//! Access policy over a loaded chain snapshot.
//!
//! Every function here is pure: the same actor, ids and snapshot always give
//! the same answer. Checks run top-down (course, then app, then entry) and
//! stop at the first denial.

use diary_store::ChainSnapshot;
use entities::{App, Course, Entry, EntryFilter, Role, UserId};

use crate::{Actor, Denial, EntityKind, ForbiddenReason, Resolution};

/// What the actor wants to do with a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseAccess {
    /// Read the course and list its apps.
    View,
    /// Change the course.
    Edit,
}

/// What the actor wants to do with an app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAccess {
    /// Read the app's metadata. Course membership suffices.
    Metadata,
    /// Read the app's entries: enrolled students and bound professors.
    Entries,
    /// Submit an entry: enrolled students only.
    Contribute,
    /// Edit the app or read its analytics: bound professors only.
    Manage,
}

/// What the actor wants to do with an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAccess {
    Read,
    Write,
}

/// An app together with the course it was resolved through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedApp {
    pub course: Course,
    pub app: App,
}

fn is_bound_professor(actor: &Actor, snapshot: &ChainSnapshot) -> bool {
    actor.role == Role::Professor && snapshot.membership.as_professor
}

/// Resolves the course of the snapshot.
///
/// A course the actor is not bound to does not exist for them.
pub fn course(actor: &Actor, snapshot: &ChainSnapshot, access: CourseAccess) -> Resolution<Course> {
    let Some(course) = snapshot.course.as_ref() else {
        return Denial::not_found(EntityKind::Course).into();
    };
    if !snapshot.membership.is_member() {
        return Denial::not_found(EntityKind::Course).into();
    }

    match access {
        CourseAccess::View => Resolution::Granted(course.clone()),
        CourseAccess::Edit if is_bound_professor(actor, snapshot) => {
            Resolution::Granted(course.clone())
        }
        CourseAccess::Edit => Denial::forbidden(ForbiddenReason::ProfessorRequired).into(),
    }
}

/// Resolves the app of the snapshot through its course.
///
/// The app must be bound to the requested course; an app reached through
/// the wrong course is not found.
pub fn app(actor: &Actor, snapshot: &ChainSnapshot, access: AppAccess) -> Resolution<ResolvedApp> {
    course(actor, snapshot, CourseAccess::View).and_then(|course| {
        let app = match snapshot.app.as_ref() {
            Some(app) if app.course_id == course.id => app.clone(),
            _ => return Denial::not_found(EntityKind::App).into(),
        };

        let professor = is_bound_professor(actor, snapshot);
        let student = actor.role == Role::Student && snapshot.membership.as_student;

        let verdict = match access {
            AppAccess::Metadata => None,
            AppAccess::Entries if professor => None,
            AppAccess::Entries | AppAccess::Contribute if student && !snapshot.app_enrolled => {
                Some(Denial::NotEnrolledInApp)
            }
            AppAccess::Entries if student => None,
            AppAccess::Contribute if student => None,
            AppAccess::Contribute => Some(Denial::forbidden(ForbiddenReason::StudentRequired)),
            AppAccess::Manage if professor => None,
            AppAccess::Entries | AppAccess::Manage => {
                Some(Denial::forbidden(ForbiddenReason::ProfessorRequired))
            }
        };

        match verdict {
            Some(denial) => denial.into(),
            None => Resolution::Granted(ResolvedApp { course, app }),
        }
    })
}

/// Resolves the entry of the snapshot through its app and course.
///
/// Bound professors may read any entry of the app but never write one. A
/// student only ever sees their own entries; anybody else's entry is not
/// found for them.
pub fn entry(actor: &Actor, snapshot: &ChainSnapshot, access: EntryAccess) -> Resolution<Entry> {
    app(actor, snapshot, AppAccess::Entries).and_then(|resolved| {
        let entry = match snapshot.entry.as_ref() {
            Some(entry) if entry.app_id == resolved.app.id => entry,
            _ => return Denial::not_found(EntityKind::Entry).into(),
        };

        match actor.role {
            Role::Professor => match access {
                EntryAccess::Read => Resolution::Granted(entry.clone()),
                EntryAccess::Write => Denial::forbidden(ForbiddenReason::AuthorRequired).into(),
            },
            Role::Student if entry.student_id == actor.user_id => {
                Resolution::Granted(entry.clone())
            }
            Role::Student => Denial::not_found(EntityKind::Entry).into(),
        }
    })
}

/// Decides which entries of the app the actor may list, optionally narrowed
/// to one student.
///
/// The snapshot must have been loaded with the requested student as its
/// subject.
pub fn entry_scope(
    actor: &Actor,
    snapshot: &ChainSnapshot,
    requested: Option<UserId>,
) -> Resolution<(ResolvedApp, EntryFilter)> {
    app(actor, snapshot, AppAccess::Entries).and_then(|resolved| {
        let filter = match (actor.role, requested) {
            (Role::Student, Some(student_id)) if student_id != actor.user_id => {
                return Denial::forbidden(ForbiddenReason::OtherStudentsEntries).into();
            }
            (Role::Student, _) => EntryFilter::new().with_student(actor.user_id),
            (Role::Professor, None) => EntryFilter::new(),
            (Role::Professor, Some(_)) if !snapshot.subject_membership.as_student => {
                return Denial::not_found(EntityKind::Student).into();
            }
            (Role::Professor, Some(_)) if !snapshot.subject_enrolled => {
                return Denial::NotEnrolledInApp.into();
            }
            (Role::Professor, Some(student_id)) => EntryFilter::new().with_student(student_id),
        };
        Resolution::Granted((resolved, filter))
    })
}
