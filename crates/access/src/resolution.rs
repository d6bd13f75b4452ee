//! Typed outcomes of an access decision.

use serde::Serialize;
use thiserror::Error;

/// The kind of entity a denial refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Course,
    App,
    Entry,
    Student,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Course => "Course",
            Self::App => "App",
            Self::Entry => "Entry",
            Self::Student => "Student",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an otherwise visible entity may not be acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForbiddenReason {
    /// Only a professor bound to the course may do this.
    ProfessorRequired,
    /// Only students author entries.
    StudentRequired,
    /// Only the authoring student may change an entry.
    AuthorRequired,
    /// Students only list their own entries.
    OtherStudentsEntries,
    /// The request names an account other than the caller's.
    IdentityMismatch,
}

impl std::fmt::Display for ForbiddenReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ProfessorRequired => "a professor of this course is required",
            Self::StudentRequired => "only students can do this",
            Self::AuthorRequired => "only the author can change this entry",
            Self::OtherStudentsEntries => "students can only see their own entries",
            Self::IdentityMismatch => "the email does not match the signed-in account",
        })
    }
}

/// An authorization denial. Each variant is observably distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "denial", rename_all = "snake_case")]
pub enum Denial {
    /// The entity does not exist, or does not exist for this actor.
    #[error("{kind} not found")]
    NotFound { kind: EntityKind },

    /// The student belongs to the course but not to the app.
    #[error("Not enrolled in app")]
    NotEnrolledInApp,

    /// The entity is visible but the action needs a stricter role.
    #[error("Forbidden: {reason}")]
    Forbidden { reason: ForbiddenReason },
}

impl Denial {
    pub fn not_found(kind: EntityKind) -> Self {
        Self::NotFound { kind }
    }

    pub fn forbidden(reason: ForbiddenReason) -> Self {
        Self::Forbidden { reason }
    }
}

/// Result of resolving an entity for an actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Granted(T),
    Denied(Denial),
}

impl<T> Resolution<T> {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// Returns the denial, if any.
    pub fn denial(&self) -> Option<Denial> {
        match self {
            Self::Granted(_) => None,
            Self::Denied(d) => Some(*d),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolution<U> {
        match self {
            Self::Granted(v) => Resolution::Granted(f(v)),
            Self::Denied(d) => Resolution::Denied(d),
        }
    }

    /// Continues with a further check on the granted value.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Resolution<U>) -> Resolution<U> {
        match self {
            Self::Granted(v) => f(v),
            Self::Denied(d) => Resolution::Denied(d),
        }
    }

    pub fn into_result(self) -> Result<T, Denial> {
        match self {
            Self::Granted(v) => Ok(v),
            Self::Denied(d) => Err(d),
        }
    }
}

impl<T> From<Denial> for Resolution<T> {
    fn from(denial: Denial) -> Self {
        Self::Denied(denial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_then_short_circuits() {
        let denied: Resolution<u32> = Denial::NotEnrolledInApp.into();
        let chained = denied.and_then(|v| Resolution::Granted(v + 1));
        assert_eq!(chained.denial(), Some(Denial::NotEnrolledInApp));

        let granted = Resolution::Granted(1).and_then(|v| Resolution::Granted(v + 1));
        assert_eq!(granted.into_result(), Ok(2));
    }

    #[test]
    fn test_denial_messages_are_distinct() {
        let messages = [
            Denial::not_found(EntityKind::Course).to_string(),
            Denial::not_found(EntityKind::App).to_string(),
            Denial::NotEnrolledInApp.to_string(),
            Denial::forbidden(ForbiddenReason::ProfessorRequired).to_string(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
