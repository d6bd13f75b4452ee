//! Course entity definitions.

use serde::{Deserialize, Serialize};

use crate::CourseId;

/// A course. Students and professors are bound to it through memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Unique identifier.
    pub id: CourseId,
    /// Course name.
    pub name: String,
    /// Course number, not guaranteed to be globally unique.
    pub identifier: String,
}

/// Name and number of a course, used for creation and edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseDraft {
    pub name: String,
    pub identifier: String,
}

impl CourseDraft {
    pub fn new(name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifier: identifier.into(),
        }
    }
}

/// How a user is bound to a course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseMembership {
    /// Bound through the course/student table.
    pub as_student: bool,
    /// Bound through the course/professor table.
    pub as_professor: bool,
}

impl CourseMembership {
    /// Returns true if the user is bound in any capacity.
    pub fn is_member(&self) -> bool {
        self.as_student || self.as_professor
    }
}
