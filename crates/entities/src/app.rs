//! App entity definitions.
//!
//! An app is a time-boxed journaling assignment inside a course. Students
//! enroll into it (up to `max_students`) and then submit entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AppId, CourseId};

/// A journaling app bound to a single course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    /// Unique identifier.
    pub id: AppId,
    /// The course this app was created in.
    pub course_id: CourseId,
    /// Display name.
    pub name: String,
    /// Introduction shown to students.
    pub intro: String,
    /// When the study starts.
    pub start_time: DateTime<Utc>,
    /// When the study ends.
    pub end_time: DateTime<Utc>,
    /// Target number of entries per student.
    pub num_entries: u32,
    /// Enrollment capacity.
    pub max_students: u32,
    /// Optional link to an entry template.
    pub template_link: Option<String>,
}

/// An app together with its current enrollment count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSummary {
    pub app: App,
    pub enrolled_count: u32,
}

/// Editable fields of an app. Used both for creation and edits; the course
/// binding is never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDraft {
    pub name: String,
    pub intro: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub num_entries: u32,
    pub max_students: u32,
    pub template_link: Option<String>,
}

impl AppDraft {
    /// Checks the field constraints, returning a description of the first
    /// violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("App name must not be empty".to_string());
        }
        if self.start_time >= self.end_time {
            return Err("App start time must be before its end time".to_string());
        }
        if self.num_entries == 0 {
            return Err("Number of entries must be at least 1".to_string());
        }
        if self.max_students == 0 {
            return Err("Maximum number of students must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Result of an enrollment attempt, decided atomically by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnrollOutcome {
    /// The student was added. Carries the new enrollment count.
    Enrolled { enrolled_count: u32 },
    /// The student was already enrolled; nothing changed.
    AlreadyEnrolled { enrolled_count: u32 },
    /// The app is full; nothing changed.
    CapacityExceeded { max_students: u32 },
}
