//! Journal entry definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AppId, EntryId, UserId};

/// One journal submission by an enrolled student.
///
/// `student_id` and `app_id` are fixed at creation. [`EntryEdit`] carries no
/// authorship fields, so the edit path cannot touch them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    /// Authoring student.
    pub student_id: UserId,
    pub app_id: AppId,
    pub content: String,
    /// When the reported study session started.
    pub study_start_time: Option<DateTime<Utc>>,
    /// Length of the reported study session.
    pub study_duration_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    /// Applies an edit, bumping `updated_at`.
    pub fn apply(&mut self, edit: EntryEdit, at: DateTime<Utc>) {
        self.content = edit.content;
        self.study_start_time = edit.study_start_time;
        self.study_duration_minutes = edit.study_duration_minutes;
        self.updated_at = at;
    }
}

/// A new entry, before the store assigns its id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub student_id: UserId,
    pub app_id: AppId,
    pub content: String,
    pub study_start_time: Option<DateTime<Utc>>,
    pub study_duration_minutes: Option<u32>,
}

/// The mutable fields of an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryEdit {
    pub content: String,
    pub study_start_time: Option<DateTime<Utc>>,
    pub study_duration_minutes: Option<u32>,
}

/// Filter options for listing entries of an app.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Only entries authored by this student.
    pub student_id: Option<UserId>,
}

impl EntryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_student(mut self, student_id: UserId) -> Self {
        self.student_id = Some(student_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_keeps_authorship() {
        let created = Utc::now();
        let mut entry = Entry {
            id: 7,
            student_id: 3,
            app_id: 11,
            content: "first draft".to_string(),
            study_start_time: None,
            study_duration_minutes: None,
            created_at: created,
            updated_at: created,
        };

        let later = created + chrono::Duration::minutes(5);
        entry.apply(
            EntryEdit {
                content: "second draft".to_string(),
                study_start_time: Some(created),
                study_duration_minutes: Some(45),
            },
            later,
        );

        assert_eq!(entry.student_id, 3);
        assert_eq!(entry.app_id, 11);
        assert_eq!(entry.content, "second draft");
        assert_eq!(entry.study_duration_minutes, Some(45));
        assert_eq!(entry.created_at, created);
        assert_eq!(entry.updated_at, later);
    }
}
