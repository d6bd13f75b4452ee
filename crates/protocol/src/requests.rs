//! Request bodies and query strings.

use chrono::{DateTime, Utc};
use entities::{AppDraft, AppId, CourseDraft, EntryEdit, NewEntry, NewUser, Role, UserId};
use serde::{Deserialize, Serialize};

// ============================================================================
// Auth and users
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleAuthQuery {
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err("First and last name are required".to_string());
        }
        if self.email.trim().is_empty() {
            return Err("Email is required".to_string());
        }
        Ok(())
    }

    /// Builds the account under `verified_email`, the spelling the identity
    /// provider vouched for, rather than the submitted one.
    pub fn into_new_user(self, verified_email: &str) -> NewUser {
        NewUser::new(
            self.first_name.trim(),
            self.last_name.trim(),
            verified_email.trim(),
            self.role,
        )
    }
}

// ============================================================================
// Courses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRequest {
    pub course_name: String,
    pub course_number: String,
}

impl CourseRequest {
    pub fn into_draft(self) -> Result<CourseDraft, String> {
        let name = self.course_name.trim();
        let number = self.course_number.trim();
        if name.is_empty() || number.is_empty() {
            return Err("Missing course number or course name".to_string());
        }
        Ok(CourseDraft::new(name, number))
    }
}

// ============================================================================
// Apps
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRequest {
    pub name: String,
    #[serde(default)]
    pub intro: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub num_entries: u32,
    pub max_students: u32,
    #[serde(default)]
    pub template_link: Option<String>,
    /// The complete desired stopword list for the app.
    #[serde(default)]
    pub stopwords: Vec<String>,
}

impl AppRequest {
    /// Splits the request into the validated draft and the stopword list.
    pub fn into_parts(self) -> Result<(AppDraft, Vec<String>), String> {
        let draft = AppDraft {
            name: self.name.trim().to_string(),
            intro: self.intro,
            start_time: self.start_time,
            end_time: self.end_time,
            num_entries: self.num_entries,
            max_students: self.max_students,
            template_link: self.template_link.filter(|l| !l.trim().is_empty()),
        };
        draft.validate()?;
        Ok((draft, self.stopwords))
    }
}

// ============================================================================
// Entries
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRequest {
    pub content: String,
    #[serde(default)]
    pub study_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub study_duration_minutes: Option<u32>,
}

impl EntryRequest {
    fn check(&self) -> Result<(), String> {
        if self.content.trim().is_empty() {
            return Err("Entry content is required".to_string());
        }
        Ok(())
    }

    pub fn into_new_entry(self, student_id: UserId, app_id: AppId) -> Result<NewEntry, String> {
        self.check()?;
        Ok(NewEntry {
            student_id,
            app_id,
            content: self.content,
            study_start_time: self.study_start_time,
            study_duration_minutes: self.study_duration_minutes,
        })
    }

    pub fn into_edit(self) -> Result<EntryEdit, String> {
        self.check()?;
        Ok(EntryEdit {
            content: self.content,
            study_start_time: self.study_start_time,
            study_duration_minutes: self.study_duration_minutes,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryListQuery {
    pub student_id: Option<UserId>,
}

// ============================================================================
// Analytics
// ============================================================================

/// The raw `limit` is parsed by the analytics crate so a malformed value
/// becomes a validation error instead of a rejected query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsQuery {
    pub limit: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_register_request_camel_case() {
        let request: RegisterRequest = serde_json::from_value(json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "Ada@Example.edu",
            "role": "student"
        }))
        .unwrap();

        assert!(request.validate().is_ok());
        let user = request.into_new_user("ada@example.edu");
        assert_eq!(user.role, Role::Student);
        assert_eq!(user.first_name, "Ada");
        assert_eq!(user.email, "ada@example.edu");
    }

    #[test]
    fn test_register_request_rejects_blank_names() {
        let request = RegisterRequest {
            first_name: " ".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.edu".to_string(),
            role: Role::Professor,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_course_request_requires_both_fields() {
        let request = CourseRequest {
            course_name: "Calculus".to_string(),
            course_number: "".to_string(),
        };
        assert!(request.into_draft().is_err());
    }

    #[test]
    fn test_app_request_defaults_and_validation() {
        let start = Utc::now();
        let request: AppRequest = serde_json::from_value(json!({
            "name": "Week 1",
            "startTime": start,
            "endTime": start + Duration::days(7),
            "numEntries": 3,
            "maxStudents": 10
        }))
        .unwrap();

        let (draft, stopwords) = request.into_parts().unwrap();
        assert_eq!(draft.intro, "");
        assert!(stopwords.is_empty());
        assert!(draft.template_link.is_none());
    }

    #[test]
    fn test_app_request_rejects_inverted_window() {
        let start = Utc::now();
        let request = AppRequest {
            name: "Week 1".to_string(),
            intro: String::new(),
            start_time: start,
            end_time: start - Duration::hours(1),
            num_entries: 1,
            max_students: 1,
            template_link: None,
            stopwords: vec![],
        };
        assert!(request.into_parts().is_err());
    }

    #[test]
    fn test_entry_request_requires_content() {
        let request = EntryRequest {
            content: "   ".to_string(),
            study_start_time: None,
            study_duration_minutes: Some(30),
        };
        assert!(request.into_edit().is_err());
    }

    #[test]
    fn test_entry_list_query_student_id() {
        let query: EntryListQuery = serde_json::from_value(json!({"studentId": 4})).unwrap();
        assert_eq!(query.student_id, Some(4));
    }
}
