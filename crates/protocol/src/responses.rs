//! Response payloads placed in the envelope's `data` field.

use chrono::{DateTime, Utc};
use entities::{
    App, AppId, AppSummary, Course, CourseId, Entry, EntryId, ReconcileReport, Role,
    StudentProfile, User, UserId,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Auth and users
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAuthResponse {
    pub is_registered: bool,
    pub email: String,
    pub jwt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub jwt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentView {
    pub email: String,
    pub courses: Vec<CourseId>,
    pub enrolled_apps: Vec<AppId>,
}

impl From<StudentProfile> for StudentView {
    fn from(profile: StudentProfile) -> Self {
        Self {
            email: profile.email,
            courses: profile.course_ids,
            enrolled_apps: profile.enrolled_app_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfileResponse {
    pub user: UserView,
    /// Present only for students.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<StudentView>,
}

// ============================================================================
// Courses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
    pub course_id: CourseId,
    pub course_name: String,
    pub course_number: String,
}

impl From<&Course> for CourseView {
    fn from(course: &Course) -> Self {
        Self {
            course_id: course.id,
            course_name: course.name.clone(),
            course_number: course.identifier.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseListResponse {
    pub courses: Vec<CourseView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseResponse {
    pub course: CourseView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinCourseResponse {
    pub course_id: CourseId,
    /// The capacity the caller is bound in.
    pub role: Role,
    pub already_member: bool,
}

// ============================================================================
// Apps
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppView {
    pub id: AppId,
    pub course_id: CourseId,
    pub name: String,
    pub intro: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub num_entries: u32,
    pub max_students: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_students: Option<u32>,
    /// Whether the calling student is enrolled. Absent for professors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_enrolled: Option<bool>,
}

impl AppView {
    pub fn with_enrollment(mut self, is_enrolled: bool) -> Self {
        self.is_enrolled = Some(is_enrolled);
        self
    }

    pub fn with_count(mut self, num_students: u32) -> Self {
        self.num_students = Some(num_students);
        self
    }
}

impl From<&App> for AppView {
    fn from(app: &App) -> Self {
        Self {
            id: app.id,
            course_id: app.course_id,
            name: app.name.clone(),
            intro: app.intro.clone(),
            start_time: app.start_time,
            end_time: app.end_time,
            num_entries: app.num_entries,
            max_students: app.max_students,
            template_link: app.template_link.clone(),
            num_students: None,
            is_enrolled: None,
        }
    }
}

impl From<&AppSummary> for AppView {
    fn from(summary: &AppSummary) -> Self {
        AppView::from(&summary.app).with_count(summary.enrolled_count)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppListResponse {
    pub apps: Vec<AppView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppDetailResponse {
    pub app: AppView,
    /// Enabled stopwords, alphabetical.
    pub stopwords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSavedResponse {
    pub app: AppView,
    pub stopwords: StopwordChanges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopwordChanges {
    pub inserted: usize,
    pub reenabled: usize,
    pub disabled: usize,
    pub unchanged: usize,
}

impl From<ReconcileReport> for StopwordChanges {
    fn from(report: ReconcileReport) -> Self {
        Self {
            inserted: report.inserted,
            reenabled: report.reenabled,
            disabled: report.disabled,
            unchanged: report.unchanged,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinAppResponse {
    pub app_id: AppId,
    pub enrolled_count: u32,
}

// ============================================================================
// Entries
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    pub entry_id: EntryId,
    pub student_id: UserId,
    pub app_id: AppId,
    pub content: String,
    pub study_start_time: Option<DateTime<Utc>>,
    pub study_duration_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Entry> for EntryView {
    fn from(entry: &Entry) -> Self {
        Self {
            entry_id: entry.id,
            student_id: entry.student_id,
            app_id: entry.app_id,
            content: entry.content.clone(),
            study_start_time: entry.study_start_time,
            study_duration_minutes: entry.study_duration_minutes,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryListResponse {
    pub entries: Vec<EntryView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryResponse {
    pub entry: EntryView,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        let start = Utc::now();
        App {
            id: 3,
            course_id: 1,
            name: "Week 1".to_string(),
            intro: "Reflect".to_string(),
            start_time: start,
            end_time: start + chrono::Duration::days(7),
            num_entries: 4,
            max_students: 20,
            template_link: None,
        }
    }

    #[test]
    fn test_course_view_field_names() {
        let course = Course {
            id: 9,
            name: "Calculus I".to_string(),
            identifier: "MATH 101".to_string(),
        };
        let value = serde_json::to_value(CourseView::from(&course)).unwrap();

        assert_eq!(value["courseId"], 9);
        assert_eq!(value["courseName"], "Calculus I");
        assert_eq!(value["courseNumber"], "MATH 101");
    }

    #[test]
    fn test_app_view_omits_unset_optionals() {
        let value = serde_json::to_value(AppView::from(&app())).unwrap();

        assert_eq!(value["maxStudents"], 20);
        assert!(value.get("numStudents").is_none());
        assert!(value.get("isEnrolled").is_none());
        assert!(value.get("templateLink").is_none());
    }

    #[test]
    fn test_app_view_from_summary() {
        let summary = AppSummary {
            app: app(),
            enrolled_count: 5,
        };
        let view = AppView::from(&summary).with_enrollment(true);
        let value = serde_json::to_value(view).unwrap();

        assert_eq!(value["numStudents"], 5);
        assert_eq!(value["isEnrolled"], true);
    }

    #[test]
    fn test_student_profile_view() {
        let view = StudentView::from(StudentProfile {
            id: 2,
            email: "s@example.edu".to_string(),
            course_ids: vec![1],
            enrolled_app_ids: vec![3, 4],
        });
        let value = serde_json::to_value(view).unwrap();

        assert_eq!(value["enrolledApps"], serde_json::json!([3, 4]));
    }
}
