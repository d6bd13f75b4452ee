//! User-related entity definitions.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{AppId, CourseId, UserId};

/// Role of a user. Decides which profile backs the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Submits entries into the apps they joined.
    Student,
    /// Owns courses and reads analytics.
    Professor,
}

impl Role {
    /// Returns the lowercase name used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Professor => "professor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "professor" => Ok(Self::Professor),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier, shared with the role profile.
    pub id: UserId,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Email address (unique).
    pub email: String,
    /// Role, fixed at registration.
    pub role: Role,
}

/// Registration data for a new user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
}

impl NewUser {
    /// Creates registration data.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            role,
        }
    }
}

/// Student profile with its memberships, as reported to the student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    /// Same as the user id.
    pub id: UserId,
    pub email: String,
    /// Courses the student is bound to.
    pub course_ids: Vec<CourseId>,
    /// Apps the student is enrolled in.
    pub enrolled_app_ids: Vec<AppId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("student".parse::<Role>().unwrap(), Role::Student);
        assert_eq!(" Professor ".parse::<Role>().unwrap(), Role::Professor);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&Role::Professor).unwrap();
        assert_eq!(json, "\"professor\"");
    }
}
