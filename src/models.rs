use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

// Persisted records. Field names mirror the storage columns, so these
// serialize straight into the API responses.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Professor {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub title: String,
    pub department: String,
    pub email: Option<String>,
    pub office_location: Option<String>,
    pub courses: Option<String>,
    pub bio: Option<String>,
    pub created_by: String,
    pub created_at: i64,
}

/// Slim professor shape embedded in a user's own rating list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfessorSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub title: String,
    pub department: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub id: String,
    pub professor_id: String,
    pub user_id: String,
    pub course_code: String,
    pub is_online: bool,
    pub rating: i64,
    pub difficulty: i64,
    pub would_take_again: bool,
    pub for_credit: Option<bool>,
    pub used_textbooks: Option<bool>,
    pub attendance_mandatory: Option<bool>,
    pub grade: Option<String>,
    pub tags: Vec<String>,
    pub review: String,
    pub created_at: i64,
}

/// A rating joined with the professor it belongs to, for profile views.
#[derive(Debug, Clone, Serialize)]
pub struct UserRating {
    #[serde(flatten)]
    pub rating: Rating,
    pub professor: ProfessorSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumMessage {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
    pub created_at: i64,
}

/// The signed-in user's profile as returned to clients. Never carries
/// the stored credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub student_id: Option<String>,
    pub graduation_year: Option<String>,
    pub major: Option<String>,
    pub created_at: i64,
}

// Request payloads. Clients send camelCase; required fields are modeled
// as Options so a missing field surfaces as a 400 with a message rather
// than a deserialization rejection.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfessor {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    pub office_location: Option<String>,
    pub courses: Option<String>,
    pub bio: Option<String>,
}

impl NewProfessor {
    pub fn validate(&self) -> AppResult<()> {
        let required = [
            &self.first_name,
            &self.last_name,
            &self.title,
            &self.department,
        ];
        if required
            .iter()
            .any(|f| f.as_deref().map_or(true, |v| v.trim().is_empty()))
        {
            return Err(AppError::Validation("Missing required fields".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRating {
    pub course_code: Option<String>,
    #[serde(default)]
    pub is_online_course: bool,
    pub overall_rating: Option<i64>,
    pub difficulty: Option<i64>,
    pub would_take_again: Option<bool>,
    pub taken_for_credit: Option<bool>,
    pub used_textbooks: Option<bool>,
    pub attendance_mandatory: Option<bool>,
    pub grade_received: Option<String>,
    #[serde(default)]
    pub selected_tags: Vec<String>,
    pub review: Option<String>,
}

impl NewRating {
    pub fn validate(&self) -> AppResult<()> {
        let has_course = self
            .course_code
            .as_deref()
            .map_or(false, |c| !c.trim().is_empty());
        let has_review = self
            .review
            .as_deref()
            .map_or(false, |r| !r.trim().is_empty());
        if !has_course
            || !has_review
            || self.overall_rating.is_none()
            || self.difficulty.is_none()
            || self.would_take_again.is_none()
        {
            return Err(AppError::Validation("Missing required fields".to_string()));
        }

        let rating = self.overall_rating.unwrap_or_default();
        let difficulty = self.difficulty.unwrap_or_default();
        if !(1..=5).contains(&rating) || !(1..=5).contains(&difficulty) {
            return Err(AppError::Validation(
                "Rating and difficulty must be between 1 and 5".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct NewForumMessage {
    pub content: Option<String>,
}

impl NewForumMessage {
    pub const MAX_CONTENT_LEN: usize = 1000;

    /// Returns the trimmed message body, or a validation error.
    pub fn validate(&self) -> AppResult<String> {
        let content = self.content.as_deref().unwrap_or("").trim();
        if content.is_empty() {
            return Err(AppError::Validation(
                "Message content is required".to_string(),
            ));
        }
        if content.chars().count() > Self::MAX_CONTENT_LEN {
            return Err(AppError::Validation(format!(
                "Message content must be at most {} characters",
                Self::MAX_CONTENT_LEN
            )));
        }
        Ok(content.to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub student_id: Option<String>,
    pub graduation_year: Option<String>,
    pub major: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_rating() -> NewRating {
        NewRating {
            course_code: Some("CSCE 2100".to_string()),
            is_online_course: false,
            overall_rating: Some(4),
            difficulty: Some(3),
            would_take_again: Some(true),
            taken_for_credit: Some(true),
            used_textbooks: None,
            attendance_mandatory: None,
            grade_received: Some("A".to_string()),
            selected_tags: vec!["Caring".to_string()],
            review: Some("Great lectures".to_string()),
        }
    }

    #[test]
    fn professor_requires_all_four_fields() {
        let mut p = NewProfessor {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            title: Some("Professor".to_string()),
            department: Some("Computer Science".to_string()),
            email: None,
            office_location: None,
            courses: None,
            bio: None,
        };
        assert!(p.validate().is_ok());

        p.department = None;
        assert!(p.validate().is_err());

        p.department = Some("   ".to_string());
        assert!(p.validate().is_err());
    }

    #[test]
    fn rating_requires_core_fields() {
        assert!(full_rating().validate().is_ok());

        let mut r = full_rating();
        r.review = None;
        assert!(r.validate().is_err());

        let mut r = full_rating();
        r.would_take_again = None;
        assert!(r.validate().is_err());
    }

    #[test]
    fn rating_bounds_are_enforced() {
        let mut r = full_rating();
        r.overall_rating = Some(6);
        assert!(r.validate().is_err());

        let mut r = full_rating();
        r.difficulty = Some(0);
        assert!(r.validate().is_err());
    }

    #[test]
    fn forum_message_trims_and_caps() {
        let msg = NewForumMessage {
            content: Some("  hello  ".to_string()),
        };
        assert_eq!(msg.validate().unwrap(), "hello");

        let empty = NewForumMessage {
            content: Some("   ".to_string()),
        };
        assert!(empty.validate().is_err());

        let long = NewForumMessage {
            content: Some("x".repeat(NewForumMessage::MAX_CONTENT_LEN + 1)),
        };
        assert!(long.validate().is_err());
    }
}
