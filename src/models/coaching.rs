// src/models/coaching.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;
use validator::{Validate, ValidationError};

/// Represents the 'coaching_groups' table: a cohort of candidates.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CoachingGroup {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Live call; only `meeting_url` matters.
    Meeting,
    /// Scored quiz over `range_start..=range_end`.
    Quiz,
}

/// Represents the 'coaching_sessions' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CoachingSession {
    pub id: i64,
    pub group_id: i64,
    pub title: String,
    pub kind: SessionKind,
    pub meeting_url: Option<String>,
    /// Quiz questions come from this exam's ordered list, or the whole active bank.
    pub exam_id: Option<i64>,
    /// 1-based, inclusive.
    pub range_start: Option<i32>,
    pub range_end: Option<i32>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl CoachingSession {
    /// Returns `(offset, limit)` into the ordered question list.
    pub fn quiz_window(&self) -> Option<(i64, i64)> {
        match (self.kind, self.range_start, self.range_end) {
            (SessionKind::Quiz, Some(start), Some(end)) if start >= 1 && end >= start => {
                Some((i64::from(start - 1), i64::from(end - start + 1)))
            }
            _ => None,
        }
    }
}

/// Represents the 'session_attempts' table. Latest attempt wins.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SessionAttempt {
    pub session_id: i64,
    pub user_id: i64,
    pub score: i32,
    pub total_questions: i32,
    pub percentage: f64,
    pub attempts: i32,
    pub updated_at: DateTime<Utc>,
}

/// Scoreboard row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SessionScore {
    pub user_id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub score: i32,
    pub total_questions: i32,
    pub percentage: f64,
    pub attempts: i32,
}

/// Member listing row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GroupMember {
    pub user_id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateGroupRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: i64,
}

/// DTO for creating or fully replacing a session's configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = validate_session_config))]
pub struct SessionConfigRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub kind: SessionKind,
    pub meeting_url: Option<String>,
    pub exam_id: Option<i64>,
    pub range_start: Option<i32>,
    pub range_end: Option<i32>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

fn validate_session_config(req: &SessionConfigRequest) -> Result<(), ValidationError> {
    match req.kind {
        SessionKind::Meeting => {
            let url = req
                .meeting_url
                .as_deref()
                .ok_or_else(|| ValidationError::new("meeting_url_required"))?;
            let parsed = Url::parse(url).map_err(|_| ValidationError::new("invalid_meeting_url"))?;
            if parsed.scheme() != "https" && parsed.scheme() != "http" {
                return Err(ValidationError::new("invalid_meeting_url"));
            }
        }
        SessionKind::Quiz => match (req.range_start, req.range_end) {
            (Some(start), Some(end)) if start >= 1 && end >= start && end - start < 400 => {}
            _ => return Err(ValidationError::new("invalid_question_range")),
        },
    }
    Ok(())
}

/// DTO for patching a session. Merged over the stored row and re-validated.
#[derive(Debug, Deserialize)]
pub struct UpdateSessionRequest {
    pub title: Option<String>,
    pub kind: Option<SessionKind>,
    pub meeting_url: Option<String>,
    pub exam_id: Option<i64>,
    pub range_start: Option<i32>,
    pub range_end: Option<i32>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl UpdateSessionRequest {
    pub fn merge_into(self, current: CoachingSession) -> SessionConfigRequest {
        SessionConfigRequest {
            title: self.title.unwrap_or(current.title),
            kind: self.kind.unwrap_or(current.kind),
            meeting_url: self.meeting_url.or(current.meeting_url),
            exam_id: self.exam_id.or(current.exam_id),
            range_start: self.range_start.or(current.range_start),
            range_end: self.range_end.or(current.range_end),
            scheduled_at: self.scheduled_at.or(current.scheduled_at),
        }
    }
}
