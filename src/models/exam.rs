// src/models/exam.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use crate::config::SIMULATION_DURATION_SECS;
use crate::models::question::PublicQuestion;
use crate::utils::exam_clock::ClockStatus;

/// Represents the 'exams' table: a named simulation definition.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    /// Used when no question is tagged with this exam.
    pub question_count: i32,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Submitted,
}

/// Represents the 'exam_runs' table: one timed attempt in progress.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExamRun {
    pub id: i64,
    pub user_id: i64,
    pub exam_id: i64,
    /// Fixed question order for this attempt.
    pub question_ids: Json<Vec<i64>>,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub breaks_taken: i32,
    pub break_started_at: Option<DateTime<Utc>>,
    pub paused_seconds: i64,
    pub status: RunStatus,
}

/// DTO for creating an exam definition.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 600))]
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: i32,
    #[validate(range(min = 1, max = 400))]
    pub question_count: i32,
    pub is_active: Option<bool>,
}

fn default_duration_minutes() -> i32 {
    (SIMULATION_DURATION_SECS / 60) as i32
}

/// DTO for updating an exam definition. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: Option<i32>,
    #[validate(range(min = 1, max = 400))]
    pub question_count: Option<i32>,
    pub is_active: Option<bool>,
}

/// Returned when a run starts.
#[derive(Debug, Serialize)]
pub struct StartRunResponse {
    pub run_id: i64,
    pub exam_id: i64,
    pub questions: Vec<PublicQuestion>,
    pub clock: ClockStatus,
}

/// DTO for starting a break.
#[derive(Debug, Deserialize)]
pub struct StartBreakRequest {
    /// Number of questions the candidate has answered so far.
    pub answered_count: i32,
}

/// DTO for submitting answers.
/// Key: Question ID. Value: selected option ids.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswersRequest {
    pub answers: HashMap<i64, Vec<String>>,
}
