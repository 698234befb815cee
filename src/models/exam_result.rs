// src/models/exam_result.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use crate::models::question::Domain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExamMode {
    Simulation,
    Practice,
    Coaching,
}

/// Per-question outcome stored with every result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: i64,
    pub selected: Vec<String>,
    pub correct: bool,
    pub domain: Domain,
}

/// Represents the 'exam_results' table. Rows are append-only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamResult {
    pub id: i64,
    pub user_id: i64,
    pub exam_id: Option<i64>,
    pub mode: ExamMode,
    /// Number of correct answers.
    pub score: i32,
    pub total_questions: i32,
    pub percentage: f64,
    pub time_spent_seconds: i64,
    pub details: Json<Vec<QuestionOutcome>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// History row without the per-question details.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExamResultSummary {
    pub id: i64,
    pub exam_id: Option<i64>,
    pub mode: ExamMode,
    pub score: i32,
    pub total_questions: i32,
    pub percentage: f64,
    pub time_spent_seconds: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for logging a batch of practice answers.
#[derive(Debug, Deserialize, Validate)]
pub struct PracticeResultRequest {
    #[validate(length(min = 1, max = 400, message = "Submit between 1 and 400 answers."))]
    pub answers: HashMap<i64, Vec<String>>,
    #[validate(range(min = 0, max = 86_400))]
    #[serde(default)]
    pub time_spent_seconds: i64,
}

/// DTO for a single answer (practice or mistake review).
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_id: i64,
    pub selected: Vec<String>,
}

/// Immediate feedback for a single answer.
#[derive(Debug, Serialize)]
pub struct AnswerFeedback {
    pub question_id: i64,
    pub correct: bool,
    pub correct_option_ids: Vec<String>,
    pub explanation: Option<String>,
}

/// Returned after a graded submission.
#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub result_id: i64,
    pub score: i32,
    pub total_questions: i32,
    pub percentage: f64,
    pub passed: bool,
    pub time_spent_seconds: i64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
    pub mode: Option<ExamMode>,
}
