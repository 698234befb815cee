// src/models/mistake.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::question::Domain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MistakeStatus {
    Wrong,
    Corrected,
}

/// A row of the 'mistakes' table (one per user and question), joined with
/// enough of the question to render a list.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MistakeEntry {
    pub question_id: i64,
    pub statement: String,
    pub domain: Domain,
    pub status: MistakeStatus,
    pub wrong_count: i32,
    pub last_answered_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct MistakeStats {
    pub wrong: i64,
    pub corrected: i64,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct MistakeListParams {
    pub status: Option<MistakeStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewParams {
    pub limit: Option<i64>,
}

/// What an answer does to the stored mistake record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MistakeUpdate {
    /// Create the record or bump `wrong_count`, status becomes `wrong`.
    MarkWrong,
    /// Existing record flips to `corrected`. Nothing happens without a record.
    MarkCorrected,
}

impl MistakeUpdate {
    pub fn for_answer(correct: bool) -> Self {
        if correct {
            MistakeUpdate::MarkCorrected
        } else {
            MistakeUpdate::MarkWrong
        }
    }
}
