// src/db/results.rs

use sqlx::{PgConnection, PgPool, types::Json};

use crate::db::mistakes;
use crate::models::exam_result::{ExamMode, ExamResult, ExamResultSummary};
use crate::utils::grading::Grade;

const RESULT_COLUMNS: &str = "id, user_id, exam_id, mode, score, total_questions, percentage, \
     time_spent_seconds, details, created_at";

const SUMMARY_COLUMNS: &str =
    "id, exam_id, mode, score, total_questions, percentage, time_spent_seconds, created_at";

/// Appends one graded attempt and applies its answers to the mistake records.
/// Run inside the caller's transaction.
pub async fn log_attempt(
    conn: &mut PgConnection,
    user_id: i64,
    exam_id: Option<i64>,
    mode: ExamMode,
    grade: &Grade,
    time_spent_seconds: i64,
) -> Result<i64, sqlx::Error> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO exam_results
        (user_id, exam_id, mode, score, total_questions, percentage, time_spent_seconds, details)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(exam_id)
    .bind(mode)
    .bind(grade.correct_count as i32)
    .bind(grade.total as i32)
    .bind(grade.percentage)
    .bind(time_spent_seconds)
    .bind(Json(&grade.outcomes))
    .fetch_one(&mut *conn)
    .await?;

    mistakes::record_outcomes(&mut *conn, user_id, &grade.outcomes).await?;

    tracing::info!(
        user_id,
        result_id = id,
        ?mode,
        score = grade.correct_count,
        total = grade.total,
        "attempt logged"
    );

    Ok(id)
}

pub async fn list_for_user(
    pool: &PgPool,
    user_id: i64,
    mode: Option<ExamMode>,
    limit: i64,
) -> Result<Vec<ExamResultSummary>, sqlx::Error> {
    sqlx::query_as::<_, ExamResultSummary>(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM exam_results \
         WHERE user_id = $1 AND ($2::TEXT IS NULL OR mode = $2) \
         ORDER BY created_at DESC LIMIT $3"
    ))
    .bind(user_id)
    .bind(mode)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Every result with details, newest first. Used for analytics.
pub async fn all_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<ExamResult>, sqlx::Error> {
    sqlx::query_as::<_, ExamResult>(&format!(
        "SELECT {RESULT_COLUMNS} FROM exam_results WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn get(pool: &PgPool, id: i64) -> Result<Option<ExamResult>, sqlx::Error> {
    sqlx::query_as::<_, ExamResult>(&format!(
        "SELECT {RESULT_COLUMNS} FROM exam_results WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}
