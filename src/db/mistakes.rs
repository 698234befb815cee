// src/db/mistakes.rs

use sqlx::{PgConnection, PgPool};

use crate::db::questions::QUESTION_COLUMNS;
use crate::models::{
    exam_result::QuestionOutcome,
    mistake::{MistakeEntry, MistakeStats, MistakeStatus, MistakeUpdate},
    question::Question,
};

/// Applies one answer to the (user, question) mistake record.
pub async fn record_answer(
    conn: &mut PgConnection,
    user_id: i64,
    question_id: i64,
    correct: bool,
) -> Result<(), sqlx::Error> {
    match MistakeUpdate::for_answer(correct) {
        MistakeUpdate::MarkWrong => {
            sqlx::query(
                r#"
                INSERT INTO mistakes (user_id, question_id, status, wrong_count, last_answered_at)
                VALUES ($1, $2, 'wrong', 1, NOW())
                ON CONFLICT (user_id, question_id) DO UPDATE SET
                    status = 'wrong',
                    wrong_count = mistakes.wrong_count + 1,
                    last_answered_at = NOW()
                "#,
            )
            .bind(user_id)
            .bind(question_id)
            .execute(&mut *conn)
            .await?;
        }
        MistakeUpdate::MarkCorrected => {
            sqlx::query(
                "UPDATE mistakes SET status = 'corrected', last_answered_at = NOW() \
                 WHERE user_id = $1 AND question_id = $2",
            )
            .bind(user_id)
            .bind(question_id)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

/// Records every answered outcome. Questions left blank are not mistakes.
pub async fn record_outcomes(
    conn: &mut PgConnection,
    user_id: i64,
    outcomes: &[QuestionOutcome],
) -> Result<(), sqlx::Error> {
    for outcome in outcomes.iter().filter(|o| !o.selected.is_empty()) {
        record_answer(&mut *conn, user_id, outcome.question_id, outcome.correct).await?;
    }
    Ok(())
}

pub async fn list(
    pool: &PgPool,
    user_id: i64,
    status: Option<MistakeStatus>,
) -> Result<Vec<MistakeEntry>, sqlx::Error> {
    sqlx::query_as::<_, MistakeEntry>(
        r#"
        SELECT m.question_id, q.statement, q.domain, m.status, m.wrong_count, m.last_answered_at
        FROM mistakes m
        JOIN questions q ON q.id = m.question_id
        WHERE m.user_id = $1 AND ($2::TEXT IS NULL OR m.status = $2)
        ORDER BY m.last_answered_at DESC
        "#,
    )
    .bind(user_id)
    .bind(status)
    .fetch_all(pool)
    .await
}

/// Questions still marked wrong, most-missed first.
pub async fn review_pool(pool: &PgPool, user_id: i64, limit: i64) -> Result<Vec<Question>, sqlx::Error> {
    let columns = QUESTION_COLUMNS
        .split(", ")
        .map(|c| format!("q.{c}"))
        .collect::<Vec<_>>()
        .join(", ");

    sqlx::query_as::<_, Question>(&format!(
        "SELECT {columns} FROM mistakes m \
         JOIN questions q ON q.id = m.question_id \
         WHERE m.user_id = $1 AND m.status = 'wrong' AND q.is_active = TRUE \
         ORDER BY m.wrong_count DESC, m.last_answered_at ASC \
         LIMIT $2"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn stats(pool: &PgPool, user_id: i64) -> Result<MistakeStats, sqlx::Error> {
    sqlx::query_as::<_, MistakeStats>(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE status = 'wrong') AS wrong,
            COUNT(*) FILTER (WHERE status = 'corrected') AS corrected,
            COUNT(*) AS total
        FROM mistakes
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

pub async fn clear_corrected(pool: &PgPool, user_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM mistakes WHERE user_id = $1 AND status = 'corrected'")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
