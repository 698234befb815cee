// src/db/questions.rs

use std::collections::HashMap;

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::models::question::{CreateQuestionRequest, Question, QuestionFilter};
use crate::utils::grading::AnswerKey;

pub const QUESTION_COLUMNS: &str = "id, statement, options, correct_option_ids, explanation, \
     domain, approach, difficulty, is_active, exam_id, created_at";

pub async fn find(pool: &PgPool, id: i64) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Random draw of active questions matching the filter.
pub async fn fetch_pool(
    pool: &PgPool,
    filter: &QuestionFilter,
    limit: i64,
) -> Result<Vec<Question>, sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE is_active = TRUE"
    ));

    if let Some(domain) = filter.domain {
        builder.push(" AND domain = ");
        builder.push_bind(domain);
    }
    if let Some(approach) = filter.approach {
        builder.push(" AND approach = ");
        builder.push_bind(approach);
    }
    if let Some(difficulty) = filter.difficulty {
        builder.push(" AND difficulty = ");
        builder.push_bind(difficulty);
    }

    builder.push(" ORDER BY RANDOM() LIMIT ");
    builder.push_bind(limit);

    builder.build_query_as().fetch_all(pool).await
}

/// Active questions tagged with `exam_id`, in stable id order.
pub async fn fetch_for_exam(pool: &PgPool, exam_id: i64) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions \
         WHERE exam_id = $1 AND is_active = TRUE ORDER BY id"
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

/// A slice of the ordered question list. Without an exam, the whole active bank is used.
pub async fn fetch_range(
    pool: &PgPool,
    exam_id: Option<i64>,
    offset: i64,
    limit: i64,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions \
         WHERE is_active = TRUE AND ($1::BIGINT IS NULL OR exam_id = $1) \
         ORDER BY id OFFSET $2 LIMIT $3"
    ))
    .bind(exam_id)
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Questions for `ids`, returned in the order of `ids`. Missing ids are skipped.
pub async fn fetch_ordered(pool: &PgPool, ids: &[i64]) -> Result<Vec<Question>, sqlx::Error> {
    let rows = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;

    let mut by_id: HashMap<i64, Question> = rows.into_iter().map(|q| (q.id, q)).collect();
    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

/// Answer keys for `ids`, in the order of `ids`. Missing ids are skipped.
pub async fn fetch_keys(conn: &mut PgConnection, ids: &[i64]) -> Result<Vec<AnswerKey>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AnswerKey>(
        "SELECT id, correct_option_ids, domain FROM questions WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_id: HashMap<i64, AnswerKey> = rows.into_iter().map(|k| (k.id, k)).collect();
    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

pub async fn insert(conn: &mut PgConnection, req: &CreateQuestionRequest) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO questions
        (statement, options, correct_option_ids, explanation, domain, approach, difficulty, is_active, exam_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(&req.statement)
    .bind(sqlx::types::Json(&req.options))
    .bind(sqlx::types::Json(&req.correct_option_ids))
    .bind(&req.explanation)
    .bind(req.domain)
    .bind(req.approach)
    .bind(req.difficulty)
    .bind(req.is_active)
    .bind(req.exam_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn replace(pool: &PgPool, id: i64, req: &CreateQuestionRequest) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE questions SET
            statement = $1, options = $2, correct_option_ids = $3, explanation = $4,
            domain = $5, approach = $6, difficulty = $7, is_active = $8, exam_id = $9
        WHERE id = $10
        "#,
    )
    .bind(&req.statement)
    .bind(sqlx::types::Json(&req.options))
    .bind(sqlx::types::Json(&req.correct_option_ids))
    .bind(&req.explanation)
    .bind(req.domain)
    .bind(req.approach)
    .bind(req.difficulty)
    .bind(req.is_active)
    .bind(req.exam_id)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
