// src/handlers/mistakes.rs

//! "Kill Mistake": review of questions the candidate got wrong.

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    config::MAX_PRACTICE_LIMIT,
    db::mistakes,
    error::AppError,
    handlers::practice::answer_one,
    models::{
        exam_result::AnswerRequest,
        mistake::{MistakeListParams, ReviewParams},
        question::PublicQuestion,
    },
    utils::jwt::ActiveUser,
};

pub async fn list_mistakes(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
    Query(params): Query<MistakeListParams>,
) -> Result<impl IntoResponse, AppError> {
    let entries = mistakes::list(&pool, user.id, params.status)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list mistakes: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(entries))
}

/// Questions still marked wrong, most-missed first.
pub async fn review_pool(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
    Query(params): Query<ReviewParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(20).clamp(1, MAX_PRACTICE_LIMIT);
    let pool_questions = mistakes::review_pool(&pool, user.id, limit).await?;

    let public: Vec<PublicQuestion> = pool_questions.iter().map(|q| q.to_public()).collect();
    Ok(Json(public))
}

/// Answers a review question. A correct answer flips the record to `corrected`.
pub async fn submit_review(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
    Json(req): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.selected.is_empty() {
        return Err(AppError::BadRequest("No option selected".to_string()));
    }
    Ok(Json(answer_one(&pool, user.id, req).await?))
}

pub async fn stats(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(mistakes::stats(&pool, user.id).await?))
}

/// Removes the caller's corrected records.
pub async fn clear_corrected(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
) -> Result<impl IntoResponse, AppError> {
    let deleted = mistakes::clear_corrected(&pool, user.id).await?;
    Ok(Json(json!({ "deleted": deleted })))
}
