// src/handlers/practice.rs

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::{FREE_PRACTICE_LIMIT, MAX_PRACTICE_LIMIT, PASSING_SCORE_PERCENTAGE},
    db::{mistakes, questions, results},
    error::AppError,
    models::{
        exam_result::{
            AnswerFeedback, AnswerRequest, ExamMode, PracticeResultRequest, SubmissionResponse,
        },
        question::{PublicQuestion, QuestionFilter},
        user::AccessType,
    },
    utils::{grading, jwt::ActiveUser},
};

/// Draws a random pool of practice questions.
/// Free accounts get smaller pools.
pub async fn fetch_questions(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
    Query(filter): Query<QuestionFilter>,
) -> Result<impl IntoResponse, AppError> {
    let cap = match user.access_type {
        AccessType::Free if !user.is_admin() => FREE_PRACTICE_LIMIT,
        _ => MAX_PRACTICE_LIMIT,
    };
    let limit = filter.limit.unwrap_or(cap).clamp(1, cap);

    let pool_questions = questions::fetch_pool(&pool, &filter, limit)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch practice pool: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    let public: Vec<PublicQuestion> = pool_questions.iter().map(|q| q.to_public()).collect();
    Ok(Json(public))
}

/// Grades one answer and updates the mistake record.
/// Shared by practice and mistake review.
pub(crate) async fn answer_one(
    pool: &PgPool,
    user_id: i64,
    req: AnswerRequest,
) -> Result<AnswerFeedback, AppError> {
    let question = questions::find(pool, req.question_id)
        .await?
        .filter(|q| q.is_active)
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let correct = grading::grade_answer(&req.selected, &question.correct_option_ids);

    let mut conn = pool.acquire().await?;
    mistakes::record_answer(&mut *conn, user_id, question.id, correct)
        .await
        .map_err(|e| {
            tracing::error!("Failed to record mistake: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(AnswerFeedback {
        question_id: question.id,
        correct,
        correct_option_ids: question.correct_option_ids.0,
        explanation: question.explanation,
    })
}

/// Submits a single practice answer.
pub async fn submit_answer(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
    Json(req): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.selected.is_empty() {
        return Err(AppError::BadRequest("No option selected".to_string()));
    }
    Ok(Json(answer_one(&pool, user.id, req).await?))
}

/// Logs a batch of practice answers as one result.
///
/// Only the submitted questions count toward the total.
pub async fn submit_results(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
    Json(req): Json<PracticeResultRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut ids: Vec<i64> = req.answers.keys().copied().collect();
    ids.sort_unstable();

    let mut tx = pool.begin().await?;

    let keys = questions::fetch_keys(&mut *tx, &ids).await?;
    if keys.is_empty() {
        return Err(AppError::BadRequest("No known questions answered".to_string()));
    }

    let grade = grading::grade_attempt(&keys, &req.answers);
    let result_id = results::log_attempt(
        &mut *tx,
        user.id,
        None,
        ExamMode::Practice,
        &grade,
        req.time_spent_seconds,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to log practice result: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tx.commit().await?;

    Ok(Json(SubmissionResponse {
        result_id,
        score: grade.correct_count as i32,
        total_questions: grade.total as i32,
        percentage: grade.percentage,
        passed: grade.percentage >= PASSING_SCORE_PERCENTAGE,
        time_spent_seconds: req.time_spent_seconds,
    }))
}
