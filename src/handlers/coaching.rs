// src/handlers/coaching.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    config::PASSING_SCORE_PERCENTAGE,
    db::{questions, results},
    error::AppError,
    models::{
        coaching::{CoachingGroup, CoachingSession, SessionAttempt, SessionScore},
        exam::SubmitAnswersRequest,
        exam_result::{ExamMode, SubmissionResponse},
        question::PublicQuestion,
        user::User,
    },
    utils::{grading, jwt::ActiveUser},
};

pub(crate) const SESSION_COLUMNS: &str = "id, group_id, title, kind, meeting_url, exam_id, \
     range_start, range_end, scheduled_at, created_at";

/// Admins can see every group; everyone else only the groups they belong to.
async fn ensure_member(pool: &PgPool, user: &User, group_id: i64) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }

    let is_member: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2)",
    )
    .bind(group_id)
    .bind(user.id)
    .fetch_one(pool)
    .await?;

    if !is_member {
        return Err(AppError::Forbidden(
            "You are not a member of this group".to_string(),
        ));
    }
    Ok(())
}

async fn load_session(pool: &PgPool, session_id: i64) -> Result<CoachingSession, AppError> {
    sqlx::query_as::<_, CoachingSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM coaching_sessions WHERE id = $1"
    ))
    .bind(session_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Session not found".to_string()))
}

/// Loads a quiz session the user may take and returns its `(offset, limit)`.
async fn load_quiz(
    pool: &PgPool,
    user: &User,
    session_id: i64,
) -> Result<(CoachingSession, (i64, i64)), AppError> {
    let session = load_session(pool, session_id).await?;
    ensure_member(pool, user, session.group_id).await?;

    let window = session
        .quiz_window()
        .ok_or(AppError::BadRequest("Session is not a quiz".to_string()))?;
    Ok((session, window))
}

/// The caller's coaching groups.
pub async fn my_groups(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
) -> Result<impl IntoResponse, AppError> {
    let groups = sqlx::query_as::<_, CoachingGroup>(
        r#"
        SELECT g.id, g.name, g.description, g.created_at
        FROM coaching_groups g
        JOIN group_members m ON m.group_id = g.id
        WHERE m.user_id = $1
        ORDER BY g.name
        "#,
    )
    .bind(user.id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list coaching groups: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(groups))
}

pub async fn group_sessions(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_member(&pool, &user, group_id).await?;

    let sessions = sqlx::query_as::<_, CoachingSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM coaching_sessions WHERE group_id = $1 \
         ORDER BY scheduled_at NULLS LAST, id"
    ))
    .bind(group_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list sessions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(sessions))
}

/// Questions of a quiz session, in bank order.
pub async fn session_questions(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let (session, (offset, limit)) = load_quiz(&pool, &user, session_id).await?;

    let quiz = questions::fetch_range(&pool, session.exam_id, offset, limit).await?;
    let public: Vec<PublicQuestion> = quiz.iter().map(|q| q.to_public()).collect();
    Ok(Json(public))
}

/// Grades a quiz attempt and stores it as the caller's latest score.
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
    Path(session_id): Path<i64>,
    Json(req): Json<SubmitAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (session, (offset, limit)) = load_quiz(&pool, &user, session_id).await?;

    let quiz_ids: Vec<i64> = questions::fetch_range(&pool, session.exam_id, offset, limit)
        .await?
        .iter()
        .map(|q| q.id)
        .collect();
    if quiz_ids.is_empty() {
        return Err(AppError::BadRequest("Session has no questions".to_string()));
    }

    let answers: HashMap<i64, Vec<String>> = req
        .answers
        .into_iter()
        .filter(|(id, _)| quiz_ids.contains(id))
        .collect();

    let mut tx = pool.begin().await?;

    let keys = questions::fetch_keys(&mut *tx, &quiz_ids).await?;
    let grade = grading::grade_attempt(&keys, &answers);

    let result_id = results::log_attempt(
        &mut *tx,
        user.id,
        session.exam_id,
        ExamMode::Coaching,
        &grade,
        0,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to log coaching result: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let attempt = sqlx::query_as::<_, SessionAttempt>(
        r#"
        INSERT INTO session_attempts (session_id, user_id, score, total_questions, percentage, attempts, updated_at)
        VALUES ($1, $2, $3, $4, $5, 1, NOW())
        ON CONFLICT (session_id, user_id) DO UPDATE SET
            score = EXCLUDED.score,
            total_questions = EXCLUDED.total_questions,
            percentage = EXCLUDED.percentage,
            attempts = session_attempts.attempts + 1,
            updated_at = NOW()
        RETURNING session_id, user_id, score, total_questions, percentage, attempts, updated_at
        "#,
    )
    .bind(session.id)
    .bind(user.id)
    .bind(grade.correct_count as i32)
    .bind(grade.total as i32)
    .bind(grade.percentage)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to upsert session attempt: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tx.commit().await?;

    let result = SubmissionResponse {
        result_id,
        score: grade.correct_count as i32,
        total_questions: grade.total as i32,
        percentage: grade.percentage,
        passed: grade.percentage >= PASSING_SCORE_PERCENTAGE,
        time_spent_seconds: 0,
    };

    Ok(Json(json!({ "result": result, "attempt": attempt })))
}

/// Scoreboard of a session, best first.
pub async fn session_scores(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = load_session(&pool, session_id).await?;
    ensure_member(&pool, &user, session.group_id).await?;

    let scores = sqlx::query_as::<_, SessionScore>(
        r#"
        SELECT a.user_id, u.username, u.display_name, a.score, a.total_questions,
               a.percentage, a.attempts
        FROM session_attempts a
        JOIN users u ON u.id = a.user_id
        WHERE a.session_id = $1
        ORDER BY a.percentage DESC, a.updated_at ASC
        "#,
    )
    .bind(session.id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to load scoreboard: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(scores))
}
