// src/handlers/exams.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{PgConnection, PgPool, types::Json as SqlJson};

use crate::{
    config::PASSING_SCORE_PERCENTAGE,
    db::{questions, results, users},
    error::AppError,
    models::{
        exam::{Exam, ExamRun, RunStatus, StartBreakRequest, StartRunResponse, SubmitAnswersRequest},
        exam_result::{ExamMode, SubmissionResponse},
        question::QuestionFilter,
        user::AccessType,
    },
    utils::{
        exam_clock::{BreakError, ExamClock},
        grading,
        jwt::ActiveUser,
    },
};

pub(crate) const EXAM_COLUMNS: &str =
    "id, title, description, duration_minutes, question_count, is_active, created_at";

const RUN_COLUMNS: &str = "id, user_id, exam_id, question_ids, started_at, duration_seconds, \
     breaks_taken, break_started_at, paused_seconds, status";

/// Lists the simulations a candidate can start.
pub async fn list_exams(
    State(pool): State<PgPool>,
    ActiveUser(_user): ActiveUser,
) -> Result<impl IntoResponse, AppError> {
    let exams = sqlx::query_as::<_, Exam>(&format!(
        "SELECT {EXAM_COLUMNS} FROM exams WHERE is_active = TRUE ORDER BY id"
    ))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list exams: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(exams))
}

/// Starts a timed run of an exam.
///
/// The question order is fixed at start. Exams without tagged questions draw
/// `question_count` random active questions.
pub async fn start_run(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if user.access_type == AccessType::Free && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Exam simulations require a premium plan.".to_string(),
        ));
    }

    let exam = sqlx::query_as::<_, Exam>(&format!(
        "SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1 AND is_active = TRUE"
    ))
    .bind(exam_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    let mut exam_questions = questions::fetch_for_exam(&pool, exam.id).await?;
    if exam_questions.is_empty() {
        exam_questions = questions::fetch_pool(
            &pool,
            &QuestionFilter::default(),
            i64::from(exam.question_count),
        )
        .await?;
    }
    if exam_questions.is_empty() {
        return Err(AppError::BadRequest("Exam has no questions".to_string()));
    }

    let question_ids: Vec<i64> = exam_questions.iter().map(|q| q.id).collect();
    let started_at = Utc::now();

    let run = sqlx::query_as::<_, ExamRun>(&format!(
        "INSERT INTO exam_runs (user_id, exam_id, question_ids, started_at, duration_seconds) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {RUN_COLUMNS}"
    ))
    .bind(user.id)
    .bind(exam.id)
    .bind(SqlJson(&question_ids))
    .bind(started_at)
    .bind(i64::from(exam.duration_minutes) * 60)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to start exam run: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tracing::info!(user_id = user.id, run_id = run.id, exam_id, "exam run started");

    Ok((
        StatusCode::CREATED,
        Json(StartRunResponse {
            run_id: run.id,
            exam_id: exam.id,
            questions: exam_questions.iter().map(|q| q.to_public()).collect(),
            clock: ExamClock::from_run(&run).status(started_at),
        }),
    ))
}

async fn load_run(
    conn: &mut PgConnection,
    run_id: i64,
    user_id: i64,
    for_update: bool,
) -> Result<ExamRun, AppError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    sqlx::query_as::<_, ExamRun>(&format!(
        "SELECT {RUN_COLUMNS} FROM exam_runs WHERE id = $1 AND user_id = $2{lock}"
    ))
    .bind(run_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Exam run not found".to_string()))
}

async fn save_clock(conn: &mut PgConnection, run_id: i64, clock: &ExamClock) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE exam_runs SET breaks_taken = $1, break_started_at = $2, paused_seconds = $3 \
         WHERE id = $4",
    )
    .bind(clock.breaks_taken)
    .bind(clock.break_started_at)
    .bind(clock.paused_seconds)
    .bind(run_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update exam clock: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;
    Ok(())
}

fn require_in_progress(run: &ExamRun) -> Result<(), AppError> {
    if run.status == RunStatus::Submitted {
        return Err(AppError::Conflict("Exam run already submitted".to_string()));
    }
    Ok(())
}

/// Returns the clock state of a run with its questions in run order,
/// so a reloaded client can resume.
pub async fn run_status(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
    Path(run_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let run = load_run(&mut *conn, run_id, user.id, false).await?;
    drop(conn);

    let ordered = questions::fetch_ordered(&pool, &run.question_ids).await?;
    let public: Vec<_> = ordered.iter().map(|q| q.to_public()).collect();

    Ok(Json(json!({
        "run_id": run.id,
        "exam_id": run.exam_id,
        "status": run.status,
        "questions": public,
        "clock": ExamClock::from_run(&run).status(Utc::now()),
    })))
}

/// Starts the break for the checkpoint the candidate has reached.
pub async fn start_break(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
    Path(run_id): Path<i64>,
    Json(req): Json<StartBreakRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;
    let run = load_run(&mut *tx, run_id, user.id, true).await?;
    require_in_progress(&run)?;

    let now = Utc::now();
    let mut clock = ExamClock::from_run(&run);
    clock
        .start_break(req.answered_count, now)
        .map_err(|e| match e {
            BreakError::AlreadyOnBreak => AppError::Conflict(e.to_string()),
            BreakError::Expired | BreakError::NotAtCheckpoint => AppError::BadRequest(e.to_string()),
        })?;

    save_clock(&mut *tx, run.id, &clock).await?;
    tx.commit().await?;

    Ok(Json(clock.status(now)))
}

/// Ends the running break early. A no-op when no break is open.
pub async fn end_break(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
    Path(run_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;
    let run = load_run(&mut *tx, run_id, user.id, true).await?;
    require_in_progress(&run)?;

    let now = Utc::now();
    let mut clock = ExamClock::from_run(&run);
    clock.end_break(now);

    save_clock(&mut *tx, run.id, &clock).await?;
    tx.commit().await?;

    Ok(Json(clock.status(now)))
}

/// Grades the run and logs it as a simulation result.
///
/// Late submissions are accepted; time spent is capped at the exam duration.
/// Result, mistakes, profile stats and run status are written in one transaction.
pub async fn submit_run(
    State(pool): State<PgPool>,
    ActiveUser(user): ActiveUser,
    Path(run_id): Path<i64>,
    Json(req): Json<SubmitAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;
    let run = load_run(&mut *tx, run_id, user.id, true).await?;
    require_in_progress(&run)?;

    let now = Utc::now();
    let mut clock = ExamClock::from_run(&run);
    clock.end_break(now);
    let time_spent = clock.active_elapsed_seconds(now).min(run.duration_seconds);

    let keys = questions::fetch_keys(&mut *tx, &run.question_ids).await?;
    let grade = grading::grade_attempt(&keys, &req.answers);

    let result_id = results::log_attempt(
        &mut *tx,
        user.id,
        Some(run.exam_id),
        ExamMode::Simulation,
        &grade,
        time_spent,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to log simulation result: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    users::record_simulation(&mut *tx, user.id, grade.percentage, time_spent).await?;

    save_clock(&mut *tx, run.id, &clock).await?;
    sqlx::query("UPDATE exam_runs SET status = $1 WHERE id = $2")
        .bind(RunStatus::Submitted)
        .bind(run.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(SubmissionResponse {
        result_id,
        score: grade.correct_count as i32,
        total_questions: grade.total as i32,
        percentage: grade.percentage,
        passed: grade.percentage >= PASSING_SCORE_PERCENTAGE,
        time_spent_seconds: time_spent,
    }))
}
