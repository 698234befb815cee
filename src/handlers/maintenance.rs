// src/handlers/maintenance.rs

//! Bulk deletes. Super admin only.

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{error::AppError, models::exam::RunStatus, utils::jwt::Claims};

#[derive(Debug, Deserialize)]
pub struct PurgeResultsParams {
    pub before: Option<DateTime<Utc>>,
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PurgeMistakesParams {
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StaleRunsParams {
    pub older_than_hours: Option<i64>,
}

const DEFAULT_STALE_HOURS: i64 = 24;
const MAX_STALE_HOURS: i64 = 24 * 365 * 10;

fn deleted(rows: u64) -> Json<serde_json::Value> {
    Json(json!({ "deleted": rows }))
}

/// Deletes exam results, optionally older than `before` and/or for one user.
pub async fn purge_results(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<PurgeResultsParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("DELETE FROM exam_results WHERE TRUE");

    if let Some(before) = params.before {
        builder.push(" AND created_at < ");
        builder.push_bind(before);
    }
    if let Some(user_id) = params.user_id {
        builder.push(" AND user_id = ");
        builder.push_bind(user_id);
    }

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to purge results: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tracing::warn!(
        admin_id = %claims.sub,
        deleted = result.rows_affected(),
        ?params,
        "exam results purged"
    );
    Ok(deleted(result.rows_affected()))
}

/// Deletes mistake records, for everyone or one user.
pub async fn purge_mistakes(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<PurgeMistakesParams>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM mistakes WHERE ($1::BIGINT IS NULL OR user_id = $1)")
        .bind(params.user_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to purge mistakes: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    tracing::warn!(
        admin_id = %claims.sub,
        deleted = result.rows_affected(),
        user_id = ?params.user_id,
        "mistake records purged"
    );
    Ok(deleted(result.rows_affected()))
}

/// Deletes every inactive question, including unreviewed drafts.
pub async fn purge_inactive_questions(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE is_active = FALSE")
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to purge inactive questions: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    tracing::warn!(
        admin_id = %claims.sub,
        deleted = result.rows_affected(),
        "inactive questions purged"
    );
    Ok(deleted(result.rows_affected()))
}

/// Deletes unsubmitted runs started more than `older_than_hours` ago (default 24).
pub async fn purge_stale_runs(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<StaleRunsParams>,
) -> Result<impl IntoResponse, AppError> {
    let hours = params
        .older_than_hours
        .unwrap_or(DEFAULT_STALE_HOURS)
        .min(MAX_STALE_HOURS);
    if hours < 1 {
        return Err(AppError::BadRequest(
            "older_than_hours must be at least 1".to_string(),
        ));
    }
    let cutoff = Utc::now() - Duration::hours(hours);

    let result = sqlx::query("DELETE FROM exam_runs WHERE status = $1 AND started_at < $2")
        .bind(RunStatus::InProgress)
        .bind(cutoff)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to purge stale runs: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    tracing::warn!(
        admin_id = %claims.sub,
        deleted = result.rows_affected(),
        hours,
        "stale exam runs purged"
    );
    Ok(deleted(result.rows_affected()))
}
