// src/handlers/analytics.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    config::DEFAULT_HISTORY_LIMIT,
    db::{results, users},
    error::AppError,
    models::exam_result::{ExamMode, HistoryParams},
    utils::{analytics, jwt::Claims},
};

/// Profile stats, simulation summary and per-domain accuracy.
///
/// The summary covers simulations only; the domain breakdown uses every answer.
pub async fn my_analytics(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let user = users::find(&pool, user_id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let history = results::all_for_user(&pool, user_id).await.map_err(|e| {
        tracing::error!("Failed to load results for analytics: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let simulation_percentages: Vec<f64> = history
        .iter()
        .filter(|r| r.mode == ExamMode::Simulation)
        .map(|r| r.percentage)
        .collect();

    let domains = analytics::domain_breakdown(history.iter().flat_map(|r| r.details.0.iter()));

    Ok(Json(json!({
        "stats": user.stats(),
        "simulations": analytics::summarize(&simulation_percentages),
        "domains": domains,
    })))
}

pub async fn list_results(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 100);
    let list = results::list_for_user(&pool, claims.user_id()?, params.mode, limit).await?;
    Ok(Json(list))
}

/// One result with per-question details. Owners only.
pub async fn get_result(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let result = results::get(&pool, id)
        .await?
        .filter(|r| r.user_id == user_id || claims.role.is_admin())
        .ok_or(AppError::NotFound("Result not found".to_string()))?;

    Ok(Json(result))
}
