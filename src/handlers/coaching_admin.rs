// src/handlers/coaching_admin.rs

//! Admin management of coaching groups, members and sessions.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::{AppError, conflict_or_internal},
    handlers::coaching::SESSION_COLUMNS,
    models::coaching::{
        AddMemberRequest, CoachingGroup, CoachingSession, CreateGroupRequest, GroupMember,
        SessionConfigRequest, SessionKind, UpdateGroupRequest, UpdateSessionRequest,
    },
};

const GROUP_COLUMNS: &str = "id, name, description, created_at";

fn is_missing_reference(err: &sqlx::Error) -> bool {
    let text = err.to_string();
    text.contains("foreign key") || text.contains("23503")
}

pub async fn list_groups(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let groups = sqlx::query_as::<_, CoachingGroup>(&format!(
        "SELECT {GROUP_COLUMNS} FROM coaching_groups ORDER BY name"
    ))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list groups: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(groups))
}

pub async fn create_group(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let group = sqlx::query_as::<_, CoachingGroup>(&format!(
        "INSERT INTO coaching_groups (name, description) VALUES ($1, $2) RETURNING {GROUP_COLUMNS}"
    ))
    .bind(payload.name.trim())
    .bind(&payload.description)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        conflict_or_internal(
            e,
            format!("Group '{}' already exists", payload.name.trim()),
            "Failed to create group",
        )
    })?;

    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn update_group(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if payload.name.is_none() && payload.description.is_none() {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE coaching_groups SET ");
    let mut separated = builder.separated(", ");

    if let Some(name) = payload.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name.trim().to_string());
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(description);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder
        .build()
        .execute(&pool)
        .await
        .map_err(|e| conflict_or_internal(e, "Group name already exists", "Failed to update group"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Group not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a group with its members, sessions and session scores.
pub async fn delete_group(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM coaching_groups WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete group: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Group not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    State(pool): State<PgPool>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let members = sqlx::query_as::<_, GroupMember>(
        r#"
        SELECT m.user_id, u.username, u.display_name, m.joined_at
        FROM group_members m
        JOIN users u ON u.id = m.user_id
        WHERE m.group_id = $1
        ORDER BY u.username
        "#,
    )
    .bind(group_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list group members: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(members))
}

pub async fn add_member(
    State(pool): State<PgPool>,
    Path(group_id): Path<i64>,
    Json(payload): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("INSERT INTO group_members (group_id, user_id) VALUES ($1, $2)")
        .bind(group_id)
        .bind(payload.user_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            if is_missing_reference(&e) {
                AppError::NotFound("Group or user not found".to_string())
            } else {
                conflict_or_internal(e, "User is already a member", "Failed to add member")
            }
        })?;

    tracing::info!(group_id, user_id = payload.user_id, "member added");
    Ok(StatusCode::CREATED)
}

pub async fn remove_member(
    State(pool): State<PgPool>,
    Path((group_id, user_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
        .bind(group_id)
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to remove member: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Membership not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Meeting sessions drop any question range; quiz sessions drop the meeting link.
fn normalize(mut req: SessionConfigRequest) -> SessionConfigRequest {
    match req.kind {
        SessionKind::Meeting => {
            req.range_start = None;
            req.range_end = None;
        }
        SessionKind::Quiz => req.meeting_url = None,
    }
    req.title = req.title.trim().to_string();
    req
}

pub async fn create_session(
    State(pool): State<PgPool>,
    Path(group_id): Path<i64>,
    Json(payload): Json<SessionConfigRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let req = normalize(payload);

    let session = sqlx::query_as::<_, CoachingSession>(&format!(
        r#"
        INSERT INTO coaching_sessions
        (group_id, title, kind, meeting_url, exam_id, range_start, range_end, scheduled_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {SESSION_COLUMNS}
        "#
    ))
    .bind(group_id)
    .bind(&req.title)
    .bind(req.kind)
    .bind(&req.meeting_url)
    .bind(req.exam_id)
    .bind(req.range_start)
    .bind(req.range_end)
    .bind(req.scheduled_at)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_missing_reference(&e) {
            AppError::NotFound("Group or exam not found".to_string())
        } else {
            tracing::error!("Failed to create session: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// Patches a session. The merged configuration is validated as a whole.
pub async fn update_session(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let current = sqlx::query_as::<_, CoachingSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM coaching_sessions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Session not found".to_string()))?;

    let merged = payload.merge_into(current);
    merged
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let req = normalize(merged);

    let session = sqlx::query_as::<_, CoachingSession>(&format!(
        r#"
        UPDATE coaching_sessions SET
            title = $1, kind = $2, meeting_url = $3, exam_id = $4,
            range_start = $5, range_end = $6, scheduled_at = $7
        WHERE id = $8
        RETURNING {SESSION_COLUMNS}
        "#
    ))
    .bind(&req.title)
    .bind(req.kind)
    .bind(&req.meeting_url)
    .bind(req.exam_id)
    .bind(req.range_start)
    .bind(req.range_end)
    .bind(req.scheduled_at)
    .bind(id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        if is_missing_reference(&e) {
            AppError::NotFound("Exam not found".to_string())
        } else {
            tracing::error!("Failed to update session: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?
    .ok_or(AppError::NotFound("Session not found".to_string()))?;

    Ok(Json(session))
}

pub async fn delete_session(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM coaching_sessions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete session: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Session not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
