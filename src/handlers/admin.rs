// src/handlers/admin.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    ai::{GenerateRequest, QuestionGenerator},
    db::{
        questions::{self, QUESTION_COLUMNS},
        users::{self, USER_COLUMNS},
    },
    error::{AppError, conflict_or_internal},
    handlers::exams::EXAM_COLUMNS,
    models::{
        exam::{CreateExamRequest, Exam, UpdateExamRequest},
        question::{
            AdminQuestionParams, CreateQuestionRequest, ImportQuestionsRequest, ImportReport,
            ImportRowError, Question, UpdateQuestionRequest,
        },
        user::{AdminUpdateUserRequest, User, UserRole},
    },
    utils::{hash::hash_password, jwt::Claims},
};

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY id DESC"
    ))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(users))
}

/// Updates access, status, expiry, role or password of a user.
///
/// Admin accounts can only be changed by a super admin, granting an admin
/// role likewise, and nobody can change their own role.
pub async fn update_user(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let target = users::find(&pool, id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if target.is_admin() && claims.role != UserRole::SuperAdmin {
        return Err(AppError::Forbidden(
            "Only a super admin can modify an admin account".to_string(),
        ));
    }

    if let Some(new_role) = payload.role {
        if new_role != target.role {
            if id == claims.user_id()? {
                return Err(AppError::BadRequest("Cannot change your own role".to_string()));
            }
            let touches_admin = new_role.is_admin() || target.role.is_admin();
            if touches_admin && claims.role != UserRole::SuperAdmin {
                return Err(AppError::Forbidden(
                    "Only a super admin can grant or revoke admin roles".to_string(),
                ));
            }
        }
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");
    let mut changed = false;

    if let Some(display_name) = payload.display_name {
        if display_name.chars().count() > 100 {
            return Err(AppError::BadRequest("Display name is too long".to_string()));
        }
        separated.push("display_name = ");
        separated.push_bind_unseparated(display_name);
        changed = true;
    }

    if let Some(role) = payload.role {
        separated.push("role = ");
        separated.push_bind_unseparated(role);
        changed = true;
    }

    if let Some(access_type) = payload.access_type {
        separated.push("access_type = ");
        separated.push_bind_unseparated(access_type);
        changed = true;
    }

    if let Some(status) = payload.status {
        separated.push("status = ");
        separated.push_bind_unseparated(status);
        changed = true;
    }

    if payload.clear_expiry {
        separated.push("expires_at = NULL");
        changed = true;
    } else if let Some(expires_at) = payload.expires_at {
        separated.push("expires_at = ");
        separated.push_bind_unseparated(expires_at);
        changed = true;
    }

    if let Some(new_password) = payload.password {
        if !(8..=128).contains(&new_password.chars().count()) {
            return Err(AppError::BadRequest(
                "Password length must be between 8 and 128 characters.".to_string(),
            ));
        }
        separated.push("password = ");
        separated.push_bind_unseparated(hash_password(&new_password)?);
        changed = true;
    }

    if !changed {
        return Ok(StatusCode::OK);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update user: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tracing::info!(admin_id = %claims.sub, user_id = id, "user updated");
    Ok(StatusCode::OK)
}

/// Deletes a user by ID.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id()? {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let target = users::find(&pool, id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;
    if target.is_admin() && claims.role != UserRole::SuperAdmin {
        return Err(AppError::Forbidden(
            "Only a super admin can delete an admin".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Lists the question bank with answer keys.
/// Admin only.
pub async fn list_questions(
    State(pool): State<PgPool>,
    Query(params): Query<AdminQuestionParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE TRUE"));

    if let Some(exam_id) = params.exam_id {
        builder.push(" AND exam_id = ");
        builder.push_bind(exam_id);
    }
    if let Some(active) = params.active {
        builder.push(" AND is_active = ");
        builder.push_bind(active);
    }
    builder.push(" ORDER BY id");

    let list: Vec<Question> = builder
        .build_query_as()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list questions: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(list))
}

/// Creates a new question.
/// Admin only.
pub async fn create_question(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut conn = pool.acquire().await?;
    let id = questions::insert(&mut *conn, &payload.sanitized())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Updates a question by ID. The merged question is validated as a whole.
/// Admin only.
pub async fn update_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let current = questions::find(&pool, id)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let merged = payload.merge_into(current);
    merged
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let updated = questions::replace(&pool, id, &merged.sanitized())
        .await
        .map_err(|e| {
            tracing::error!("Failed to update question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if updated == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a question by ID. Mistake records for it go with it.
/// Admin only.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Bulk import of spreadsheet rows.
///
/// Valid rows are inserted in one transaction; invalid rows are reported
/// back by their 1-based position and never block the rest.
pub async fn import_questions(
    State(pool): State<PgPool>,
    Json(payload): Json<ImportQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.rows.is_empty() {
        return Err(AppError::BadRequest("No rows to import".to_string()));
    }

    let mut report = ImportReport {
        imported: 0,
        failed: Vec::new(),
    };

    let mut tx = pool.begin().await?;
    for (index, row) in payload.rows.into_iter().enumerate() {
        match row.into_request(payload.exam_id) {
            Ok(req) => {
                questions::insert(&mut *tx, &req).await.map_err(|e| {
                    tracing::error!("Failed to import question row {}: {:?}", index + 1, e);
                    AppError::InternalServerError(e.to_string())
                })?;
                report.imported += 1;
            }
            Err(error) => report.failed.push(ImportRowError {
                row: index + 1,
                error,
            }),
        }
    }
    tx.commit().await?;

    tracing::info!(
        imported = report.imported,
        failed = report.failed.len(),
        "question import finished"
    );

    Ok(Json(report))
}

/// Drafts questions with the generative-text API and stores them inactive.
/// Admin only.
pub async fn generate_questions(
    State(pool): State<PgPool>,
    State(generator): State<Arc<dyn QuestionGenerator>>,
    Json(payload): Json<GenerateRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let drafts = generator.generate(&payload).await?;
    if drafts.is_empty() {
        return Err(AppError::InternalServerError(
            "Generator produced no usable questions".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(drafts.len());
    for draft in &drafts {
        ids.push(questions::insert(&mut *tx, draft).await?);
    }
    tx.commit().await?;

    tracing::info!(count = ids.len(), topic = %payload.topic, "generated questions stored");

    Ok((StatusCode::CREATED, Json(serde_json::json!({"ids": ids}))))
}

/// Creates an exam definition.
/// Admin only.
pub async fn create_exam(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let exam = sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (title, description, duration_minutes, question_count, is_active) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {EXAM_COLUMNS}"
    ))
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(payload.duration_minutes)
    .bind(payload.question_count)
    .bind(payload.is_active.unwrap_or(true))
    .fetch_one(&pool)
    .await
    .map_err(|e| conflict_or_internal(e, "Exam title already exists", "Failed to create exam"))?;

    Ok((StatusCode::CREATED, Json(exam)))
}

/// Updates an exam definition by ID.
/// Admin only.
pub async fn update_exam(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if payload.title.is_none()
        && payload.description.is_none()
        && payload.duration_minutes.is_none()
        && payload.question_count.is_none()
        && payload.is_active.is_none()
    {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE exams SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title.trim().to_string());
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(description);
    }

    if let Some(duration) = payload.duration_minutes {
        separated.push("duration_minutes = ");
        separated.push_bind_unseparated(duration);
    }

    if let Some(count) = payload.question_count {
        separated.push("question_count = ");
        separated.push_bind_unseparated(count);
    }

    if let Some(active) = payload.is_active {
        separated.push("is_active = ");
        separated.push_bind_unseparated(active);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder
        .build()
        .execute(&pool)
        .await
        .map_err(|e| conflict_or_internal(e, "Exam title already exists", "Failed to update exam"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes an exam. Its questions stay in the bank, untagged.
/// Admin only.
pub async fn delete_exam(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM exams WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete exam: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
