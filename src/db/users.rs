// src/db/users.rs

use sqlx::{PgConnection, PgPool};

use crate::models::user::User;

pub const USER_COLUMNS: &str = "id, username, display_name, password, role, access_type, status, \
     expires_at, simulation_count, average_score, total_time_seconds, created_at";

pub async fn find(pool: &PgPool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await
}

/// Folds a finished simulation into the profile stats. Locks the row for the
/// duration of the surrounding transaction.
pub async fn record_simulation(
    conn: &mut PgConnection,
    user_id: i64,
    percentage: f64,
    seconds: i64,
) -> Result<(), sqlx::Error> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
    ))
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    let mut stats = user.stats();
    stats.record_simulation(percentage, seconds);

    sqlx::query(
        "UPDATE users SET simulation_count = $1, average_score = $2, total_time_seconds = $3 \
         WHERE id = $4",
    )
    .bind(stats.simulation_count)
    .bind(stats.average_score)
    .bind(stats.total_time_seconds)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
