// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use pmp_prep::ai::{OpenAiGenerator, QuestionGenerator};
use pmp_prep::config::Config;
use pmp_prep::routes;
use pmp_prep::state::AppState;
use pmp_prep::utils::hash::hash_password;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenv().ok();
    let config = Config::from_env();

    // File logging stops when the guard drops
    let _guard = init_tracing(&config.rust_log);

    let pool = connect_with_retry(&config.database_url, 5).await;

    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    if let Err(e) = seed_super_admin(&pool, &config).await {
        tracing::error!("Failed to seed super admin: {:?}", e);
    }

    let generator = OpenAiGenerator::new(config.ai.clone());
    if !generator.enabled() {
        tracing::info!("AI_API_KEY not set, question generation disabled");
    }
    let state = AppState {
        pool,
        config: config.clone(),
        generator: Arc::new(generator),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {}: {}", config.bind_addr, e));
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, routes::create_router(state))
        .await
        .expect("Server error");
}

/// Stdout plus a daily rolling file under `logs/`.
fn init_tracing(filter: &str) -> WorkerGuard {
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily("logs", "app.log"));

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(fmt::layer().with_writer(std::io::stdout).with_target(false))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    guard
}

/// The database container may still be starting; retry every 2s.
async fn connect_with_retry(database_url: &str, max_retries: u32) -> PgPool {
    let mut attempt = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                tracing::info!("Database connected");
                return pool;
            }
            Err(e) if attempt < max_retries => {
                attempt += 1;
                tracing::warn!("Database not ready ({}), retry {}/{} in 2s", e, attempt, max_retries);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            Err(e) => panic!("Failed to connect to database after {} retries: {}", max_retries, e),
        }
    }
}

/// Creates the configured super admin on first start. Existing accounts are left alone.
async fn seed_super_admin(pool: &PgPool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
        let username = username.trim().to_lowercase();
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
            .bind(&username)
            .fetch_optional(pool)
            .await?;

        if exists.is_none() {
            tracing::info!("Seeding super admin: {}", username);
            let hashed_password = hash_password(password)?;

            sqlx::query(
                "INSERT INTO users (username, password, role, access_type, status) \
                 VALUES ($1, $2, 'super_admin', 'premium', 'active')",
            )
            .bind(&username)
            .bind(hashed_password)
            .execute(pool)
            .await?;
            tracing::info!("Super admin created successfully.");
        }
    }
    Ok(())
}
