// tests/common/mod.rs

//! Helpers for end-to-end tests against a real Postgres (`DATABASE_URL`).

#![allow(dead_code)]

use std::sync::Arc;

use pmp_prep::{ai::OpenAiGenerator, config::Config, routes, state::AppState};
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub struct TestApp {
    pub address: String,
    pub pool: PgPool,
    pub client: reqwest::Client,
}

/// Spawns the app on a random port with migrations applied.
pub async fn spawn_app() -> TestApp {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        cors_origins: Vec::new(),
        admin_username: None,
        admin_password: None,
        ai: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
        generator: Arc::new(OpenAiGenerator::new(None)),
    };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let address = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        pool,
        client: reqwest::Client::new(),
    }
}

pub fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register(&self, username: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/register"))
            .json(&json!({ "username": username, "password": "password123" }))
            .send()
            .await
            .expect("Register failed")
    }

    pub async fn login(&self, username: &str) -> Value {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": "password123" }))
            .send()
            .await
            .expect("Login failed")
            .json()
            .await
            .expect("Failed to parse login json")
    }

    /// Registers a user, sets its account fields directly and returns a bearer token.
    pub async fn user_with(&self, role: &str, access_type: &str) -> (i64, String) {
        let username = unique_name("u");
        self.register(&username).await;

        let id: i64 = sqlx::query_scalar(
            "UPDATE users SET role = $1, access_type = $2, status = 'active' \
             WHERE username = $3 RETURNING id",
        )
        .bind(role)
        .bind(access_type)
        .bind(&username)
        .fetch_one(&self.pool)
        .await
        .unwrap();

        let login = self.login(&username).await;
        let token = login["token"].as_str().expect("Token not found").to_string();
        (id, format!("Bearer {token}"))
    }

    /// Creates an exam with `count` single-answer questions whose key is "A".
    pub async fn seed_exam(&self, count: usize) -> (i64, Vec<i64>) {
        let exam_id: i64 = sqlx::query_scalar(
            "INSERT INTO exams (title, duration_minutes, question_count) VALUES ($1, 230, $2) RETURNING id",
        )
        .bind(unique_name("exam"))
        .bind(count as i32)
        .fetch_one(&self.pool)
        .await
        .unwrap();

        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO questions (statement, options, correct_option_ids, explanation, domain, approach, exam_id)
                VALUES ($1, $2, $3, 'Because A.', 'process', 'predictive', $4)
                RETURNING id
                "#,
            )
            .bind(format!("Question {i}"))
            .bind(json!([{ "id": "A", "text": "Right" }, { "id": "B", "text": "Wrong" }]))
            .bind(json!(["A"]))
            .bind(exam_id)
            .fetch_one(&self.pool)
            .await
            .unwrap();
            ids.push(id);
        }
        (exam_id, ids)
    }
}
