// src/config.rs

use std::env;

use dotenvy::dotenv;

/// Number of seconds in a full PMP simulation (230 minutes).
pub const SIMULATION_DURATION_SECS: i64 = 230 * 60;

/// Length of each optional break during a simulation.
pub const BREAK_DURATION_SECS: i64 = 10 * 60;

/// Breaks are offered once this many questions have been answered.
pub const BREAK_CHECKPOINTS: [i32; 2] = [60, 120];

/// Percentage at or above which an attempt counts as a pass.
pub const PASSING_SCORE_PERCENTAGE: f64 = 61.0;

/// Practice pool caps per access type.
pub const FREE_PRACTICE_LIMIT: i64 = 20;
pub const MAX_PRACTICE_LIMIT: i64 = 100;

/// Default page size for history listings.
pub const DEFAULT_HISTORY_LIMIT: i64 = 20;

/// Upper bound for a single AI generation request.
pub const MAX_GENERATED_QUESTIONS: usize = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    /// Browser origins allowed by CORS.
    pub cors_origins: Vec<String>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub ai: Option<AiConfig>,
}

/// Settings for the generative-text API used to draft questions.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl AiConfig {
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173,http://127.0.0.1:5173".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            cors_origins,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            ai: AiConfig::from_env(),
        }
    }
}
