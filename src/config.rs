// src/config.rs

use std::env;
use dotenvy::dotenv;

use crate::quiz::evaluator::ShortAnswerPolicy;

/// Minimum number of characters in a quiz title.
pub const MIN_TITLE_LENGTH: usize = 5;

/// Minimum number of characters in a question prompt.
pub const MIN_PROMPT_LENGTH: usize = 10;

/// Allowed range for a quiz's estimated completion time, in minutes.
pub const ESTIMATED_TIME_RANGE: std::ops::RangeInclusive<u32> = 5..=180;

/// Maximum marks a single question may carry.
pub const MAX_QUESTION_MARKS: u32 = 100;

/// Maximum passing score (percentage).
pub const MAX_PASSING_SCORE: u32 = 100;

/// Fixed labels for true/false questions. Index 0 is "True".
pub const TRUE_FALSE_OPTIONS: [&str; 2] = ["True", "False"];

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub short_answer: ShortAnswerPolicy,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let short_answer = ShortAnswerPolicy {
            case_sensitive: env_flag("SHORT_ANSWER_CASE_SENSITIVE", false),
            trim_whitespace: env_flag("SHORT_ANSWER_TRIM", true),
        };

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            short_answer,
            port,
        }
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
