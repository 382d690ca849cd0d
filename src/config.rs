// src/config.rs

use std::collections::HashSet;
use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

use crate::services::leaderboard::{ActivityKind, ScoringConfig};

/// Default number of leaderboard rows per page.
pub const LEADERBOARD_PAGE_SIZE: usize = 20;
/// Hard cap on a caller-supplied leaderboard page size.
pub const LEADERBOARD_MAX_PAGE_SIZE: usize = 1000;
/// Trailing window for the activity heatmap.
pub const HEATMAP_DEFAULT_DAYS: i64 = 365;
pub const HEATMAP_MAX_DAYS: i64 = 3650;
/// Longest comment stored, counted after sanitizing.
pub const MAX_COMMENT_CHARS: usize = 1000;
/// Sentinel prefix written when explanation generation fails.
pub const AI_FAILURE_PREFIX: &str = "AI explanation failed";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub port: u16,

    /// Seed account created on startup when both are present.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,

    /// Lower-cased allowlist for the email-gated admin endpoints.
    pub admin_emails: HashSet<String>,

    pub scoring: ScoringConfig,

    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub ai_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let scoring = ScoringConfig {
            points_per_attempt: env_or("LEADERBOARD_POINTS_PER_ATTEMPT", 1),
            bonus_per_correct: env_or("LEADERBOARD_POINTS_BONUS_CORRECT", 9),
            activity_weights: vec![
                (ActivityKind::Comment, env_or("LEADERBOARD_POINTS_PER_COMMENT", 0)),
                (ActivityKind::Rating, env_or("LEADERBOARD_POINTS_PER_RATING", 0)),
                (ActivityKind::Like, env_or("LEADERBOARD_POINTS_PER_LIKE", 0)),
            ],
        };

        Self {
            database_url,
            jwt_secret,
            jwt_expiration: env_or("JWT_EXPIRATION", 86_400),
            rust_log,
            port: env_or("PORT", 3000),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            admin_emails: parse_admin_emails(&env::var("ADMIN_EMAILS").unwrap_or_default()),
            scoring,
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            ai_timeout_secs: env_or("AI_TIMEOUT_SECS", 30),
        }
    }
}

/// Reads and parses an environment variable, falling back on absence or a bad value.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable value for {}: {:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

/// Splits a comma-separated email list into a normalized set.
pub fn parse_admin_emails(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|chunk| chunk.trim().to_lowercase())
        .filter(|email| !email.is_empty())
        .collect()
}
