// src/models/admin.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::services::verification::VerifyStatus;

/// Body of the email-gated verify endpoint.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// "APPROVE" or "REJECT".
    #[serde(default)]
    pub action: String,
}

/// Body of the staff review endpoint.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub approved: bool,
    #[serde(rename = "rejectionReason", alias = "rejection_reason")]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub message: String,
    pub new_status: VerifyStatus,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserTotals {
    pub total: i64,
    pub active_last_7_days: i64,
    pub with_attempts: i64,
}

#[derive(Debug, Serialize)]
pub struct QuestionTotals {
    pub total: i64,
    pub mcq: i64,
    pub short: i64,
    pub pending_review: i64,
}

#[derive(Debug, Serialize)]
pub struct AttemptStats {
    pub total: i64,
    pub correct: i64,
    pub incorrect: i64,
    pub unique_users: i64,
}

#[derive(Debug, Serialize)]
pub struct AiTotals {
    pub short_answer_total: i64,
    pub ai_answered: i64,
    pub last_generated_at: Option<DateTime<Utc>>,
}

/// Platform-wide metrics.
#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub users: UserTotals,
    pub questions: QuestionTotals,
    pub attempts: AttemptStats,
    pub ai_usage: AiTotals,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserActivityParams {
    /// Clamped to 1..=100, default 20.
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct UserActivityRow {
    pub user_id: i64,
    pub email: String,
    pub display_name: String,
    pub total_questions: i64,
    pub total_attempts: i64,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct UserActivityResponse {
    pub limit: i64,
    pub count: usize,
    pub results: Vec<UserActivityRow>,
}

#[derive(Debug, Serialize)]
pub struct AiUsageTotals {
    pub short_answers: i64,
    pub ai_populated: i64,
    pub fallback_messages: i64,
}

#[derive(Debug, Serialize)]
pub struct AiPerformance {
    /// Share of short answers with a populated explanation; null without any.
    pub ai_success_rate: Option<f64>,
    pub average_ai_answer_length: Option<f64>,
    pub last_generated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct AiExample {
    pub question_id: Uuid,
    pub question_text: String,
    pub creator_email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AiUsageResponse {
    pub totals: AiUsageTotals,
    pub performance: AiPerformance,
    pub recent_examples: Vec<AiExample>,
}

/// Clamps a caller-supplied limit to 1..=100, defaulting to 20.
pub fn clamp_activity_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(20).clamp(1, 100)
}
