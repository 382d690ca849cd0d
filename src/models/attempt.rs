// src/models/attempt.rs

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

use crate::services::{activity::Submission, grading::SubmittedAnswer};

/// Represents the 'attempts' table. Rows are never updated.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Attempt {
    pub id: Uuid,
    #[serde(skip)]
    pub user_id: i64,
    pub question_id: Uuid,
    /// The answer exactly as submitted.
    pub answer: Json<SubmittedAnswer>,
    /// Null for short-answer questions.
    pub is_correct: Option<bool>,
    pub submitted_at: DateTime<Utc>,
}

/// An attempt joined with its question, for the caller's history.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserAttempt {
    pub id: Uuid,
    pub question_id: Uuid,
    /// Question text.
    pub question: String,
    pub topic: Option<String>,
    pub week: Option<String>,
    pub answer: Json<SubmittedAnswer>,
    pub is_correct: Option<bool>,
    pub submitted_at: DateTime<Utc>,
}

impl Submission for UserAttempt {
    fn attempt_id(&self) -> Uuid {
        self.id
    }

    fn question_id(&self) -> Uuid {
        self.question_id
    }

    fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

/// An attempt on one question with the attempter's name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuestionAttempt {
    pub id: Uuid,
    pub user_id: i64,
    pub username: String,
    pub answer: Json<SubmittedAnswer>,
    pub is_correct: Option<bool>,
    pub submitted_at: DateTime<Utc>,
}

/// DTO for submitting an answer.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    /// Question id.
    pub question: Uuid,
    pub answer: SubmittedAnswer,
}

/// Query parameters for the activity endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ActivityParams {
    /// Trailing window in days (default 365).
    pub days: Option<i64>,
}

/// Heatmap plus streak summary.
#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub days: i64,
    pub activity: BTreeMap<NaiveDate, i64>,
    pub total_attempts: i64,
    pub today_count: i64,
    pub has_attempted_today: bool,
    pub current_streak: i64,
    pub longest_streak: i64,
}
