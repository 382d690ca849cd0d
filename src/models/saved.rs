// src/models/saved.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::question::QuestionResponse;

/// A bookmark with the full question it points to.
#[derive(Debug, Serialize)]
pub struct SavedQuestionResponse {
    pub saved_at: DateTime<Utc>,
    pub question: QuestionResponse,
}
