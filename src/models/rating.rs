// src/models/rating.rs

use serde::{Deserialize, Serialize};

/// DTO for rating a question. Range is checked by the rating service.
#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub score: i16,
}

/// Aggregate rating of a question with the caller's own score.
#[derive(Debug, Serialize)]
pub struct RatingResponse {
    pub average: f64,
    pub count: i64,
    pub user_score: Option<i16>,
}
