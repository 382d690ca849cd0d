// src/services/rating.rs

use serde::Serialize;

use crate::error::AppError;

pub const MIN_SCORE: i16 = 1;
pub const MAX_SCORE: i16 = 5;

pub fn validate_score(score: i16) -> Result<i16, AppError> {
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(score)
    } else {
        Err(AppError::BadRequest(format!(
            "Score must be between {} and {}",
            MIN_SCORE, MAX_SCORE
        )))
    }
}

/// Derived rating columns of a question.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub average: f64,
    pub count: i64,
}

impl RatingSummary {
    /// Mean rounded to two decimals; 0.0 when there are no ratings.
    pub fn from_scores(scores: &[i16]) -> Self {
        if scores.is_empty() {
            return Self {
                average: 0.0,
                count: 0,
            };
        }

        let sum: i64 = scores.iter().map(|s| i64::from(*s)).sum();
        let mean = sum as f64 / scores.len() as f64;

        Self {
            average: (mean * 100.0).round() / 100.0,
            count: scores.len() as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_bounds() {
        assert!(validate_score(1).is_ok());
        assert!(validate_score(5).is_ok());
        assert!(matches!(validate_score(0), Err(AppError::BadRequest(_))));
        assert!(matches!(validate_score(6), Err(AppError::BadRequest(_))));
        assert!(validate_score(-3).is_err());
    }

    #[test]
    fn average_rounds_to_two_decimals() {
        let summary = RatingSummary::from_scores(&[5, 4, 4]);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average, 4.33);

        assert_eq!(RatingSummary::from_scores(&[1, 2]).average, 1.5);
        assert_eq!(RatingSummary::from_scores(&[5, 5, 4]).average, 4.67);
    }

    #[test]
    fn no_ratings_is_zero() {
        let summary = RatingSummary::from_scores(&[]);
        assert_eq!(summary.average, 0.0);
        assert_eq!(summary.count, 0);
    }
}
