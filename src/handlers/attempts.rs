// src/handlers/attempts.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, types::Json as SqlJson};
use uuid::Uuid;

use crate::{
    config::{HEATMAP_DEFAULT_DAYS, HEATMAP_MAX_DAYS},
    error::AppError,
    handlers::questions::{ensure_question_exists, load_details},
    models::attempt::{
        ActivityParams, ActivityResponse, Attempt, QuestionAttempt, SubmitAttemptRequest,
        UserAttempt,
    },
    services::activity::{heatmap, latest_per_question, new_attempt_id, streaks},
    utils::jwt::Claims,
};

/// Grade and record an answer.
///
/// The attempt insert and the `num_attempts` recount share a transaction.
pub async fn create_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.answer.is_blank() {
        return Err(AppError::BadRequest("answer is required".to_string()));
    }
    let user_id = claims.user_id()?;

    let detail = load_details(&pool, &[payload.question])
        .await?
        .remove(&payload.question)
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let is_correct = detail.answer_key().grade(&payload.answer);

    let mut tx = pool.begin().await?;

    let attempt = sqlx::query_as::<_, Attempt>(
        r#"
        INSERT INTO attempts (id, user_id, question_id, answer, is_correct)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, question_id, answer, is_correct, submitted_at
        "#,
    )
    .bind(new_attempt_id())
    .bind(user_id)
    .bind(payload.question)
    .bind(SqlJson(&payload.answer))
    .bind(is_correct)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to record attempt: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    // Recount from source rows rather than incrementing.
    sqlx::query(
        r#"
        UPDATE questions
        SET num_attempts = (SELECT COUNT(*) FROM attempts WHERE question_id = $1)
        WHERE id = $1
        "#,
    )
    .bind(payload.question)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(attempt)))
}

/// The caller's latest attempt on each question, most recent first.
pub async fn user_attempts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempts = sqlx::query_as::<_, UserAttempt>(
        r#"
        SELECT a.id, a.question_id, q.question, q.topic, q.week,
               a.answer, a.is_correct, a.submitted_at
        FROM attempts a
        JOIN questions q ON q.id = a.question_id
        WHERE a.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(latest_per_question(attempts)))
}

/// Every attempt on a question, newest first.
pub async fn question_attempts(
    State(pool): State<PgPool>,
    Path(question_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    ensure_question_exists(&pool, question_id).await?;

    let attempts = sqlx::query_as::<_, QuestionAttempt>(
        r#"
        SELECT a.id, a.user_id, u.username, a.answer, a.is_correct, a.submitted_at
        FROM attempts a
        JOIN users u ON u.id = a.user_id
        WHERE a.question_id = $1
        ORDER BY a.submitted_at DESC, a.id DESC
        "#,
    )
    .bind(question_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(attempts))
}

/// The caller's attempts on one question, newest first.
pub async fn user_question_attempts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    ensure_question_exists(&pool, question_id).await?;

    let attempts = sqlx::query_as::<_, Attempt>(
        r#"
        SELECT id, user_id, question_id, answer, is_correct, submitted_at
        FROM attempts
        WHERE user_id = $1 AND question_id = $2
        ORDER BY submitted_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .bind(question_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(attempts))
}

/// Heatmap over the trailing window plus streaks over the whole history.
pub async fn activity(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ActivityParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let days = params
        .days
        .unwrap_or(HEATMAP_DEFAULT_DAYS)
        .clamp(1, HEATMAP_MAX_DAYS);

    let timestamps: Vec<DateTime<Utc>> =
        sqlx::query_scalar("SELECT submitted_at FROM attempts WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&pool)
            .await?;

    let today = Utc::now().date_naive();
    Ok(Json(summarize_activity(&timestamps, today, days)))
}

fn summarize_activity(
    timestamps: &[DateTime<Utc>],
    today: NaiveDate,
    days: i64,
) -> ActivityResponse {
    let map = heatmap(timestamps, today, days);
    let dates: Vec<NaiveDate> = timestamps.iter().map(|ts| ts.date_naive()).collect();
    let streak = streaks(&dates, today);

    ActivityResponse {
        days,
        today_count: map.activity.get(&today).copied().unwrap_or(0),
        activity: map.activity,
        total_attempts: map.total_attempts,
        has_attempted_today: streak.has_attempted_today,
        current_streak: streak.current_streak,
        longest_streak: streak.longest_streak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn summary_combines_window_and_full_history() {
        let now = Utc.with_ymd_and_hms(2025, 3, 15, 18, 0, 0).unwrap();
        let today = now.date_naive();
        let timestamps = vec![
            now,
            now - Duration::hours(2),
            now - Duration::days(1),
            now - Duration::days(400),
            now - Duration::days(401),
            now - Duration::days(402),
        ];

        let summary = summarize_activity(&timestamps, today, 30);
        assert_eq!(summary.total_attempts, 3);
        assert_eq!(summary.today_count, 2);
        assert!(summary.has_attempted_today);
        assert_eq!(summary.current_streak, 2);
        // The older run sits outside the window but still counts.
        assert_eq!(summary.longest_streak, 3);
        assert_eq!(summary.activity.len(), 2);
    }

    #[test]
    fn empty_history() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let summary = summarize_activity(&[], today, 365);
        assert_eq!(summary.total_attempts, 0);
        assert_eq!(summary.today_count, 0);
        assert_eq!(summary.current_streak, 0);
        assert_eq!(summary.longest_streak, 0);
        assert!(!summary.has_attempted_today);
    }
}
