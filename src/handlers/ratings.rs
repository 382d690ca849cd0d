// src/handlers/ratings.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::questions::ensure_question_exists,
    models::rating::{RateRequest, RatingResponse},
    services::rating::{RatingSummary, validate_score},
    utils::jwt::Claims,
};

/// Recomputes the derived rating columns from the ratings table.
async fn recalculate(
    conn: &mut PgConnection,
    question_id: Uuid,
) -> Result<RatingSummary, AppError> {
    let scores: Vec<i16> =
        sqlx::query_scalar("SELECT score FROM question_ratings WHERE question_id = $1")
            .bind(question_id)
            .fetch_all(&mut *conn)
            .await?;

    let summary = RatingSummary::from_scores(&scores);

    sqlx::query(
        "UPDATE questions SET rating = $1, rating_count = $2, updated_at = NOW() WHERE id = $3",
    )
    .bind(summary.average)
    .bind(summary.count)
    .bind(question_id)
    .execute(&mut *conn)
    .await?;

    Ok(summary)
}

async fn rating_response(
    pool: &PgPool,
    question_id: Uuid,
    user_id: i64,
) -> Result<RatingResponse, AppError> {
    let (average, count): (f64, i64) =
        sqlx::query_as("SELECT rating, rating_count FROM questions WHERE id = $1")
            .bind(question_id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let user_score: Option<i16> = sqlx::query_scalar(
        "SELECT score FROM question_ratings WHERE question_id = $1 AND user_id = $2",
    )
    .bind(question_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(RatingResponse {
        average,
        count,
        user_score,
    })
}

/// Aggregate rating plus the caller's own score.
pub async fn get_rating(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(rating_response(&pool, question_id, user_id).await?))
}

/// Create or replace the caller's rating.
pub async fn rate_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<Uuid>,
    Json(payload): Json<RateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let score = validate_score(payload.score)?;
    let user_id = claims.user_id()?;
    ensure_question_exists(&pool, question_id).await?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO question_ratings (question_id, user_id, score)
        VALUES ($1, $2, $3)
        ON CONFLICT (question_id, user_id)
        DO UPDATE SET score = EXCLUDED.score, updated_at = NOW()
        "#,
    )
    .bind(question_id)
    .bind(user_id)
    .bind(score)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to save rating: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let summary = recalculate(&mut tx, question_id).await?;
    tx.commit().await?;

    Ok(Json(RatingResponse {
        average: summary.average,
        count: summary.count,
        user_score: Some(score),
    }))
}

/// Remove the caller's rating. Recalculates only when a row was deleted.
pub async fn unrate_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    ensure_question_exists(&pool, question_id).await?;

    let mut tx = pool.begin().await?;

    let deleted =
        sqlx::query("DELETE FROM question_ratings WHERE question_id = $1 AND user_id = $2")
            .bind(question_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

    if deleted > 0 {
        recalculate(&mut tx, question_id).await?;
    }
    tx.commit().await?;

    Ok(Json(rating_response(&pool, question_id, user_id).await?))
}
