// src/handlers/saved.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::questions::{ensure_question_exists, to_responses},
    models::{
        question::{QUESTION_COLUMNS, Question},
        saved::SavedQuestionResponse,
    },
    utils::jwt::Claims,
};

/// Toggle a bookmark: 201 when saved, 200 when removed.
pub async fn toggle_save(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    ensure_question_exists(&pool, question_id).await?;

    let removed = sqlx::query("DELETE FROM saved_questions WHERE user_id = $1 AND question_id = $2")
        .bind(user_id)
        .bind(question_id)
        .execute(&pool)
        .await?
        .rows_affected();

    if removed > 0 {
        return Ok((
            StatusCode::OK,
            Json(json!({ "message": "Question unsaved.", "saved": false })),
        ));
    }

    sqlx::query(
        "INSERT INTO saved_questions (user_id, question_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(question_id)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to save question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Question saved.", "saved": true })),
    ))
}

/// The caller's bookmarks, most recently saved first.
pub async fn saved_list(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let saved: Vec<(Uuid, DateTime<Utc>)> = sqlx::query_as(
        "SELECT question_id, saved_at FROM saved_questions WHERE user_id = $1 ORDER BY saved_at DESC",
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    let ids: Vec<Uuid> = saved.iter().map(|(id, _)| *id).collect();
    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {} FROM questions q JOIN users u ON u.id = q.creator_id WHERE q.id = ANY($1)",
        QUESTION_COLUMNS
    ))
    .bind(&ids)
    .fetch_all(&pool)
    .await?;

    let mut by_id: HashMap<Uuid, _> = to_responses(&pool, questions, user_id)
        .await?
        .into_iter()
        .map(|r| (r.question.id, r))
        .collect();

    let results: Vec<SavedQuestionResponse> = saved
        .into_iter()
        .filter_map(|(id, saved_at)| {
            by_id
                .remove(&id)
                .map(|question| SavedQuestionResponse { saved_at, question })
        })
        .collect();

    Ok(Json(results))
}
