// src/handlers/comments.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::MAX_COMMENT_CHARS,
    error::AppError,
    handlers::questions::ensure_question_exists,
    models::comment::{CommentResponse, CreateCommentRequest, into_threads},
    utils::{html::clean_text, jwt::Claims},
};

/// Selects `CommentResponse` columns; `viewer_param` is the placeholder for the caller's id.
fn comment_select(viewer_param: &str) -> String {
    format!(
        r#"
        SELECT c.id, c.question_id, c.author_id, u.username AS author, c.parent_id,
               c.content, c.created_at,
               (SELECT COUNT(*) FROM comment_likes l WHERE l.comment_id = c.id) AS likes_count,
               EXISTS (
                   SELECT 1 FROM comment_likes l
                   WHERE l.comment_id = c.id AND l.user_id = {}
               ) AS liked_by_me
        FROM comments c
        JOIN users u ON u.id = c.author_id
        "#,
        viewer_param
    )
}

async fn fetch_comment(pool: &PgPool, id: Uuid, viewer: i64) -> Result<CommentResponse, AppError> {
    sqlx::query_as::<_, CommentResponse>(&format!("{} WHERE c.id = $1", comment_select("$2")))
        .bind(id)
        .bind(viewer)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Comment not found".to_string()))
}

/// Validates and sanitizes comment content before any lookup. The length cap
/// applies to the sanitized text, since escaping can lengthen it.
fn sanitized_content(payload: &CreateCommentRequest) -> Result<String, AppError> {
    payload.validate()?;
    let content = clean_text(&payload.content)
        .ok_or(AppError::BadRequest("Comment content cannot be empty".to_string()))?;

    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::BadRequest(format!(
            "Comment must be at most {} characters once formatted",
            MAX_COMMENT_CHARS
        )));
    }
    Ok(content)
}

async fn insert_comment(
    pool: &PgPool,
    question_id: Uuid,
    author_id: i64,
    parent_id: Option<Uuid>,
    content: &str,
) -> Result<Uuid, AppError> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO comments (id, question_id, author_id, parent_id, content) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(question_id)
    .bind(author_id)
    .bind(parent_id)
    .bind(content)
    .execute(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create comment: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;
    Ok(id)
}

/// Root comments of a question with their replies nested.
pub async fn list_comments(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    ensure_question_exists(&pool, question_id).await?;

    let comments = sqlx::query_as::<_, CommentResponse>(&format!(
        "{} WHERE c.question_id = $1 ORDER BY c.created_at ASC, c.id ASC",
        comment_select("$2")
    ))
    .bind(question_id)
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(into_threads(comments)))
}

/// Add a root comment to a question.
pub async fn create_comment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let content = sanitized_content(&payload)?;
    let user_id = claims.user_id()?;
    ensure_question_exists(&pool, question_id).await?;

    let id = insert_comment(&pool, question_id, user_id, None, &content).await?;
    let comment = fetch_comment(&pool, id, user_id).await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Reply to a root comment. Replies cannot be replied to.
pub async fn reply_to_comment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let content = sanitized_content(&payload)?;
    let user_id = claims.user_id()?;

    let (question_id, grandparent): (Uuid, Option<Uuid>) =
        sqlx::query_as("SELECT question_id, parent_id FROM comments WHERE id = $1")
            .bind(comment_id)
            .fetch_optional(&pool)
            .await?
            .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    if grandparent.is_some() {
        return Err(AppError::BadRequest("Cannot reply to a reply".to_string()));
    }

    let id = insert_comment(&pool, question_id, user_id, Some(comment_id), &content).await?;
    let reply = fetch_comment(&pool, id, user_id).await?;

    Ok((StatusCode::CREATED, Json(reply)))
}

/// Like a comment. Liking twice is a no-op.
pub async fn like_comment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    fetch_comment(&pool, comment_id, user_id).await?;

    sqlx::query(
        "INSERT INTO comment_likes (comment_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(comment_id)
    .bind(user_id)
    .execute(&pool)
    .await?;

    let comment = fetch_comment(&pool, comment_id, user_id).await?;
    Ok(Json(json!({
        "liked": comment.liked_by_me,
        "likes_count": comment.likes_count,
    })))
}

/// Remove a like. Unliking a comment that was not liked is a no-op.
pub async fn unlike_comment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    fetch_comment(&pool, comment_id, user_id).await?;

    sqlx::query("DELETE FROM comment_likes WHERE comment_id = $1 AND user_id = $2")
        .bind(comment_id)
        .bind(user_id)
        .execute(&pool)
        .await?;

    let comment = fetch_comment(&pool, comment_id, user_id).await?;
    Ok(Json(json!({
        "liked": comment.liked_by_me,
        "likes_count": comment.likes_count,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(content: String) -> CreateCommentRequest {
        CreateCommentRequest { content }
    }

    #[test]
    fn escaping_counts_toward_the_limit() {
        // 400 input characters become 2000 once escaped to `&amp;`.
        let err = sanitized_content(&request("&".repeat(400))).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn plain_text_at_the_limit_is_kept() {
        let content = sanitized_content(&request("a".repeat(MAX_COMMENT_CHARS))).unwrap();
        assert_eq!(content.chars().count(), MAX_COMMENT_CHARS);
    }

    #[test]
    fn markup_only_content_is_rejected() {
        assert!(sanitized_content(&request("<script>alert(1)</script>".to_string())).is_err());
    }
}
