// src/handlers/questions.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json as SqlJson};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::question::{
        CreateQuestionRequest, DraftDetail, McqDetail, QUESTION_COLUMNS, Question,
        QuestionDetail, QuestionListParams, QuestionMetadata, QuestionResponse, QuestionSource,
        QuestionType, ShortDetail,
    },
    services::{
        explanation::{ExplanationGenerator, explain_or_fallback},
        recommendation::{Candidate, recommend},
        verification::VerifyStatus,
    },
    utils::jwt::Claims,
};

const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;

/// Loads a single question row, or 404.
pub(crate) async fn fetch_question(pool: &PgPool, id: Uuid) -> Result<Question, AppError> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {} FROM questions q JOIN users u ON u.id = q.creator_id WHERE q.id = $1",
        QUESTION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))
}

/// 404 unless the question exists.
pub(crate) async fn ensure_question_exists(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM questions WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await?;

    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound("Question not found".to_string()))
    }
}

/// Detail rows for a batch of questions, keyed by question id.
pub(crate) async fn load_details(
    pool: &PgPool,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, QuestionDetail>, AppError> {
    let mcq = sqlx::query_as::<_, McqDetail>(
        r#"
        SELECT question_id, option_a, option_b, option_c, option_d, option_e,
               correct_options, explanation
        FROM mcq_questions
        WHERE question_id = ANY($1)
        "#,
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;

    let short = sqlx::query_as::<_, ShortDetail>(
        "SELECT question_id, answer, ai_answer FROM short_answer_questions WHERE question_id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;

    let mut details = HashMap::with_capacity(mcq.len() + short.len());
    details.extend(mcq.into_iter().map(|d| (d.question_id, QuestionDetail::Mcq(d))));
    details.extend(short.into_iter().map(|d| (d.question_id, QuestionDetail::Short(d))));
    Ok(details)
}

/// Attaches detail rows and the caller's own ratings, preserving order.
pub(crate) async fn to_responses(
    pool: &PgPool,
    questions: Vec<Question>,
    user_id: i64,
) -> Result<Vec<QuestionResponse>, AppError> {
    let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
    let mut details = load_details(pool, &ids).await?;

    let ratings: HashMap<Uuid, i16> = sqlx::query_as::<_, (Uuid, i16)>(
        "SELECT question_id, score FROM question_ratings WHERE user_id = $1 AND question_id = ANY($2)",
    )
    .bind(user_id)
    .bind(&ids)
    .fetch_all(pool)
    .await?
    .into_iter()
    .collect();

    Ok(questions
        .into_iter()
        .map(|q| {
            let detail = details.remove(&q.id);
            let user_rating = ratings.get(&q.id).copied();
            QuestionResponse::new(q, detail, user_rating)
        })
        .collect())
}

async fn question_response(
    pool: &PgPool,
    id: Uuid,
    user_id: i64,
) -> Result<QuestionResponse, AppError> {
    let question = fetch_question(pool, id).await?;
    to_responses(pool, vec![question], user_id)
        .await?
        .pop()
        .ok_or(AppError::NotFound("Question not found".to_string()))
}

/// Create a new question with its type-specific detail.
///
/// Short answers get an AI explanation first; a failed or slow generator
/// leaves the sentinel text in its place. The question and its detail row
/// are written in one transaction.
pub async fn create_question(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    State(explainer): State<Arc<dyn ExplanationGenerator>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let draft = payload.into_draft()?;
    let user_id = claims.user_id()?;

    let ai_answer = match &draft.detail {
        DraftDetail::Short { answer } => Some(
            explain_or_fallback(
                explainer.as_ref(),
                &draft.question,
                answer,
                Duration::from_secs(config.ai_timeout_secs),
            )
            .await,
        ),
        DraftDetail::Mcq { .. } => None,
    };

    let id = Uuid::new_v4();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO questions (id, question, creator_id, type, source, week, topic)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(&draft.question)
    .bind(user_id)
    .bind(draft.question_type.as_str())
    .bind(draft.source.as_str())
    .bind(&draft.week)
    .bind(&draft.topic)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to insert question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let inserted = match draft.detail {
        DraftDetail::Mcq {
            options,
            correct_options,
            explanation,
        } => {
            let [a, b, c, d, e] = options;
            sqlx::query(
                r#"
                INSERT INTO mcq_questions
                    (question_id, option_a, option_b, option_c, option_d, option_e,
                     correct_options, explanation)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(id)
            .bind(a)
            .bind(b)
            .bind(c)
            .bind(d)
            .bind(e)
            .bind(SqlJson(correct_options))
            .bind(explanation)
            .execute(&mut *tx)
            .await
        }
        DraftDetail::Short { answer } => {
            sqlx::query(
                "INSERT INTO short_answer_questions (question_id, answer, ai_answer) VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(answer)
            .bind(ai_answer)
            .execute(&mut *tx)
            .await
        }
    };
    inserted.map_err(|e| {
        tracing::error!("Failed to insert question detail: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tx.commit().await?;

    tracing::info!("User {} created {} question {}", user_id, draft.question_type, id);

    let response = question_response(&pool, id, user_id).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// List questions with optional filters.
pub async fn list_questions(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<QuestionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let question_type = match non_empty(&params.question_type) {
        Some(raw) => Some(
            QuestionType::parse(raw)
                .ok_or(AppError::BadRequest("type must be MCQ or SHORT".to_string()))?,
        ),
        None => None,
    };
    let source = match non_empty(&params.source) {
        Some(raw) => Some(QuestionSource::parse(raw).ok_or(AppError::BadRequest(
            "source must be STUDENT or TEACHING_TEAM".to_string(),
        ))?),
        None => None,
    };

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT {} FROM questions q JOIN users u ON u.id = q.creator_id WHERE 1 = 1",
        QUESTION_COLUMNS
    ));

    if let Some(week) = non_empty(&params.week) {
        qb.push(" AND q.week = ").push_bind(week.to_string());
    }
    if let Some(topic) = non_empty(&params.topic) {
        qb.push(" AND LOWER(q.topic) = LOWER(")
            .push_bind(topic.to_string())
            .push(")");
    }
    if let Some(question_type) = question_type {
        qb.push(" AND q.type = ").push_bind(question_type.as_str());
    }
    if let Some(source) = source {
        qb.push(" AND q.source = ").push_bind(source.as_str());
    }
    if params.verified == Some(true) {
        qb.push(" AND q.verify_status = ")
            .push_bind(VerifyStatus::Approved.as_str());
    }
    if let Some(min_rating) = params.min_rating {
        qb.push(" AND q.rating >= ").push_bind(min_rating);
    }
    if let Some(search) = non_empty(&params.q) {
        qb.push(" AND q.question ILIKE ")
            .push_bind(format!("%{}%", escape_like(search)));
    }

    qb.push(match params.sort.as_deref() {
        Some("oldest") => " ORDER BY q.created_at ASC",
        Some("rating") => " ORDER BY q.rating DESC, q.rating_count DESC, q.created_at DESC",
        Some("attempts") => " ORDER BY q.num_attempts DESC, q.created_at DESC",
        _ => " ORDER BY q.created_at DESC",
    });
    qb.push(" LIMIT ").push_bind(limit);

    let questions = qb
        .build_query_as::<Question>()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list questions: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(to_responses(&pool, questions, user_id).await?))
}

/// Get a single question with its detail and the caller's rating.
pub async fn get_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    Ok(Json(question_response(&pool, id, user_id).await?))
}

/// Questions created by the caller, newest first.
pub async fn user_questions(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let questions = sqlx::query_as::<_, Question>(&format!(
        r#"
        SELECT {} FROM questions q JOIN users u ON u.id = q.creator_id
        WHERE q.creator_id = $1
        ORDER BY q.created_at DESC
        "#,
        QUESTION_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(to_responses(&pool, questions, user_id).await?))
}

/// Distinct weeks and topics.
pub async fn metadata(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let weeks: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT week FROM questions WHERE week IS NOT NULL AND week <> '' ORDER BY week",
    )
    .fetch_all(&pool)
    .await?;

    let topics: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT topic FROM questions WHERE topic IS NOT NULL AND topic <> '' ORDER BY topic",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(QuestionMetadata { weeks, topics }))
}

/// Up to six questions the caller has not attempted yet.
pub async fn recommended(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempted: HashSet<Uuid> = sqlx::query_scalar::<_, Uuid>(
        "SELECT DISTINCT question_id FROM attempts WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?
    .into_iter()
    .collect();

    let recent_topic: Option<String> = sqlx::query_scalar::<_, Option<String>>(
        r#"
        SELECT q.topic FROM attempts a
        JOIN questions q ON q.id = a.question_id
        WHERE a.user_id = $1
        ORDER BY a.submitted_at DESC, a.id DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .flatten();

    let candidates = sqlx::query_as::<_, Candidate>(
        "SELECT id, topic, verify_status, rating, num_attempts, created_at FROM questions",
    )
    .fetch_all(&pool)
    .await?;

    let ids = {
        let mut rng = rand::thread_rng();
        recommend(&candidates, &attempted, recent_topic.as_deref(), &mut rng)
    };

    tracing::debug!(
        "Recommending {} questions to user {} (recent topic {:?})",
        ids.len(),
        user_id,
        recent_topic
    );

    let mut questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {} FROM questions q JOIN users u ON u.id = q.creator_id WHERE q.id = ANY($1)",
        QUESTION_COLUMNS
    ))
    .bind(&ids)
    .fetch_all(&pool)
    .await?;

    let position: HashMap<Uuid, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    questions.sort_by_key(|q| position.get(&q.id).copied().unwrap_or(usize::MAX));

    Ok(Json(to_responses(&pool, questions, user_id).await?))
}

/// Delete a question and everything hanging off it.
/// Requires: creator or staff.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let creator_id: i64 = sqlx::query_scalar("SELECT creator_id FROM questions WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    if creator_id != user_id && !claims.is_staff() {
        return Err(AppError::Forbidden(
            "You are not allowed to delete this question".to_string(),
        ));
    }

    sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    tracing::info!("Question {} deleted by user {}", id, user_id);

    Ok(StatusCode::NO_CONTENT)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Escapes LIKE wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
