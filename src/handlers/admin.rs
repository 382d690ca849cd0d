// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    config::AI_FAILURE_PREFIX,
    error::AppError,
    handlers::questions::to_responses,
    models::{
        admin::{
            AiExample, AiPerformance, AiTotals, AiUsageResponse, AiUsageTotals, AttemptStats,
            OverviewResponse, QuestionTotals, ReviewRequest, UserActivityParams,
            UserActivityResponse, UserActivityRow, UserTotals, VerifyRequest, VerifyResponse,
            clamp_activity_limit,
        },
        question::{QUESTION_COLUMNS, Question},
    },
    services::verification::{self, Transition, VerifyAction, VerifyStatus},
    utils::jwt::Claims,
};

async fn current_status(pool: &PgPool, id: Uuid) -> Result<VerifyStatus, AppError> {
    let raw: String = sqlx::query_scalar("SELECT verify_status FROM questions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    VerifyStatus::try_from(raw).map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Writes a transition. With `from` set, only a question still in that status
/// is updated, so concurrent decisions cannot both win. Returns false when
/// nothing matched.
async fn apply_transition(
    pool: &PgPool,
    id: Uuid,
    transition: &Transition,
    from: Option<VerifyStatus>,
) -> Result<bool, AppError> {
    let updated = sqlx::query(
        r#"
        UPDATE questions
        SET verify_status = $1, rejection_reason = $2, updated_at = NOW()
        WHERE id = $3 AND ($4::TEXT IS NULL OR verify_status = $4)
        "#,
    )
    .bind(transition.status.as_str())
    .bind(&transition.rejection_reason)
    .bind(id)
    .bind(from.map(|status| status.as_str()))
    .execute(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update verification status: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .rows_affected();

    Ok(updated > 0)
}

/// Approve or reject a pending question.
/// Gated by the ADMIN_EMAILS allowlist.
pub async fn verify_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let action = VerifyAction::parse(&payload.action)?;
    let transition = verification::verify(current_status(&pool, id).await?, action)?;

    if !apply_transition(&pool, id, &transition, Some(VerifyStatus::Pending)).await? {
        // Another decision landed first, or the question was deleted.
        let now = current_status(&pool, id).await?;
        return Err(verification::verify(now, action)
            .err()
            .unwrap_or_else(|| AppError::Conflict("Question is no longer pending".to_string())));
    }

    tracing::info!("Question {} {} by {}", id, action.past_tense(), claims.email);

    Ok(Json(VerifyResponse {
        message: format!("Question {} successfully", action.past_tense()),
        new_status: transition.status,
        rejection_reason: transition.rejection_reason,
    }))
}

/// Review a question; may revisit an earlier decision.
/// Staff only.
pub async fn review_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    let transition = verification::review(payload.approved, payload.rejection_reason.as_deref())?;

    if !apply_transition(&pool, id, &transition, None).await? {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    tracing::info!(
        "Question {} reviewed as {} by user {}",
        id,
        transition.status,
        claims.sub
    );

    Ok(Json(VerifyResponse {
        message: format!("Question marked as {}", transition.status),
        new_status: transition.status,
        rejection_reason: transition.rejection_reason,
    }))
}

/// Questions awaiting review, oldest first.
/// Staff only.
pub async fn pending_questions(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let questions = sqlx::query_as::<_, Question>(&format!(
        r#"
        SELECT {} FROM questions q JOIN users u ON u.id = q.creator_id
        WHERE q.verify_status = $1
        ORDER BY q.created_at ASC
        "#,
        QUESTION_COLUMNS
    ))
    .bind(VerifyStatus::Pending.as_str())
    .fetch_all(&pool)
    .await?;

    Ok(Json(to_responses(&pool, questions, claims.user_id()?).await?))
}

/// Platform-wide totals.
pub async fn overview(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let (total_users, active_last_7_days): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users),
            (SELECT COUNT(DISTINCT user_id) FROM attempts
             WHERE submitted_at >= NOW() - INTERVAL '7 days')
        "#,
    )
    .fetch_one(&pool)
    .await?;

    let (q_total, q_mcq, q_short, q_pending): (i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE type = 'MCQ'),
               COUNT(*) FILTER (WHERE type = 'SHORT'),
               COUNT(*) FILTER (WHERE verify_status = 'PENDING')
        FROM questions
        "#,
    )
    .fetch_one(&pool)
    .await?;

    let (a_total, a_correct, a_incorrect, a_users): (i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE is_correct),
               COUNT(*) FILTER (WHERE NOT is_correct),
               COUNT(DISTINCT user_id)
        FROM attempts
        "#,
    )
    .fetch_one(&pool)
    .await?;

    let (short_total, ai_answered, last_generated_at): (i64, i64, Option<DateTime<Utc>>) =
        sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE s.ai_answer IS NOT NULL AND s.ai_answer <> ''),
                   MAX(q.created_at)
            FROM short_answer_questions s
            JOIN questions q ON q.id = s.question_id
            "#,
        )
        .fetch_one(&pool)
        .await?;

    Ok(Json(OverviewResponse {
        users: UserTotals {
            total: total_users,
            active_last_7_days,
            with_attempts: a_users,
        },
        questions: QuestionTotals {
            total: q_total,
            mcq: q_mcq,
            short: q_short,
            pending_review: q_pending,
        },
        attempts: AttemptStats {
            total: a_total,
            correct: a_correct,
            incorrect: a_incorrect,
            unique_users: a_users,
        },
        ai_usage: AiTotals {
            short_answer_total: short_total,
            ai_answered,
            last_generated_at,
        },
        generated_at: Utc::now(),
    }))
}

/// Most active contributors.
pub async fn user_activity(
    State(pool): State<PgPool>,
    Query(params): Query<UserActivityParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = clamp_activity_limit(params.limit);

    let results = sqlx::query_as::<_, UserActivityRow>(
        r#"
        SELECT u.id AS user_id,
               u.email,
               u.username AS display_name,
               COALESCE(qs.total, 0) AS total_questions,
               COALESCE(ats.total, 0) AS total_attempts,
               GREATEST(qs.last_question, ats.last_attempt) AS last_activity
        FROM users u
        LEFT JOIN (
            SELECT creator_id, COUNT(*) AS total, MAX(created_at) AS last_question
            FROM questions GROUP BY creator_id
        ) qs ON qs.creator_id = u.id
        LEFT JOIN (
            SELECT user_id, COUNT(*) AS total, MAX(submitted_at) AS last_attempt
            FROM attempts GROUP BY user_id
        ) ats ON ats.user_id = u.id
        WHERE COALESCE(qs.total, 0) > 0 OR COALESCE(ats.total, 0) > 0
        ORDER BY total_attempts DESC, total_questions DESC, last_activity DESC NULLS LAST
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(&pool)
    .await?;

    Ok(Json(UserActivityResponse {
        limit,
        count: results.len(),
        results,
    }))
}

/// Explanation generation statistics, including fallback sentinels.
pub async fn ai_usage(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let failure_pattern = format!("{}%", AI_FAILURE_PREFIX);

    let (short_answers, ai_populated, fallback_messages, average_length, last_generated_at): (
        i64,
        i64,
        i64,
        Option<f64>,
        Option<DateTime<Utc>>,
    ) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE s.ai_answer IS NOT NULL AND s.ai_answer <> ''),
               COUNT(*) FILTER (WHERE s.ai_answer LIKE $1),
               (AVG(LENGTH(s.ai_answer)) FILTER (WHERE s.ai_answer IS NOT NULL AND s.ai_answer <> ''))::FLOAT8,
               MAX(q.created_at) FILTER (WHERE s.ai_answer IS NOT NULL AND s.ai_answer <> '')
        FROM short_answer_questions s
        JOIN questions q ON q.id = s.question_id
        "#,
    )
    .bind(&failure_pattern)
    .fetch_one(&pool)
    .await?;

    let recent_examples = sqlx::query_as::<_, AiExample>(
        r#"
        SELECT q.id AS question_id,
               LEFT(q.question, 140) AS question_text,
               u.email AS creator_email,
               q.created_at
        FROM short_answer_questions s
        JOIN questions q ON q.id = s.question_id
        JOIN users u ON u.id = q.creator_id
        WHERE s.ai_answer IS NOT NULL AND s.ai_answer <> ''
        ORDER BY q.created_at DESC
        LIMIT 10
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(AiUsageResponse {
        totals: AiUsageTotals {
            short_answers,
            ai_populated,
            fallback_messages,
        },
        performance: AiPerformance {
            ai_success_rate: success_rate(short_answers, ai_populated, fallback_messages),
            average_ai_answer_length: average_length,
            last_generated_at,
        },
        recent_examples,
    }))
}

/// Share of short answers holding a real explanation; sentinels count as failures.
fn success_rate(total: i64, populated: i64, fallbacks: i64) -> Option<f64> {
    (total > 0).then(|| (populated - fallbacks).max(0) as f64 / total as f64)
}
