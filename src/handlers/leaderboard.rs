// src/handlers/leaderboard.rs

use std::collections::{HashMap, HashSet};

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    config::Config,
    error::AppError,
    models::leaderboard::{AroundResponse, LeaderboardParams, MyLeaderboardResponse},
    services::leaderboard::{
        ActivityKind, ActivitySignal, AttemptTotals, LeaderboardFilter, LeaderboardRow,
        ScoringConfig, Standing, compute_rows, paginate, standing,
    },
    utils::jwt::Claims,
};

/// Per-user count query for one activity kind.
fn activity_count_sql(kind: ActivityKind) -> &'static str {
    match kind {
        ActivityKind::Comment => "SELECT author_id, COUNT(*) FROM comments GROUP BY author_id",
        ActivityKind::Rating => "SELECT user_id, COUNT(*) FROM question_ratings GROUP BY user_id",
        ActivityKind::Like => "SELECT user_id, COUNT(*) FROM comment_likes GROUP BY user_id",
    }
}

async fn attempt_totals(
    pool: &PgPool,
    filter: &LeaderboardFilter,
) -> Result<Vec<AttemptTotals>, AppError> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        r#"
        SELECT a.user_id,
               COUNT(*) AS attempts,
               COUNT(*) FILTER (WHERE a.is_correct) AS correct,
               MAX(a.submitted_at) AS last_activity
        FROM attempts a
        JOIN questions q ON q.id = a.question_id
        WHERE 1 = 1
        "#,
    );

    if !filter.weeks.is_empty() {
        qb.push(" AND q.week = ANY(")
            .push_bind(filter.weeks.clone())
            .push(")");
    }
    if let Some(topic) = &filter.topic {
        qb.push(" AND LOWER(q.topic) = LOWER(")
            .push_bind(topic.clone())
            .push(")");
    }
    if let Some(from) = filter.from {
        qb.push(" AND (a.submitted_at AT TIME ZONE 'UTC')::date >= ")
            .push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND (a.submitted_at AT TIME ZONE 'UTC')::date <= ")
            .push_bind(to);
    }
    qb.push(" GROUP BY a.user_id");

    qb.build_query_as::<AttemptTotals>()
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to aggregate attempts: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })
}

async fn activity_signals(
    pool: &PgPool,
    scoring: &ScoringConfig,
) -> Result<Vec<ActivitySignal>, AppError> {
    let active: Vec<(ActivityKind, i64)> = scoring.active_weights().collect();
    let mut signals = Vec::with_capacity(active.len());

    for (kind, weight) in active {
        let counts: HashMap<i64, i64> = sqlx::query_as::<_, (i64, i64)>(activity_count_sql(kind))
            .fetch_all(pool)
            .await?
            .into_iter()
            .collect();
        signals.push(ActivitySignal { weight, counts });
    }

    Ok(signals)
}

/// Computes the full ranked board for a filter.
async fn build_board(
    pool: &PgPool,
    filter: &LeaderboardFilter,
    scoring: &ScoringConfig,
) -> Result<Vec<LeaderboardRow>, AppError> {
    let totals = attempt_totals(pool, filter).await?;
    let signals = activity_signals(pool, scoring).await?;

    let user_ids: Vec<i64> = totals
        .iter()
        .map(|t| t.user_id)
        .chain(signals.iter().flat_map(|s| s.counts.keys().copied()))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let usernames: HashMap<i64, String> =
        sqlx::query_as::<_, (i64, String)>("SELECT id, username FROM users WHERE id = ANY($1)")
            .bind(&user_ids)
            .fetch_all(pool)
            .await?
            .into_iter()
            .collect();

    Ok(compute_rows(totals, &signals, &usernames, scoring))
}

async fn caller_standing(
    pool: &PgPool,
    config: &Config,
    claims: &Claims,
    params: &LeaderboardParams,
) -> Result<Standing, AppError> {
    let user_id = claims.user_id()?;
    let rows = build_board(pool, &params.filter(), &config.scoring).await?;

    let username: String = sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(standing(&rows, user_id, &username))
}

/// One page of the ranked leaderboard.
pub async fn leaderboard(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, AppError> {
    let rows = build_board(&pool, &params.filter(), &config.scoring).await?;
    Ok(Json(paginate(&rows, params.page, params.page_size)))
}

/// The caller's row plus the number of ranked users.
pub async fn my_rank(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, AppError> {
    let standing = caller_standing(&pool, &config, &claims, &params).await?;
    Ok(Json(MyLeaderboardResponse {
        me: standing.me,
        total_users: standing.total_users,
    }))
}

/// The caller's row with up to three neighbours either side.
pub async fn around_me(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, AppError> {
    let standing = caller_standing(&pool, &config, &claims, &params).await?;
    Ok(Json(AroundResponse {
        me: standing.me,
        around: standing.around,
    }))
}
