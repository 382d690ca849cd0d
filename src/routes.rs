// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, attempts, auth, comments, leaderboard, questions, ratings, saved},
    state::AppState,
    utils::jwt::{admin_email_middleware, admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Every route except register/login requires a valid token.
/// * `/api/admin` splits into an email-allowlist family and a staff family.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
        HeaderValue::from_static("http://localhost:5173"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let question_routes = Router::new()
        .route(
            "/",
            get(questions::list_questions).post(questions::create_question),
        )
        .route("/user", get(questions::user_questions))
        .route("/metadata", get(questions::metadata))
        .route("/recommended", get(questions::recommended))
        .route("/saved-list", get(saved::saved_list))
        .route("/save/{id}", post(saved::toggle_save))
        .route(
            "/{id}",
            get(questions::get_question).delete(questions::delete_question),
        )
        .route(
            "/{id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/{id}/rating",
            get(ratings::get_rating)
                .post(ratings::rate_question)
                .delete(ratings::unrate_question),
        )
        .route("/comments/{id}/reply", post(comments::reply_to_comment))
        .route("/comments/{id}/like", post(comments::like_comment))
        .route("/comments/{id}/unlike", post(comments::unlike_comment));

    let attempt_routes = Router::new()
        .route("/", post(attempts::create_attempt))
        .route("/user", get(attempts::user_attempts))
        .route("/user/activity", get(attempts::activity))
        .route("/user/question/{id}", get(attempts::user_question_attempts))
        .route("/question/{id}", get(attempts::question_attempts));

    let leaderboard_routes = Router::new()
        .route("/", get(leaderboard::leaderboard))
        .route("/me", get(leaderboard::my_rank))
        .route("/me/around", get(leaderboard::around_me));

    // Gated by the ADMIN_EMAILS allowlist.
    let admin_email_routes = Router::new()
        .route("/verify/{id}", post(admin::verify_question))
        .route("/overview", get(admin::overview))
        .route("/user-activity", get(admin::user_activity))
        .route("/ai-usage", get(admin::ai_usage))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_email_middleware,
        ));

    // Gated by the staff role.
    let staff_routes = Router::new()
        .route("/questions/pending", get(admin::pending_questions))
        .route("/questions/{id}/review", put(admin::review_question))
        .route_layer(middleware::from_fn(admin_middleware));

    // Route layers leave the 404 fallback ungated; auth runs before the per-family gate.
    let protected = Router::new()
        .route("/api/me", get(auth::me))
        .nest("/api/questions", question_routes)
        .nest("/api/attempts", attempt_routes)
        .nest("/api/leaderboard", leaderboard_routes)
        .nest("/api/admin", admin_email_routes.merge(staff_routes))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
