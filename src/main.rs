// src/main.rs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use questify::config::Config;
use questify::routes;
use questify::services::explanation::OpenAiExplainer;
use questify::services::verification::unclaimed_admin_emails;
use questify::state::AppState;
use questify::utils::{hash::hash_password, jwt::ADMIN_ROLE};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    if let Err(e) = seed_admin_user(&pool, &config).await {
        tracing::error!("Failed to seed admin user: {:?}", e);
    }

    if config.openai_api_key.is_none() {
        tracing::warn!(
            "OPENAI_API_KEY is not set; short answers will store the fallback explanation"
        );
    }
    if config.admin_emails.is_empty() {
        tracing::warn!("ADMIN_EMAILS is empty; email-gated admin endpoints will reject everyone");
    } else {
        match registered_admin_emails(&pool, &config).await {
            Ok(registered) => {
                for email in unclaimed_admin_emails(&config.admin_emails, &registered) {
                    tracing::warn!(
                        "ADMIN_EMAILS entry {} has no account yet; \
                         whoever registers it first gets admin access",
                        email
                    );
                }
            }
            Err(e) => tracing::error!("Failed to check ADMIN_EMAILS accounts: {:?}", e),
        }
    }

    let state = AppState {
        pool: pool.clone(),
        explainer: Arc::new(OpenAiExplainer::from_config(&config)),
        config: config.clone(),
    };

    let app = routes::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Questify listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listening address");

    axum::serve(listener, app).await.expect("Server error");
}

/// Lowercased emails of existing accounts that appear in ADMIN_EMAILS.
async fn registered_admin_emails(
    pool: &PgPool,
    config: &Config,
) -> Result<Vec<String>, sqlx::Error> {
    let allowlist: Vec<String> = config.admin_emails.iter().cloned().collect();
    sqlx::query_scalar("SELECT LOWER(email) FROM users WHERE LOWER(email) = ANY($1)")
        .bind(&allowlist)
        .fetch_all(pool)
        .await
}

/// Creates the staff account from ADMIN_EMAIL / ADMIN_PASSWORD if it is missing.
async fn seed_admin_user(pool: &PgPool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let email = email.trim().to_lowercase();
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE LOWER(email) = $1)")
                .bind(&email)
                .fetch_one(pool)
                .await?;

        if !exists {
            tracing::info!("Seeding admin user: {}", email);
            let hashed_password = hash_password(password)?;
            let username = email.split('@').next().unwrap_or("admin").to_string();

            sqlx::query(
                "INSERT INTO users (email, username, password, role) VALUES ($1, $2, $3, $4)",
            )
            .bind(&email)
            .bind(&username)
            .bind(&hashed_password)
            .bind(ADMIN_ROLE)
            .execute(pool)
            .await?;
            tracing::info!("Admin user created successfully.");
        }
    }
    Ok(())
}
