// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{config::Config, services::explanation::ExplanationGenerator};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    /// Writes explanations for short-answer questions.
    pub explainer: Arc<dyn ExplanationGenerator>,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn ExplanationGenerator> {
    fn from_ref(state: &AppState) -> Self {
        state.explainer.clone()
    }
}
