// src/services/explanation.rs
//
// AI-written explanations for short-answer questions. Generation is a
// non-critical dependency: failures become a sentinel string stored in
// place of the explanation, never an error for the caller.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::{AI_FAILURE_PREFIX, Config};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug)]
pub enum ExplanationError {
    NotConfigured,
    Request(String),
    MalformedResponse,
}

impl fmt::Display for ExplanationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExplanationError::NotConfigured => write!(f, "OPENAI_API_KEY is not configured"),
            ExplanationError::Request(msg) => write!(f, "{}", msg),
            ExplanationError::MalformedResponse => write!(f, "response contained no explanation"),
        }
    }
}

impl std::error::Error for ExplanationError {}

impl From<reqwest::Error> for ExplanationError {
    fn from(err: reqwest::Error) -> Self {
        ExplanationError::Request(err.to_string())
    }
}

#[async_trait]
pub trait ExplanationGenerator: Send + Sync {
    async fn generate(
        &self,
        question: &str,
        reference_answer: &str,
    ) -> Result<String, ExplanationError>;
}

/// Chat-completions client.
pub struct OpenAiExplainer {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl OpenAiExplainer {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
        }
    }
}

fn prompt(question: &str, reference_answer: &str) -> String {
    format!(
        "You are an assistant generating explanations for short-answer questions.\n\
         Question: {}\n\
         Expected answer: {}\n\
         Please provide a clear, short explanation that helps a student understand the answer.",
        question, reference_answer
    )
}

#[async_trait]
impl ExplanationGenerator for OpenAiExplainer {
    async fn generate(
        &self,
        question: &str,
        reference_answer: &str,
    ) -> Result<String, ExplanationError> {
        let api_key = self.api_key.as_deref().ok_or(ExplanationError::NotConfigured)?;

        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt(question, reference_answer) }],
        });

        let response: serde_json::Value = self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response["choices"][0]["message"]["content"]
            .as_str()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(ExplanationError::MalformedResponse)
    }
}

/// Runs the generator under a timeout, substituting the sentinel on failure.
pub async fn explain_or_fallback(
    generator: &dyn ExplanationGenerator,
    question: &str,
    reference_answer: &str,
    timeout: Duration,
) -> String {
    match tokio::time::timeout(timeout, generator.generate(question, reference_answer)).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            tracing::warn!("Explanation generation failed: {}", e);
            format!("{}: {}", AI_FAILURE_PREFIX, e)
        }
        Err(_) => {
            tracing::warn!("Explanation generation timed out after {:?}", timeout);
            format!("{}: timed out after {}s", AI_FAILURE_PREFIX, timeout.as_secs())
        }
    }
}
