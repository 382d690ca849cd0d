// src/models/question.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    services::{
        grading::{AnswerKey, OPTION_LABELS, SubmittedAnswer, is_option_label, normalize_labels},
        verification::{UnknownVariant, VerifyStatus},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuestionType {
    Mcq,
    Short,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::Mcq => "MCQ",
            QuestionType::Short => "SHORT",
        }
    }

    /// Case-insensitive; used for request bodies and query strings.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "MCQ" => Some(QuestionType::Mcq),
            "SHORT" => Some(QuestionType::Short),
            _ => None,
        }
    }
}

impl TryFrom<String> for QuestionType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        QuestionType::parse(&value).ok_or(UnknownVariant(value))
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who authored a question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionSource {
    #[default]
    Student,
    TeachingTeam,
}

impl QuestionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionSource::Student => "STUDENT",
            QuestionSource::TeachingTeam => "TEACHING_TEAM",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "STUDENT" => Some(QuestionSource::Student),
            "TEACHING_TEAM" => Some(QuestionSource::TeachingTeam),
            _ => None,
        }
    }
}

impl TryFrom<String> for QuestionSource {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        QuestionSource::parse(&value).ok_or(UnknownVariant(value))
    }
}

/// A row of the 'questions' table joined with the creator's username.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Question {
    pub id: Uuid,

    /// The question text.
    pub question: String,

    #[serde(skip)]
    pub creator_id: i64,

    /// Creator's display name.
    pub creator: String,

    /// Mapped from the column 'type' since `type` is a reserved keyword in Rust.
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub question_type: QuestionType,

    #[sqlx(try_from = "String")]
    pub source: QuestionSource,

    #[sqlx(try_from = "String")]
    pub verify_status: VerifyStatus,

    pub rejection_reason: Option<String>,
    pub week: Option<String>,
    pub topic: Option<String>,

    /// Average score, derived from question_ratings.
    pub rating: f64,
    pub rating_count: i64,
    pub num_attempts: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Columns selected whenever a `Question` is loaded; expects `q` and `u` aliases.
pub const QUESTION_COLUMNS: &str = r#"
    q.id, q.question, q.creator_id, u.username AS creator, q.type, q.source,
    q.verify_status, q.rejection_reason, q.week, q.topic, q.rating,
    q.rating_count, q.num_attempts, q.created_at, q.updated_at
"#;

/// Represents the 'mcq_questions' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct McqDetail {
    #[serde(skip)]
    pub question_id: Uuid,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub option_e: String,
    /// Stored as a JSON array of labels, e.g. ["A", "C"].
    pub correct_options: Json<Vec<String>>,
    pub explanation: Option<String>,
}

/// Represents the 'short_answer_questions' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ShortDetail {
    #[serde(skip)]
    pub question_id: Uuid,
    /// Reference answer written by the creator.
    pub answer: String,
    /// Generated explanation, or the failure sentinel.
    pub ai_answer: Option<String>,
}

/// The type-specific half of a question.
#[derive(Debug, Clone)]
pub enum QuestionDetail {
    Mcq(McqDetail),
    Short(ShortDetail),
}

impl QuestionDetail {
    pub fn answer_key(&self) -> AnswerKey {
        match self {
            QuestionDetail::Mcq(detail) => AnswerKey::mcq(&detail.correct_options.0),
            QuestionDetail::Short(_) => AnswerKey::Short,
        }
    }
}

/// DTO for sending a question to the client.
#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    #[serde(flatten)]
    pub question: Question,
    pub mcq_detail: Option<McqDetail>,
    pub short_detail: Option<ShortDetail>,
    /// The caller's own score, when they have rated the question.
    pub user_rating: Option<i16>,
}

impl QuestionResponse {
    pub fn new(
        question: Question,
        detail: Option<QuestionDetail>,
        user_rating: Option<i16>,
    ) -> Self {
        let (mcq_detail, short_detail) = match detail {
            Some(QuestionDetail::Mcq(d)) => (Some(d), None),
            Some(QuestionDetail::Short(d)) => (None, Some(d)),
            None => (None, None),
        };
        Self {
            question,
            mcq_detail,
            short_detail,
            user_rating,
        }
    }
}

/// DTO for creating a new question.
///
/// MCQ questions need all five options plus `correct_options` (a list) or
/// `correct_option` (a single label or a comma list). Short questions need
/// `answer`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 10))]
    pub question_type: String,

    #[validate(length(
        min = 1,
        max = 5000,
        message = "Question text must be between 1 and 5000 characters"
    ))]
    pub question: String,

    #[validate(length(max = 50))]
    pub week: Option<String>,
    #[validate(length(max = 100))]
    pub topic: Option<String>,
    pub source: Option<String>,

    #[validate(length(max = 5000))]
    pub answer: Option<String>,

    #[validate(length(max = 1000))]
    pub option_a: Option<String>,
    #[validate(length(max = 1000))]
    pub option_b: Option<String>,
    #[validate(length(max = 1000))]
    pub option_c: Option<String>,
    #[validate(length(max = 1000))]
    pub option_d: Option<String>,
    #[validate(length(max = 1000))]
    pub option_e: Option<String>,

    pub correct_options: Option<Vec<String>>,
    pub correct_option: Option<String>,
    #[validate(length(max = 5000))]
    pub explanation: Option<String>,
}

/// Type-specific content of a validated question, before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftDetail {
    Mcq {
        options: [String; 5],
        correct_options: Vec<String>,
        explanation: Option<String>,
    },
    Short {
        answer: String,
    },
}

/// A fully validated question ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub question_type: QuestionType,
    pub question: String,
    pub week: Option<String>,
    pub topic: Option<String>,
    pub source: QuestionSource,
    pub detail: DraftDetail,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CreateQuestionRequest {
    /// Cross-field checks the derive cannot express.
    pub fn into_draft(self) -> Result<QuestionDraft, AppError> {
        let question_type = QuestionType::parse(&self.question_type).ok_or_else(|| {
            AppError::BadRequest("type must be either MCQ or SHORT".to_string())
        })?;

        let question = self.question.trim().to_string();
        if question.is_empty() {
            return Err(AppError::BadRequest("question is required".to_string()));
        }

        let source = match non_blank(self.source) {
            Some(raw) => QuestionSource::parse(&raw).ok_or_else(|| {
                AppError::BadRequest("source must be STUDENT or TEACHING_TEAM".to_string())
            })?,
            None => QuestionSource::default(),
        };

        let detail = match question_type {
            QuestionType::Short => {
                let answer = non_blank(self.answer).ok_or_else(|| {
                    AppError::BadRequest("answer is required for SHORT questions".to_string())
                })?;
                DraftDetail::Short { answer }
            }
            QuestionType::Mcq => {
                let raw_options = [
                    self.option_a,
                    self.option_b,
                    self.option_c,
                    self.option_d,
                    self.option_e,
                ];
                let mut options: [String; 5] = Default::default();
                for ((slot, raw), label) in options.iter_mut().zip(raw_options).zip(OPTION_LABELS) {
                    *slot = non_blank(raw).ok_or_else(|| {
                        AppError::BadRequest(format!(
                            "option_{} is required for MCQ questions",
                            label.to_lowercase()
                        ))
                    })?;
                }

                let labels: Vec<String> = match (self.correct_options, self.correct_option) {
                    (Some(list), _) if !list.is_empty() => list,
                    (_, Some(single)) => single.split(',').map(str::to_string).collect(),
                    _ => Vec::new(),
                };
                let correct = normalize_labels(&SubmittedAnswer::Labels(labels));
                if correct.is_empty() {
                    return Err(AppError::BadRequest(
                        "correct_options must contain at least one label".to_string(),
                    ));
                }
                if let Some(bad) = correct.iter().find(|l| !is_option_label(l)) {
                    return Err(AppError::BadRequest(format!(
                        "Invalid correct option '{}'; expected labels A-E",
                        bad
                    )));
                }

                DraftDetail::Mcq {
                    options,
                    correct_options: correct.into_iter().collect(),
                    explanation: non_blank(self.explanation),
                }
            }
        };

        Ok(QuestionDraft {
            question_type,
            question,
            week: non_blank(self.week),
            topic: non_blank(self.topic),
            source,
            detail,
        })
    }
}

/// Query parameters for listing questions.
#[derive(Debug, Default, Deserialize)]
pub struct QuestionListParams {
    pub week: Option<String>,
    pub topic: Option<String>,
    #[serde(rename = "type")]
    pub question_type: Option<String>,
    pub source: Option<String>,
    /// When true, only APPROVED questions are returned.
    pub verified: Option<bool>,
    pub min_rating: Option<f64>,
    /// Case-insensitive search over the question text.
    pub q: Option<String>,
    /// 'newest' (default), 'oldest', 'rating' or 'attempts'.
    pub sort: Option<String>,
    /// Number of items to return (default: 20, max: 100).
    pub limit: Option<i64>,
}

/// Distinct filter values for the question browser.
#[derive(Debug, Serialize)]
pub struct QuestionMetadata {
    pub weeks: Vec<String>,
    pub topics: Vec<String>,
}
