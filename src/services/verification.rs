// src/services/verification.rs

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Moderation state of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerifyStatus {
    Pending,
    Approved,
    Rejected,
}

impl VerifyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerifyStatus::Pending => "PENDING",
            VerifyStatus::Approved => "APPROVED",
            VerifyStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_reviewed(self) -> bool {
        !matches!(self, VerifyStatus::Pending)
    }
}

impl fmt::Display for VerifyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a text column holding an unknown enum value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl TryFrom<String> for VerifyStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "PENDING" => Ok(VerifyStatus::Pending),
            "APPROVED" => Ok(VerifyStatus::Approved),
            "REJECTED" => Ok(VerifyStatus::Rejected),
            _ => Err(UnknownVariant(value)),
        }
    }
}

/// Action token accepted by the email-gated verify endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyAction {
    Approve,
    Reject,
}

impl VerifyAction {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "APPROVE" => Ok(VerifyAction::Approve),
            "REJECT" => Ok(VerifyAction::Reject),
            _ => Err(AppError::BadRequest("Invalid action".to_string())),
        }
    }

    pub fn target(self) -> VerifyStatus {
        match self {
            VerifyAction::Approve => VerifyStatus::Approved,
            VerifyAction::Reject => VerifyStatus::Rejected,
        }
    }

    /// Past-tense verb for response messages.
    pub fn past_tense(self) -> &'static str {
        match self {
            VerifyAction::Approve => "approved",
            VerifyAction::Reject => "rejected",
        }
    }
}

/// The state a question moves to, with the reason stored alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub status: VerifyStatus,
    pub rejection_reason: Option<String>,
}

/// Simple flow: only pending questions may be verified.
pub fn verify(current: VerifyStatus, action: VerifyAction) -> Result<Transition, AppError> {
    if current.is_reviewed() {
        return Err(AppError::Conflict(format!(
            "Question has already been {}",
            current.as_str().to_lowercase()
        )));
    }
    Ok(Transition {
        status: action.target(),
        rejection_reason: None,
    })
}

/// Review flow: re-entrant; a rejection needs a reason, an approval clears it.
pub fn review(approved: bool, reason: Option<&str>) -> Result<Transition, AppError> {
    if approved {
        return Ok(Transition {
            status: VerifyStatus::Approved,
            rejection_reason: None,
        });
    }

    let reason = reason.map(str::trim).filter(|r| !r.is_empty()).ok_or_else(|| {
        AppError::BadRequest("rejectionReason is required when rejecting a question".to_string())
    })?;

    Ok(Transition {
        status: VerifyStatus::Rejected,
        rejection_reason: Some(reason.to_string()),
    })
}

/// Email allowlist gate; comparison is case-insensitive.
pub fn is_admin_email(email: &str, allowlist: &HashSet<String>) -> bool {
    let email = email.trim().to_lowercase();
    !email.is_empty() && allowlist.contains(&email)
}

/// Allowlisted addresses with no account behind them, sorted. Registration is
/// open, so the first person to sign up with one of these gains admin access.
pub fn unclaimed_admin_emails(allowlist: &HashSet<String>, registered: &[String]) -> Vec<String> {
    let registered: HashSet<String> = registered.iter().map(|e| e.trim().to_lowercase()).collect();
    let mut unclaimed: Vec<String> = allowlist
        .iter()
        .filter(|email| !registered.contains(*email))
        .cloned()
        .collect();
    unclaimed.sort();
    unclaimed
}
