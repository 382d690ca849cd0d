// src/models/comment.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// A comment joined with its author and like information.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub question_id: Uuid,
    pub author_id: i64,
    pub author: String,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub likes_count: i64,
    /// UI helper: whether the current user has liked this comment.
    pub liked_by_me: bool,
}

/// A root comment with its replies (one level only).
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: CommentResponse,
    pub replies: Vec<CommentResponse>,
}

/// DTO for creating a comment or a reply.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub content: String,
}

/// Groups a flat, chronologically ordered list into threads.
///
/// Roots keep their input order and replies stay oldest first. Replies whose
/// parent is not in the list are dropped.
pub fn into_threads(comments: Vec<CommentResponse>) -> Vec<CommentThread> {
    let (roots, replies): (Vec<_>, Vec<_>) =
        comments.into_iter().partition(|c| c.parent_id.is_none());

    let mut by_parent: HashMap<Uuid, Vec<CommentResponse>> = HashMap::new();
    for reply in replies {
        if let Some(parent) = reply.parent_id {
            by_parent.entry(parent).or_default().push(reply);
        }
    }

    roots
        .into_iter()
        .map(|comment| CommentThread {
            replies: by_parent.remove(&comment.id).unwrap_or_default(),
            comment,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn comment(id: Uuid, parent: Option<Uuid>, minute: u32) -> CommentResponse {
        CommentResponse {
            id,
            question_id: Uuid::nil(),
            author_id: 1,
            author: "alice".to_string(),
            parent_id: parent,
            content: format!("c{}", minute),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, minute, 0).unwrap(),
            likes_count: 0,
            liked_by_me: false,
        }
    }

    #[test]
    fn replies_nest_under_their_root() {
        let root_a = Uuid::new_v4();
        let root_b = Uuid::new_v4();
        let reply_1 = Uuid::new_v4();
        let reply_2 = Uuid::new_v4();

        let threads = into_threads(vec![
            comment(root_a, None, 0),
            comment(reply_1, Some(root_a), 1),
            comment(root_b, None, 2),
            comment(reply_2, Some(root_a), 3),
        ]);

        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].comment.id, root_a);
        let reply_ids: Vec<Uuid> = threads[0].replies.iter().map(|r| r.id).collect();
        assert_eq!(reply_ids, vec![reply_1, reply_2]);
        assert!(threads[1].replies.is_empty());
    }

    #[test]
    fn orphaned_replies_are_dropped() {
        let threads = into_threads(vec![comment(Uuid::new_v4(), Some(Uuid::new_v4()), 0)]);
        assert!(threads.is_empty());
    }
}
