use super::comment::CommentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A candidate reply for a thread. Once `posted` is true the record is
/// frozen; a thread keeps every draft it ever had as an append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftResponse {
    pub thread_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub posted: bool,
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub posted_comment_id: Option<CommentId>,
}

impl DraftResponse {
    pub fn new(thread_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            content: content.into(),
            created_at: Utc::now(),
            posted: false,
            posted_at: None,
            posted_comment_id: None,
        }
    }

    pub(crate) fn mark_posted(&mut self, comment_id: CommentId, at: DateTime<Utc>) {
        debug_assert!(!self.posted, "posted drafts are immutable");
        self.posted = true;
        self.posted_at = Some(at);
        self.posted_comment_id = Some(comment_id);
    }
}
