use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a comment on the hosting platform.
pub type CommentId = u64;

/// Where a comment lives on the pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    /// Inline comment on the diff (part of a review thread)
    #[default]
    Review,
    /// Top-level conversation comment on the PR
    General,
}

impl fmt::Display for CommentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Review => write!(f, "review"),
            Self::General => write!(f, "general"),
        }
    }
}

/// A single comment as reported by the hosting platform. Never mutated after
/// fetching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub author: String,
    /// Platform reports the author as an automation account
    #[serde(default)]
    pub author_is_bot: bool,
    pub body: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reply_to_id: Option<CommentId>,
    /// Native conversation id, when the platform exposes one
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub is_outdated: bool,
    #[serde(default)]
    pub kind: CommentKind,
}

impl Comment {
    /// First line of the body, used for topics and listings.
    pub fn headline(&self) -> &str {
        self.body.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("")
    }

    pub fn location(&self) -> String {
        match (&self.file_path, self.line) {
            (Some(path), Some(line)) => format!("{path}:{line}"),
            (Some(path), None) => path.clone(),
            _ => "conversation".to_string(),
        }
    }
}

/// Basic facts about the pull request the comments belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PullRequestInfo {
    pub number: u32,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}
