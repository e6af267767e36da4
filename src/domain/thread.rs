use super::comment::Comment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// An ordered conversation built from one or more comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub thread_id: String,
    /// Sorted by creation time, ties broken by comment id
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub file_path: Option<String>,
    /// Line of the root comment
    #[serde(default)]
    pub anchor_line: Option<u32>,
    pub participants: BTreeSet<String>,
    pub resolved: bool,
}

impl Thread {
    pub fn root(&self) -> Option<&Comment> {
        self.comments.first()
    }

    pub fn last_comment(&self) -> Option<&Comment> {
        self.comments.last()
    }

    pub fn is_single_comment(&self) -> bool {
        self.comments.len() == 1
    }

    pub fn location(&self) -> String {
        match (&self.file_path, self.anchor_line) {
            (Some(path), Some(line)) => format!("{path}:{line}"),
            (Some(path), None) => path.clone(),
            _ => "conversation".to_string(),
        }
    }
}

/// Whether a thread still needs an authored reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreadStatus {
    NeedsResponse,
    Skip,
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeedsResponse => write!(f, "NEEDS RESPONSE"),
            Self::Skip => write!(f, "SKIP"),
        }
    }
}

/// Why a thread was skipped. Variant order is the classifier's precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    Resolved,
    BotAuthor,
    TrivialContent,
    AlreadyAnswered,
    /// Set by hand through the `skip` command
    Manual,
}

impl SkipReason {
    pub const ALL: [SkipReason; 5] = [
        SkipReason::Resolved,
        SkipReason::BotAuthor,
        SkipReason::TrivialContent,
        SkipReason::AlreadyAnswered,
        SkipReason::Manual,
    ];

    /// Short token used in filenames and summaries.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::BotAuthor => "bot",
            Self::TrivialContent => "trivial",
            Self::AlreadyAnswered => "answered",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved => write!(f, "resolved"),
            Self::BotAuthor => write!(f, "bot author"),
            Self::TrivialContent => write!(f, "trivial content"),
            Self::AlreadyAnswered => write!(f, "already answered"),
            Self::Manual => write!(f, "skipped manually"),
        }
    }
}

impl FromStr for SkipReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "resolved" => Ok(Self::Resolved),
            "bot" | "bot_author" => Ok(Self::BotAuthor),
            "trivial" | "trivial_content" => Ok(Self::TrivialContent),
            "answered" | "already_answered" => Ok(Self::AlreadyAnswered),
            "manual" => Ok(Self::Manual),
            other => Err(format!("invalid skip reason: {other}")),
        }
    }
}

/// Classifier verdict for one thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadClassification {
    pub thread_id: String,
    pub status: ThreadStatus,
    #[serde(default)]
    pub skip_reason: Option<SkipReason>,
}

impl ThreadClassification {
    pub fn needs_response(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            status: ThreadStatus::NeedsResponse,
            skip_reason: None,
        }
    }

    pub fn skip(thread_id: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            thread_id: thread_id.into(),
            status: ThreadStatus::Skip,
            skip_reason: Some(reason),
        }
    }

    pub fn is_skip(&self) -> bool {
        self.status == ThreadStatus::Skip
    }

    pub fn label(&self) -> String {
        match self.skip_reason {
            Some(reason) if self.is_skip() => format!("SKIP ({reason})"),
            _ => self.status.to_string(),
        }
    }
}
