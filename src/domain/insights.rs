//! Priority and complexity hints derived from a thread's root comment, and
//! PR-wide counts that point at comments likely to need an answer.

use super::comment::{Comment, CommentKind};
use super::thread::Thread;
use serde::{Deserialize, Serialize};
use std::fmt;

const HIGH_PRIORITY: &[&str] = &[
    "critical", "urgent", "security", "bug", "error", "broken", "failing",
];
const MEDIUM_PRIORITY: &[&str] = &["question", "?", "concern", "issue", "problem", "unclear"];
const FEEDBACK_REQUEST: &[&str] = &["review", "feedback", "thoughts", "opinion"];
const CONCERN: &[&str] = &[
    "concern", "issue", "problem", "bug", "error", "missing", "not found",
];
/// More comments than this suggests an ongoing discussion.
const DISCUSSION_THRESHOLD: usize = 3;

/// Three-step scale shared by priority and complexity hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    #[default]
    Low,
    Medium,
    High,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Triage hints derived from the root comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ThreadInsights {
    pub priority: Level,
    pub complexity: Level,
}

impl ThreadInsights {
    pub fn assess(thread: &Thread) -> Self {
        let body = thread.root().map(|c| c.body.as_str()).unwrap_or("");
        Self {
            priority: priority(body),
            complexity: complexity(body),
        }
    }
}

pub fn priority(body: &str) -> Level {
    let body = body.to_lowercase();
    if HIGH_PRIORITY.iter().any(|k| body.contains(k)) {
        Level::High
    } else if MEDIUM_PRIORITY.iter().any(|k| body.contains(k)) {
        Level::Medium
    } else {
        Level::Low
    }
}

pub fn complexity(body: &str) -> Level {
    let fences = body.matches("```").count();
    let len = body.chars().count();
    if len > 500 || fences > 2 {
        Level::High
    } else if len > 200 || fences > 0 {
        Level::Medium
    } else {
        Level::Low
    }
}

/// Keyword counts over every comment of a PR, bots and skipped threads
/// included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResponseSignals {
    pub general: usize,
    pub review: usize,
    pub questions: usize,
    pub feedback_requests: usize,
    pub concerns: usize,
}

impl ResponseSignals {
    pub fn tally<'a>(comments: impl IntoIterator<Item = &'a Comment>) -> Self {
        let mut signals = Self::default();
        for comment in comments {
            match comment.kind {
                CommentKind::General => signals.general += 1,
                CommentKind::Review => signals.review += 1,
            }
            let body = comment.body.to_lowercase();
            if body.contains('?') {
                signals.questions += 1;
            }
            if FEEDBACK_REQUEST.iter().any(|k| body.contains(k)) {
                signals.feedback_requests += 1;
            }
            if CONCERN.iter().any(|k| body.contains(k)) {
                signals.concerns += 1;
            }
        }
        signals
    }

    pub fn total(&self) -> usize {
        self.general + self.review
    }

    /// Human-readable hints, one per line of output.
    pub fn suggestions(&self) -> Vec<String> {
        if self.total() == 0 {
            return vec!["No comments to respond to yet.".to_string()];
        }
        let mut lines = vec![format!(
            "Total comments: {} general + {} review = {} total",
            self.general,
            self.review,
            self.total()
        )];
        if self.questions > 0 {
            lines.push(format!(
                "Found {} comment(s) with questions that may need answers.",
                self.questions
            ));
        }
        if self.feedback_requests > 0 {
            lines.push(format!(
                "Found {} comment(s) requesting review or feedback.",
                self.feedback_requests
            ));
        }
        if self.concerns > 0 {
            lines.push(format!(
                "Found {} comment(s) mentioning concerns or issues.",
                self.concerns
            ));
        }
        if self.total() > DISCUSSION_THRESHOLD {
            lines.push("Multiple comments found - check for ongoing discussions.".to_string());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn comment(kind: CommentKind, body: &str) -> Comment {
        Comment {
            id: 1,
            author: "alice".into(),
            author_is_bot: false,
            body: body.into(),
            file_path: None,
            line: None,
            created_at: Utc::now(),
            reply_to_id: None,
            thread_id: None,
            resolved: false,
            is_outdated: false,
            kind,
        }
    }

    #[test]
    fn priority_keywords() {
        assert_eq!(priority("This is a Security hole"), Level::High);
        assert_eq!(priority("Is this needed?"), Level::Medium);
        assert_eq!(priority("rename to foo"), Level::Low);
    }

    #[test]
    fn complexity_by_size_and_code() {
        assert_eq!(complexity("short"), Level::Low);
        assert_eq!(complexity("```rust\nlet x = 1;\n```"), Level::Medium);
        assert_eq!(complexity(&"x".repeat(501)), Level::High);
        assert_eq!(complexity("```a``` ```b```"), Level::High);
    }

    #[test]
    fn signals_count_keywords_per_comment() {
        let comments = [
            comment(CommentKind::Review, "Is this missing a bounds check?"),
            comment(CommentKind::Review, "Would like your thoughts on the Error type"),
            comment(CommentKind::General, "Thanks, LGTM"),
        ];
        let signals = ResponseSignals::tally(&comments);
        assert_eq!(
            signals,
            ResponseSignals {
                general: 1,
                review: 2,
                questions: 1,
                feedback_requests: 1,
                concerns: 2,
            }
        );
        assert_eq!(
            signals.suggestions(),
            vec![
                "Total comments: 1 general + 2 review = 3 total",
                "Found 1 comment(s) with questions that may need answers.",
                "Found 1 comment(s) requesting review or feedback.",
                "Found 2 comment(s) mentioning concerns or issues.",
            ]
        );
    }

    #[test]
    fn busy_pr_and_empty_pr() {
        let many: Vec<_> = (0..4).map(|_| comment(CommentKind::General, "ok")).collect();
        let lines = ResponseSignals::tally(&many).suggestions();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("Multiple comments found"));

        let none: [Comment; 0] = [];
        assert_eq!(
            ResponseSignals::tally(&none).suggestions(),
            vec!["No comments to respond to yet."]
        );
    }
}
