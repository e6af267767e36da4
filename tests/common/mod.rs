//! Shared fixtures for integration tests: an in-memory hosting platform and
//! comment builders.

#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use presto::domain::{Comment, CommentId, CommentKind, PullRequestInfo};
use presto::infra::vcs::{FetchedComments, PrRef, ReviewPlatform};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

pub const REPO: &str = "acme/widgets";
pub const PR_AUTHOR: &str = "pat";

pub fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
}

pub fn review(id: CommentId, author: &str, body: &str, path: &str, line: u32, minute: u32) -> Comment {
    Comment {
        id,
        author: author.into(),
        author_is_bot: author.ends_with("[bot]"),
        body: body.into(),
        file_path: Some(path.into()),
        line: Some(line),
        created_at: at(minute),
        reply_to_id: None,
        thread_id: None,
        resolved: false,
        is_outdated: false,
        kind: CommentKind::Review,
    }
}

pub fn general(id: CommentId, author: &str, body: &str, minute: u32) -> Comment {
    Comment {
        file_path: None,
        line: None,
        kind: CommentKind::General,
        ..review(id, author, body, "", 0, minute)
    }
}

pub fn reply_to(mut comment: Comment, parent: CommentId) -> Comment {
    comment.reply_to_id = Some(parent);
    comment
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub in_reply_to: CommentId,
    pub body: String,
    pub posted_id: CommentId,
}

/// Serves a fixed comment list and records every reply it is asked to post.
pub struct FakePlatform {
    pub comments: Vec<Comment>,
    pub warnings: Vec<String>,
    failing_targets: HashSet<CommentId>,
    submissions: Mutex<Vec<Submission>>,
    next_id: AtomicU64,
}

impl FakePlatform {
    pub fn new(comments: Vec<Comment>) -> Self {
        Self {
            comments,
            warnings: Vec::new(),
            failing_targets: HashSet::new(),
            submissions: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(9000),
        }
    }

    /// Replies to this comment fail with a platform error.
    pub fn failing_on(mut self, comment_id: CommentId) -> Self {
        self.failing_targets.insert(comment_id);
        self
    }

    pub fn recover(&mut self, comment_id: CommentId) {
        self.failing_targets.remove(&comment_id);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl ReviewPlatform for FakePlatform {
    async fn fetch_pull_request(&self, pr: &PrRef) -> Result<PullRequestInfo> {
        Ok(PullRequestInfo {
            number: pr.number,
            title: "Add caching layer".into(),
            author: PR_AUTHOR.into(),
            url: Some(pr.url()),
            state: Some("OPEN".into()),
        })
    }

    async fn fetch_review_comments(&self, _pr: &PrRef) -> Result<FetchedComments> {
        Ok(FetchedComments {
            comments: self.comments.clone(),
            warnings: self.warnings.clone(),
        })
    }

    async fn submit_reply(&self, _pr: &PrRef, in_reply_to: &Comment, body: &str) -> Result<CommentId> {
        if self.failing_targets.contains(&in_reply_to.id) {
            return Err(anyhow!("HTTP 502 from api.github.com"));
        }
        let posted_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.submissions.lock().unwrap().push(Submission {
            in_reply_to: in_reply_to.id,
            body: body.to_string(),
            posted_id,
        });
        Ok(posted_id)
    }
}

pub fn pr() -> PrRef {
    PrRef::new(REPO, 18).unwrap()
}
