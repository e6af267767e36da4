use crate::domain::{Comment, CommentId, PullRequestInfo};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref PR_URL_RE: Regex =
        Regex::new(r"^https?://(?:www\.)?github\.com/([^/\s]+)/([^/\s]+)/pull/(\d+)")
            .expect("pull request url regex");
    static ref OWNER_REPO_NUM_RE: Regex =
        Regex::new(r"^([^/\s]+)/([^#\s]+)#(\d+)$").expect("owner/repo#num regex");
    static ref OWNER_REPO_RE: Regex =
        Regex::new(r"^([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)$").expect("owner/repo regex");
}

/// A pull request on the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrRef {
    pub owner: String,
    pub repo: String,
    pub number: u32,
}

impl PrRef {
    /// Build from an `owner/repo` slug and a PR number.
    pub fn new(slug: &str, number: u32) -> Result<Self> {
        let caps = OWNER_REPO_RE
            .captures(slug.trim())
            .ok_or_else(|| anyhow!("repository must look like owner/repo, got `{slug}`"))?;
        Ok(Self {
            owner: caps[1].to_string(),
            repo: caps[2].to_string(),
            number,
        })
    }

    /// Parse a PR URL or an `owner/repo#number` reference.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let caps = PR_URL_RE
            .captures(trimmed)
            .or_else(|| OWNER_REPO_NUM_RE.captures(trimmed))?;
        Some(Self {
            owner: caps.get(1)?.as_str().to_string(),
            repo: caps.get(2)?.as_str().to_string(),
            number: caps.get(3)?.as_str().parse().ok()?,
        })
    }

    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn url(&self) -> String {
        format!(
            "https://github.com/{}/{}/pull/{}",
            self.owner, self.repo, self.number
        )
    }
}

impl fmt::Display for PrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Comments of a pull request, plus a note for every record that could not
/// be turned into a [`Comment`].
#[derive(Debug, Clone, Default)]
pub struct FetchedComments {
    pub comments: Vec<Comment>,
    pub warnings: Vec<String>,
}

/// The hosting platform as seen by the workflow: read a PR's comments, post
/// a reply into an existing conversation.
#[async_trait]
pub trait ReviewPlatform: Send + Sync {
    async fn fetch_pull_request(&self, pr: &PrRef) -> Result<PullRequestInfo>;

    async fn fetch_review_comments(&self, pr: &PrRef) -> Result<FetchedComments>;

    /// Post `body` as a reply to `in_reply_to` and return the new comment id.
    async fn submit_reply(&self, pr: &PrRef, in_reply_to: &Comment, body: &str)
    -> Result<CommentId>;
}
