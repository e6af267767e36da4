//! GitHub through the `gh` CLI.
//!
//! Review threads come from GraphQL because only GraphQL exposes thread ids
//! and resolution. Conversation comments and replies go through REST.

use super::traits::{FetchedComments, PrRef, ReviewPlatform};
use crate::domain::{Comment, CommentId, CommentKind, PullRequestInfo};
use crate::infra::shell;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const REVIEW_THREADS_QUERY: &str = r#"
query($owner: String!, $name: String!, $number: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      reviewThreads(first: 100, after: $cursor) {
        pageInfo { hasNextPage endCursor }
        nodes {
          id
          isResolved
          isOutdated
          path
          line
          originalLine
          comments(first: 100) {
            nodes {
              databaseId
              body
              createdAt
              path
              line
              originalLine
              outdated
              author { login __typename }
              replyTo { databaseId }
            }
          }
        }
      }
    }
  }
}
"#;

/// [`ReviewPlatform`] backed by an authenticated `gh` binary.
#[derive(Debug, Clone)]
pub struct GhCli {
    gh_path: PathBuf,
}

impl GhCli {
    pub fn new(gh_path: impl Into<PathBuf>) -> Self {
        Self {
            gh_path: gh_path.into(),
        }
    }

    /// Find `gh` on this machine.
    pub fn locate() -> Result<Self> {
        let path = shell::gh_path()
            .context("resolve `gh` path (install the GitHub CLI or set PRESTO_GH_PATH)")?;
        Ok(Self::new(path))
    }

    async fn run(&self, what: &str, args: &[String], stdin: Option<String>) -> Result<String> {
        log::debug!("running gh {}", args.join(" "));
        let mut child = Command::new(&self.gh_path)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn `gh` for {what}"))?;

        if let Some(payload) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(payload.as_bytes())
                .await
                .context("write payload to gh stdin")?;
        }

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("run `gh` for {what}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("`gh` failed for {what}: {}", stderr.trim()));
        }

        String::from_utf8(output.stdout).with_context(|| format!("decode `gh` stdout for {what}"))
    }

    async fn fetch_review_threads(&self, pr: &PrRef, out: &mut FetchedComments) -> Result<()> {
        let mut cursor: Option<String> = None;
        loop {
            let mut args: Vec<String> = vec![
                "api".into(),
                "graphql".into(),
                "-f".into(),
                format!("query={REVIEW_THREADS_QUERY}"),
                "-f".into(),
                format!("owner={}", pr.owner),
                "-f".into(),
                format!("name={}", pr.repo),
                "-F".into(),
                format!("number={}", pr.number),
            ];
            if let Some(after) = &cursor {
                args.push("-f".into());
                args.push(format!("cursor={after}"));
            }

            let json = self.run("review threads", &args, None).await?;
            let page = parse_review_threads_page(&json)?;
            out.comments.extend(page.comments);
            out.warnings.extend(page.warnings);

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(()),
            }
        }
    }

    async fn fetch_issue_comments(&self, pr: &PrRef, out: &mut FetchedComments) -> Result<()> {
        let args: Vec<String> = vec![
            "api".into(),
            format!("repos/{}/{}/issues/{}/comments", pr.owner, pr.repo, pr.number),
            "--paginate".into(),
        ];
        let json = self.run("conversation comments", &args, None).await?;
        let parsed = parse_issue_comments(&json)?;
        out.comments.extend(parsed.comments);
        out.warnings.extend(parsed.warnings);
        Ok(())
    }

    async fn post_json(&self, what: &str, endpoint: String, payload: serde_json::Value) -> Result<CommentId> {
        let args: Vec<String> = vec![
            "api".into(),
            endpoint,
            "--method".into(),
            "POST".into(),
            "-H".into(),
            "Accept: application/vnd.github+json".into(),
            "--input".into(),
            "-".into(),
        ];
        let json = self.run(what, &args, Some(payload.to_string())).await?;
        let parsed: serde_json::Value =
            serde_json::from_str(&json).context("parse `gh api` response json")?;

        let id = parsed
            .get("id")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| anyhow!("missing comment id in GitHub response"))?;
        if let Some(url) = parsed.get("html_url").and_then(|v| v.as_str()) {
            log::info!("posted comment {id}: {url}");
        }
        Ok(id)
    }
}

#[async_trait]
impl ReviewPlatform for GhCli {
    async fn fetch_pull_request(&self, pr: &PrRef) -> Result<PullRequestInfo> {
        let args: Vec<String> = vec![
            "pr".into(),
            "view".into(),
            pr.url(),
            "--json".into(),
            "number,title,author,url,state".into(),
        ];
        let json = self.run("pull request view", &args, None).await?;
        parse_pr_view(&json)
    }

    async fn fetch_review_comments(&self, pr: &PrRef) -> Result<FetchedComments> {
        let mut out = FetchedComments::default();
        self.fetch_review_threads(pr, &mut out).await?;
        self.fetch_issue_comments(pr, &mut out).await?;
        for warning in &out.warnings {
            log::warn!("{pr}: {warning}");
        }
        Ok(out)
    }

    async fn submit_reply(&self, pr: &PrRef, in_reply_to: &Comment, body: &str) -> Result<CommentId> {
        match in_reply_to.kind {
            CommentKind::Review => {
                let endpoint = format!("repos/{}/{}/pulls/{}/comments", pr.owner, pr.repo, pr.number);
                let payload = serde_json::json!({
                    "body": body,
                    "in_reply_to": in_reply_to.id,
                });
                self.post_json("review reply", endpoint, payload).await
            }
            // Conversation comments have no reply relation; post a new one.
            CommentKind::General => {
                let endpoint = format!("repos/{}/{}/issues/{}/comments", pr.owner, pr.repo, pr.number);
                let payload = serde_json::json!({ "body": body });
                self.post_json("conversation reply", endpoint, payload).await
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GhPrViewJson {
    number: u32,
    title: String,
    #[serde(default)]
    author: Option<GhLogin>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhLogin {
    login: String,
}

fn parse_pr_view(json: &str) -> Result<PullRequestInfo> {
    let parsed: GhPrViewJson = serde_json::from_str(json).context("parse `gh pr view` json")?;
    Ok(PullRequestInfo {
        number: parsed.number,
        title: parsed.title,
        author: parsed.author.map(|a| a.login).unwrap_or_default(),
        url: parsed.url,
        state: parsed.state,
    })
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<GraphQlData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlData {
    repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    pull_request: Option<PullRequestNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestNode {
    review_threads: Connection<ThreadNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<T> {
    #[serde(default)]
    page_info: Option<PageInfo>,
    #[serde(default = "Vec::new")]
    nodes: Vec<Option<T>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadNode {
    id: String,
    #[serde(default)]
    is_resolved: bool,
    #[serde(default)]
    is_outdated: bool,
    path: Option<String>,
    line: Option<u32>,
    original_line: Option<u32>,
    comments: Connection<ThreadCommentNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadCommentNode {
    database_id: Option<CommentId>,
    body: Option<String>,
    created_at: Option<String>,
    path: Option<String>,
    line: Option<u32>,
    original_line: Option<u32>,
    #[serde(default)]
    outdated: bool,
    author: Option<AuthorNode>,
    reply_to: Option<ReplyToNode>,
}

#[derive(Debug, Deserialize)]
struct AuthorNode {
    login: String,
    #[serde(rename = "__typename", default)]
    typename: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyToNode {
    database_id: Option<CommentId>,
}

#[derive(Debug, Default)]
struct ThreadsPage {
    comments: Vec<Comment>,
    warnings: Vec<String>,
    next_cursor: Option<String>,
}

fn parse_review_threads_page(json: &str) -> Result<ThreadsPage> {
    let response: GraphQlResponse =
        serde_json::from_str(json).context("parse review threads json")?;
    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(anyhow!("GraphQL errors: {}", messages.join("; ")));
    }
    let threads = response
        .data
        .and_then(|d| d.repository)
        .and_then(|r| r.pull_request)
        .ok_or_else(|| anyhow!("pull request not found in GraphQL response"))?
        .review_threads;

    let mut page = ThreadsPage {
        next_cursor: threads
            .page_info
            .filter(|p| p.has_next_page)
            .and_then(|p| p.end_cursor),
        ..ThreadsPage::default()
    };

    for thread in threads.nodes.into_iter().flatten() {
        let truncated = thread
            .comments
            .page_info
            .as_ref()
            .is_some_and(|p| p.has_next_page);
        if truncated {
            page.warnings.push(format!(
                "review thread {} has more than 100 comments, later ones were not fetched",
                thread.id
            ));
        }
        for (position, node) in thread.comments.nodes.iter().enumerate() {
            let Some(node) = node else {
                page.warnings
                    .push(format!("review thread {}: empty comment #{position}", thread.id));
                continue;
            };
            match review_comment(&thread, node) {
                Ok(comment) => page.comments.push(comment),
                Err(reason) => page
                    .warnings
                    .push(format!("review thread {}: skipped comment #{position}: {reason}", thread.id)),
            }
        }
    }
    Ok(page)
}

fn review_comment(thread: &ThreadNode, node: &ThreadCommentNode) -> Result<Comment, String> {
    let id = node.database_id.ok_or("missing databaseId")?;
    let created_at = parse_timestamp(node.created_at.as_deref()).ok_or("missing or invalid createdAt")?;
    let (author, author_is_bot) = match &node.author {
        Some(a) => (a.login.clone(), a.typename.as_deref() == Some("Bot")),
        // Deleted accounts come back as a null author.
        None => ("ghost".to_string(), false),
    };

    Ok(Comment {
        id,
        author,
        author_is_bot,
        body: node.body.clone().unwrap_or_default(),
        file_path: node.path.clone().or_else(|| thread.path.clone()),
        line: node
            .line
            .or(node.original_line)
            .or(thread.line)
            .or(thread.original_line),
        created_at,
        reply_to_id: node.reply_to.as_ref().and_then(|r| r.database_id),
        thread_id: Some(thread.id.clone()),
        resolved: thread.is_resolved,
        is_outdated: node.outdated || thread.is_outdated,
        kind: CommentKind::Review,
    })
}

#[derive(Debug, Deserialize)]
struct IssueCommentJson {
    id: Option<CommentId>,
    body: Option<String>,
    created_at: Option<String>,
    user: Option<IssueUserJson>,
}

#[derive(Debug, Deserialize)]
struct IssueUserJson {
    login: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// `gh api --paginate` prints one JSON array per page back to back.
fn parse_issue_comments(json: &str) -> Result<FetchedComments> {
    let mut out = FetchedComments::default();
    let pages = serde_json::Deserializer::from_str(json).into_iter::<Vec<serde_json::Value>>();
    for page in pages {
        let page = page.context("parse conversation comments json")?;
        for value in page {
            let record: IssueCommentJson = match serde_json::from_value(value) {
                Ok(record) => record,
                Err(err) => {
                    out.warnings.push(format!("skipped conversation comment: {err}"));
                    continue;
                }
            };
            match issue_comment(record) {
                Ok(comment) => out.comments.push(comment),
                Err(reason) => out
                    .warnings
                    .push(format!("skipped conversation comment: {reason}")),
            }
        }
    }
    Ok(out)
}

fn issue_comment(record: IssueCommentJson) -> Result<Comment, String> {
    let id = record.id.ok_or("missing id")?;
    let created_at = parse_timestamp(record.created_at.as_deref())
        .ok_or_else(|| format!("comment {id}: missing or invalid created_at"))?;
    let (author, author_is_bot) = match record.user {
        Some(user) => {
            let is_bot = user.kind.as_deref() == Some("Bot");
            (user.login, is_bot)
        }
        None => ("ghost".to_string(), false),
    };
    Ok(Comment {
        id,
        author,
        author_is_bot,
        body: record.body.unwrap_or_default(),
        file_path: None,
        line: None,
        created_at,
        reply_to_id: None,
        thread_id: None,
        resolved: false,
        is_outdated: false,
        kind: CommentKind::General,
    })
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
