//! Command handlers behind the `presto` binary.
//!
//! Each handler takes its collaborators explicitly and writes its report to
//! `out`, so the binary only parses flags and picks the exit code.

use crate::application::{
    self, Analyzer, DraftManager, PostOutcome, PostReport, PostTarget, Poster,
};
use crate::domain::{CommentId, SkipReason, ThreadKey};
use crate::infra::app_config::AppConfig;
use crate::infra::session_store::{DRAFT_MARKER, SUMMARY_FILE, SessionStore};
use crate::infra::vcs::{PrRef, ReviewPlatform};
use anyhow::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const GUIDE: &str = r#"PRESTO - PR review comment workflow

Presto turns the review comments of a pull request into one file per
conversation thread, tracks which threads still need a reply, and posts
the replies you draft exactly once.

WORKFLOW

1. Analyze
     presto analyze --repo <owner/repo> --pr <number> [--save [--output <file>]]
   Creates pr_<number>_review_<timestamp>/ with:
     session_summary.md                    statistics and thread list
     thread_NN_<author>_<topic>.md         one file per thread
     thread_NN_SKIP-<reason>_<author>...   threads that need no reply
   Threads are skipped when resolved, written only by bots, trivial
   ("LGTM", "+1"), or already answered by the PR author.
   --save also writes every comment, threaded and with ids, to one file.

2. Understand
   Read each NEEDS RESPONSE thread file. The location, priority and
   complexity hints point at what to read in the codebase first.

3. Draft
     presto append --session-dir <dir> --thread <N> --content "<reply>"
   or write the reply below the `<!-- presto:draft -->` line at the end
   of the thread file. Drafting again replaces the pending reply; earlier
   drafts stay in the file's history.

4. Post
     presto post --session-dir <dir> --all --dry-run
     presto post --session-dir <dir> --all
     presto post --session-dir <dir> --thread <N>
   Each reply is posted into its thread on GitHub. Posted replies are
   recorded in the thread file and are never sent twice.

OTHER COMMANDS

  presto skip --session-dir <dir> <N> [--reason manual]
  presto search --repo <owner/repo> --pr <number> --query "<text>"
  presto reply --repo <owner/repo> --pr <number> --comment-id <id> --message "<text>"

Requires an authenticated GitHub CLI (`gh auth login`).
"#;

pub fn guide(out: &mut dyn Write) -> Result<()> {
    out.write_all(GUIDE.as_bytes())?;
    Ok(())
}

/// Where `analyze --save` writes the single-file comment export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentExport {
    /// `<session id>_comments.md` next to the session directory
    Default,
    Path(PathBuf),
}

pub async fn analyze(
    config: &AppConfig,
    platform: &dyn ReviewPlatform,
    pr: &PrRef,
    export: Option<&CommentExport>,
    out: &mut dyn Write,
) -> Result<()> {
    let store = SessionStore::new(config.sessions_root());
    let outcome = Analyzer::new(&store, platform)
        .with_threading(config.threading)
        .with_classifier(config.classifier.clone())
        .analyze(pr)
        .await?;

    let session = &outcome.session;
    let summary = session.summary();
    let dir = store.session_dir(session.id());
    writeln!(out, "Session: {}", session.id())?;
    writeln!(out, "Directory: {}", dir.display())?;
    writeln!(
        out,
        "PR #{} {} by {}",
        session.meta.pr_number, session.meta.pr_title, session.meta.pr_author
    )?;
    writeln!(
        out,
        "Threads: {} total, {} need a response, {} skipped",
        summary.total,
        summary.needs_response,
        summary.skipped_total()
    )?;
    for (reason, count) in &summary.skipped {
        writeln!(out, "  skipped ({reason}): {count}")?;
    }
    for record in session.records.iter().filter(|r| !r.classification.is_skip()) {
        writeln!(
            out,
            "  {:>2}. {} [{} priority] {}",
            record.index,
            record.thread.location(),
            record.insights.priority,
            record.thread.root().map(|c| c.headline()).unwrap_or("")
        )?;
    }
    if !outcome.warnings.is_empty() {
        writeln!(out, "Skipped {} malformed comment record(s):", outcome.warnings.len())?;
        for warning in &outcome.warnings {
            writeln!(out, "  - {warning}")?;
        }
    }
    if let Some(export) = export {
        let output = match export {
            CommentExport::Default => None,
            CommentExport::Path(path) => Some(path.as_path()),
        };
        let path = store.export_comments(session, output)?;
        writeln!(out, "Comments saved to: {}", path.display())?;
    }
    writeln!(out, "Suggestions:")?;
    for line in outcome.signals.suggestions() {
        writeln!(out, "  - {line}")?;
    }
    writeln!(
        out,
        "Next: read {} and the thread files, then draft replies below `{DRAFT_MARKER}`.",
        dir.join(SUMMARY_FILE).display()
    )?;
    Ok(())
}

pub fn append(session_dir: &Path, key: &ThreadKey, content: &str, out: &mut dyn Write) -> Result<()> {
    let (store, session_id) = SessionStore::for_session_dir(session_dir)?;
    let draft = DraftManager::new(&store).append(&session_id, key, content)?;
    writeln!(
        out,
        "Draft saved for {key} ({} chars). Preview with `presto post --session-dir {} --thread <N> --dry-run`.",
        draft.content.chars().count(),
        session_dir.display()
    )?;
    Ok(())
}

pub fn skip(session_dir: &Path, key: &ThreadKey, reason: SkipReason, out: &mut dyn Write) -> Result<()> {
    let (store, session_id) = SessionStore::for_session_dir(session_dir)?;
    let record = DraftManager::new(&store).skip(&session_id, key, reason)?;
    writeln!(out, "{} is now {}", record.label(), record.classification.label())?;
    Ok(())
}

/// How a `post` command ended.
#[derive(Debug)]
pub enum PostRun {
    /// The run went through (or was a dry run); see the report for failures
    Finished(PostReport),
    /// Confirmation was refused with `pending` replies ready to send
    Aborted { pending: usize },
}

impl PostRun {
    /// Whether the caller should exit successfully.
    pub fn succeeded(&self) -> bool {
        match self {
            Self::Finished(report) => !report.has_failures(),
            Self::Aborted { .. } => false,
        }
    }
}

/// Post drafts. Unless `dry_run` is set, `confirm` sees a preview of what
/// would be posted and can abort the run.
pub async fn post(
    session_dir: &Path,
    platform: &dyn ReviewPlatform,
    target: &PostTarget,
    dry_run: bool,
    confirm: &mut dyn FnMut(&PostReport) -> bool,
    out: &mut dyn Write,
) -> Result<PostRun> {
    let (store, session_id) = SessionStore::for_session_dir(session_dir)?;
    let poster = Poster::new(&store, platform);

    let preview = poster.post(&session_id, target, true).await?;
    if dry_run {
        write_report(&preview, out)?;
        return Ok(PostRun::Finished(preview));
    }
    let pending = preview.pending();
    if pending > 0 && !confirm(&preview) {
        writeln!(out, "Aborted, nothing was posted ({pending} repl(ies) pending).")?;
        return Ok(PostRun::Aborted { pending });
    }

    let report = poster.post(&session_id, target, false).await?;
    write_report(&report, out)?;
    Ok(PostRun::Finished(report))
}

pub fn write_report(report: &PostReport, out: &mut dyn Write) -> Result<()> {
    for result in &report.results {
        let status = match &result.outcome {
            PostOutcome::Posted { comment_id } => format!("posted as comment {comment_id}"),
            PostOutcome::DryRun => "would post".to_string(),
            PostOutcome::AlreadyPosted {
                comment_id: Some(id),
            } => format!("already posted as comment {id}"),
            PostOutcome::AlreadyPosted { comment_id: None } => "already posted".to_string(),
            PostOutcome::Failed { error } => format!("FAILED: {error}"),
        };
        writeln!(out, "thread {:02} ({}): {status}", result.index, result.location)?;
        if matches!(result.outcome, PostOutcome::DryRun) {
            for line in result.content.lines() {
                writeln!(out, "    {line}")?;
            }
        }
    }
    if report.dry_run {
        writeln!(
            out,
            "Dry run: {} to post, {} already posted. Nothing was sent.",
            report.pending(),
            report.already_posted()
        )?;
    } else {
        writeln!(
            out,
            "{} posted, {} already posted, {} failed.",
            report.posted(),
            report.already_posted(),
            report.failed()
        )?;
    }
    Ok(())
}

pub async fn search(platform: &dyn ReviewPlatform, pr: &PrRef, query: &str, out: &mut dyn Write) -> Result<()> {
    let hits = application::search::search(platform, pr, query).await?;
    if hits.is_empty() {
        writeln!(out, "No comments matching \"{query}\" on {pr}.")?;
        return Ok(());
    }
    writeln!(out, "{} comment(s) matching \"{query}\" on {pr}:", hits.len())?;
    for comment in &hits {
        writeln!(out)?;
        writeln!(
            out,
            "[{}] {} comment {} by {} at {}",
            comment.created_at.format("%Y-%m-%d %H:%M"),
            comment.kind,
            comment.id,
            comment.author,
            comment.location()
        )?;
        if let Some(parent) = comment.reply_to_id {
            writeln!(out, "  in reply to {parent}")?;
        }
        for line in comment.body.lines() {
            writeln!(out, "  > {line}")?;
        }
    }
    Ok(())
}

pub async fn reply(
    platform: &dyn ReviewPlatform,
    pr: &PrRef,
    comment_id: CommentId,
    message: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let posted = application::search::reply(platform, pr, comment_id, message).await?;
    writeln!(out, "Replied to comment {comment_id} on {pr} as comment {posted}.")?;
    Ok(())
}
