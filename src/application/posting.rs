//! Submitting drafts to the hosting platform.
//!
//! Every submission re-reads the thread from disk right before calling the
//! platform and again right after, so a draft posted by another process in
//! the meantime is not sent a second time.

use crate::domain::{
    CommentId, DraftResponse, ThreadKey, ThreadRecord, WorkflowError, WorkflowResult,
};
use crate::infra::session_store::SessionStore;
use crate::infra::vcs::{PrRef, ReviewPlatform};
use chrono::Utc;

/// Which threads a post run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostTarget {
    Thread(ThreadKey),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    Posted { comment_id: CommentId },
    /// Would be posted; nothing was sent or written
    DryRun,
    AlreadyPosted { comment_id: Option<CommentId> },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostResult {
    pub index: u32,
    pub thread_id: String,
    pub location: String,
    /// Text that was (or would be) posted
    pub content: String,
    pub outcome: PostOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReport {
    pub session_id: String,
    pub dry_run: bool,
    pub results: Vec<PostResult>,
}

impl PostReport {
    fn count(&self, pred: impl Fn(&PostOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn posted(&self) -> usize {
        self.count(|o| matches!(o, PostOutcome::Posted { .. }))
    }

    pub fn pending(&self) -> usize {
        self.count(|o| matches!(o, PostOutcome::DryRun))
    }

    pub fn already_posted(&self) -> usize {
        self.count(|o| matches!(o, PostOutcome::AlreadyPosted { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, PostOutcome::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

pub struct Poster<'a> {
    store: &'a SessionStore,
    platform: &'a dyn ReviewPlatform,
}

impl<'a> Poster<'a> {
    pub fn new(store: &'a SessionStore, platform: &'a dyn ReviewPlatform) -> Self {
        Self { store, platform }
    }

    /// Post the active draft of one thread, or of every thread that has one.
    ///
    /// A single thread fails fast. With [`PostTarget::All`] each thread is
    /// attempted independently and failures are reported per thread.
    pub async fn post(
        &self,
        session_id: &str,
        target: &PostTarget,
        dry_run: bool,
    ) -> WorkflowResult<PostReport> {
        let session = self.store.load(session_id)?;
        let pr = PrRef::new(&session.meta.repo, session.meta.pr_number)
            .map_err(|err| WorkflowError::invalid_state(session_id, "session", err.to_string()))?;
        let mut report = PostReport {
            session_id: session_id.to_string(),
            dry_run,
            results: Vec::new(),
        };

        match target {
            PostTarget::Thread(key) => {
                let record = session.find(key).ok_or_else(|| WorkflowError::ThreadNotFound {
                    session: session_id.to_string(),
                    thread: key.to_string(),
                })?;
                check_postable(session_id, record)?;
                let result = if dry_run {
                    pending(record, PostOutcome::DryRun)
                } else {
                    self.post_one(session_id, &pr, record.index).await?
                };
                report.results.push(result);
            }
            PostTarget::All => {
                let mut any_active = false;
                for record in session.records.iter().filter(|r| !r.drafts.is_empty()) {
                    if record.classification.is_skip() {
                        if record.active_draft().is_some() {
                            log::warn!(
                                "{} in {session_id} is {}, not posting its draft",
                                record.label(),
                                record.classification.label()
                            );
                        }
                        continue;
                    }
                    let Some(draft) = record.active_draft() else {
                        report.results.push(already_posted(record));
                        continue;
                    };
                    any_active = true;
                    if dry_run {
                        report.results.push(pending(record, PostOutcome::DryRun));
                        continue;
                    }
                    let result = match self.post_one(session_id, &pr, record.index).await {
                        Ok(result) => result,
                        Err(WorkflowError::AlreadyPosted { .. }) => {
                            let fresh = self
                                .store
                                .load_thread(session_id, &ThreadKey::Index(record.index))?;
                            already_posted(&fresh)
                        }
                        Err(err) => {
                            log::warn!("{} in {session_id}: {err}", record.label());
                            PostResult {
                                index: record.index,
                                thread_id: record.thread_id().to_string(),
                                location: record.thread.location(),
                                content: draft.content.clone(),
                                outcome: PostOutcome::Failed {
                                    error: err.to_string(),
                                },
                            }
                        }
                    };
                    report.results.push(result);
                }
                if !any_active {
                    return Err(WorkflowError::NothingToPost {
                        session: session_id.to_string(),
                        thread: "any thread".to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    async fn post_one(&self, session_id: &str, pr: &PrRef, index: u32) -> WorkflowResult<PostResult> {
        let key = ThreadKey::Index(index);
        let record = self.store.load_thread(session_id, &key)?;
        check_postable(session_id, &record)?;

        let position = record.drafts.len() - 1;
        let content = record.drafts[position].content.clone();
        let reply_to = record.thread.last_comment().cloned().ok_or_else(|| {
            WorkflowError::invalid_state(session_id, record.label(), "thread has no comments")
        })?;

        log::info!(
            "{} in {session_id}: replying to comment {} on {pr}",
            record.label(),
            reply_to.id
        );
        let comment_id = self
            .platform
            .submit_reply(pr, &reply_to, &content)
            .await
            .map_err(|err| {
                WorkflowError::external(format!("reply to {} in session {session_id}", record.label()), err)
            })?;

        let mut record = self.store.load_thread(session_id, &key)?;
        let unchanged = record.drafts.get(position).is_some_and(|d| !d.posted);
        if unchanged {
            let draft = &mut record.drafts[position];
            draft.content = content.clone();
            draft.mark_posted(comment_id, Utc::now());
        } else {
            log::warn!(
                "{} in {session_id}: draft changed while posting, recording comment {comment_id} as a new posted reply",
                record.label()
            );
            let mut draft = DraftResponse::new(record.thread_id(), content.clone());
            draft.mark_posted(comment_id, Utc::now());
            record.drafts.push(draft);
        }
        self.store.save_thread(session_id, &mut record)?;

        Ok(PostResult {
            index,
            thread_id: record.thread_id().to_string(),
            location: record.thread.location(),
            content,
            outcome: PostOutcome::Posted { comment_id },
        })
    }
}

fn check_postable(session_id: &str, record: &ThreadRecord) -> WorkflowResult<()> {
    if record.classification.is_skip() {
        return Err(WorkflowError::invalid_state(
            session_id,
            record.label(),
            format!("thread is {}", record.classification.label()),
        ));
    }
    match record.drafts.last() {
        None => Err(WorkflowError::NothingToPost {
            session: session_id.to_string(),
            thread: record.label(),
        }),
        Some(draft) if draft.posted => Err(WorkflowError::AlreadyPosted {
            session: session_id.to_string(),
            thread: record.label(),
            comment_id: draft
                .posted_comment_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        }),
        Some(_) => Ok(()),
    }
}

fn pending(record: &ThreadRecord, outcome: PostOutcome) -> PostResult {
    PostResult {
        index: record.index,
        thread_id: record.thread_id().to_string(),
        location: record.thread.location(),
        content: record
            .active_draft()
            .map(|d| d.content.clone())
            .unwrap_or_default(),
        outcome,
    }
}

fn already_posted(record: &ThreadRecord) -> PostResult {
    let latest = record.latest_posted();
    PostResult {
        index: record.index,
        thread_id: record.thread_id().to_string(),
        location: record.thread.location(),
        content: latest.map(|d| d.content.clone()).unwrap_or_default(),
        outcome: PostOutcome::AlreadyPosted {
            comment_id: latest.and_then(|d| d.posted_comment_id),
        },
    }
}
