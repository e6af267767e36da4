//! Draft bookkeeping for a session's threads.

use crate::domain::{
    DraftResponse, SkipReason, ThreadClassification, ThreadKey, ThreadRecord, WorkflowError,
    WorkflowResult,
};
use crate::infra::session_store::SessionStore;

pub struct DraftManager<'a> {
    store: &'a SessionStore,
}

impl<'a> DraftManager<'a> {
    pub fn new(store: &'a SessionStore) -> Self {
        Self { store }
    }

    /// Add a new unposted draft to a thread. The thread is re-read from disk
    /// first so concurrent edits are not lost.
    pub fn append(
        &self,
        session_id: &str,
        key: &ThreadKey,
        content: &str,
    ) -> WorkflowResult<DraftResponse> {
        let mut record = self.store.load_thread(session_id, key)?;
        if record.classification.is_skip() {
            return Err(WorkflowError::invalid_state(
                session_id,
                record.label(),
                format!(
                    "thread is {}, drafts are not accepted",
                    record.classification.label()
                ),
            ));
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(WorkflowError::invalid_state(
                session_id,
                record.label(),
                "draft content is blank",
            ));
        }

        if let Some(previous) = record.active_draft() {
            log::info!(
                "{} in {session_id}: superseding unposted draft from {}",
                record.label(),
                previous.created_at.to_rfc3339()
            );
        }
        let draft = DraftResponse::new(record.thread_id(), content);
        record.drafts.push(draft.clone());
        self.store.save_thread(session_id, &mut record)?;
        log::info!("{} in {session_id}: draft appended", record.label());
        Ok(draft)
    }

    /// Mark a thread as not needing a reply. Draft history is kept.
    pub fn skip(
        &self,
        session_id: &str,
        key: &ThreadKey,
        reason: SkipReason,
    ) -> WorkflowResult<ThreadRecord> {
        let mut record = self.store.load_thread(session_id, key)?;
        if record.classification.skip_reason == Some(reason) {
            return Ok(record);
        }
        if record.active_draft().is_some() {
            log::warn!(
                "{} in {session_id}: skipping a thread with an unposted draft",
                record.label()
            );
        }
        record.classification = ThreadClassification::skip(record.thread_id(), reason);
        self.store.save_thread(session_id, &mut record)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Comment, CommentKind, PullRequestInfo, Thread};
    use chrono::Utc;
    use tempfile::TempDir;

    fn seeded(tmp: &TempDir) -> (SessionStore, String) {
        let store = SessionStore::new(tmp.path());
        let comment = Comment {
            id: 5,
            author: "alice".into(),
            author_is_bot: false,
            body: "Why not reuse the pool here?".into(),
            file_path: Some("src/db.rs".into()),
            line: Some(7),
            created_at: Utc::now(),
            reply_to_id: None,
            thread_id: Some("PRRT_5".into()),
            resolved: false,
            is_outdated: false,
            kind: CommentKind::Review,
        };
        let thread = Thread {
            thread_id: "PRRT_5".into(),
            participants: ["alice".to_string()].into_iter().collect(),
            file_path: comment.file_path.clone(),
            anchor_line: comment.line,
            resolved: false,
            comments: vec![comment],
        };
        let pr = PullRequestInfo {
            number: 3,
            title: "Pool".into(),
            author: "pat".into(),
            ..PullRequestInfo::default()
        };
        let session = store
            .create(
                "acme/db",
                &pr,
                vec![thread],
                vec![ThreadClassification::needs_response("PRRT_5")],
            )
            .unwrap();
        let id = session.id().to_string();
        (store, id)
    }

    #[test]
    fn append_keeps_history() {
        let tmp = TempDir::new().unwrap();
        let (store, id) = seeded(&tmp);
        let drafts = DraftManager::new(&store);

        drafts.append(&id, &ThreadKey::Index(1), "first").unwrap();
        drafts
            .append(&id, &ThreadKey::Id("PRRT_5".into()), "  second\n")
            .unwrap();

        let record = store.load_thread(&id, &ThreadKey::Index(1)).unwrap();
        let contents: Vec<_> = record.drafts.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert_eq!(record.active_draft().unwrap().content, "second");
    }

    #[test]
    fn blank_content_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let (store, id) = seeded(&tmp);
        let err = DraftManager::new(&store)
            .append(&id, &ThreadKey::Index(1), " \n\t")
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidState { .. }));
    }

    #[test]
    fn skipped_thread_rejects_drafts() {
        let tmp = TempDir::new().unwrap();
        let (store, id) = seeded(&tmp);
        let drafts = DraftManager::new(&store);
        let record = drafts.skip(&id, &ThreadKey::Index(1), SkipReason::Manual).unwrap();
        assert_eq!(record.classification.label(), "SKIP (skipped manually)");

        let err = drafts.append(&id, &ThreadKey::Index(1), "hello").unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidState { .. }));
        assert!(err.to_string().contains(&id));
    }

    #[test]
    fn unknown_thread_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let (store, id) = seeded(&tmp);
        let err = DraftManager::new(&store)
            .append(&id, &ThreadKey::Index(4), "hello")
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ThreadNotFound { .. }));
    }
}
