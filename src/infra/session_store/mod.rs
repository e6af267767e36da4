//! File-backed session repository.
//!
//! A session is a directory `pr_<number>_review_<timestamp>/` holding one
//! markdown file per thread and a `session_summary.md`. The files are the
//! only state: every read goes to disk, and every write replaces a file
//! atomically (temp file in the same directory, then rename).

mod export;
mod layout;
mod record;
mod summary;

pub use layout::{SUMMARY_FILE, thread_file_name};
pub use record::DRAFT_MARKER;

use crate::domain::{
    DraftResponse, PullRequestInfo, Session, SessionId, SessionMeta, Thread,
    ThreadClassification, ThreadInsights, ThreadKey, ThreadRecord, WorkflowError,
    WorkflowResult, session_id_for,
};
use anyhow::{Context, anyhow};
use chrono::{Local, Utc};
use record::ParsedThreadFile;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Store whose sessions live directly under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open the store that owns an existing session directory.
    pub fn for_session_dir(dir: &Path) -> WorkflowResult<(Self, SessionId)> {
        let not_found = || WorkflowError::SessionNotFound(dir.display().to_string());
        let dir = dir.canonicalize().map_err(|_| not_found())?;
        if !dir.is_dir() {
            return Err(not_found());
        }
        let session_id = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(not_found)?;
        let root = dir.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok((Self::new(root), session_id))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    /// Create a new session directory and write every thread into it. The
    /// session id is derived from the PR number and the current time and
    /// never changes afterwards.
    pub fn create(
        &self,
        repo: &str,
        pr: &PullRequestInfo,
        threads: Vec<Thread>,
        classifications: Vec<ThreadClassification>,
    ) -> WorkflowResult<Session> {
        let now = Local::now();
        let session_id = session_id_for(pr.number, now);
        let dir = self.session_dir(&session_id);

        fs::create_dir_all(&self.root)
            .with_context(|| format!("create sessions root {}", self.root.display()))?;
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(WorkflowError::invalid_state(
                    &session_id,
                    "session",
                    "session directory already exists",
                ));
            }
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("create session directory {}", dir.display()))
                    .into());
            }
        }

        let mut by_thread: HashMap<String, ThreadClassification> = classifications
            .into_iter()
            .map(|c| (c.thread_id.clone(), c))
            .collect();
        let mut records = Vec::with_capacity(threads.len());
        for (idx, thread) in threads.into_iter().enumerate() {
            let classification = by_thread
                .remove(&thread.thread_id)
                .ok_or_else(|| anyhow!("no classification for thread {}", thread.thread_id))?;
            records.push(ThreadRecord {
                index: idx as u32 + 1,
                insights: ThreadInsights::assess(&thread),
                thread,
                classification,
                drafts: Vec::new(),
                revision: 0,
            });
        }

        let mut session = Session {
            meta: SessionMeta {
                session_id,
                repo: repo.to_string(),
                pr_number: pr.number,
                pr_author: pr.author.clone(),
                pr_title: pr.title.clone(),
                created_at: now.with_timezone(&Utc),
                thread_count: records.len() as u32,
            },
            records,
        };
        self.save(&mut session)?;
        log::info!(
            "created session {} with {} threads",
            session.id(),
            session.records.len()
        );
        Ok(session)
    }

    /// Read a session from disk. Draft text edited by hand below a thread's
    /// draft marker becomes that thread's active draft.
    pub fn load(&self, session_id: &str) -> WorkflowResult<Session> {
        let dir = self.existing_dir(session_id)?;
        let meta = read_meta(&dir, session_id)?;

        let mut latest: BTreeMap<u32, ParsedThreadFile> = BTreeMap::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("list {}", dir.display()))? {
            let entry = entry.with_context(|| format!("list {}", dir.display()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !layout::is_thread_file(&name) {
                continue;
            }
            let text = fs::read_to_string(entry.path())
                .with_context(|| format!("read {}", entry.path().display()))?;
            let parsed =
                record::parse(&text).with_context(|| format!("session {session_id}: {name}"))?;
            let index = parsed.record.index;
            match latest.get(&index) {
                Some(kept) if kept.record.revision >= parsed.record.revision => {
                    log::warn!("session {session_id}: ignoring stale copy {name}");
                }
                _ => {
                    latest.insert(index, parsed);
                }
            }
        }

        let records = latest
            .into_values()
            .map(|parsed| reconcile_draft(session_id, parsed))
            .collect();
        Ok(Session { meta, records })
    }

    /// Write every thread record and regenerate the summary.
    pub fn save(&self, session: &mut Session) -> WorkflowResult<()> {
        let dir = self.existing_dir(session.id())?;
        for record in &mut session.records {
            write_record(&dir, record, session.meta.thread_count)?;
        }
        write_summary(&dir, &session.meta, &session.records)?;
        Ok(())
    }

    /// Fresh copy of one thread, read from disk.
    pub fn load_thread(&self, session_id: &str, key: &ThreadKey) -> WorkflowResult<ThreadRecord> {
        self.load(session_id)?
            .records
            .into_iter()
            .find(|r| r.matches(key))
            .ok_or_else(|| WorkflowError::ThreadNotFound {
                session: session_id.to_string(),
                thread: key.to_string(),
            })
    }

    /// Persist one thread and regenerate the summary from what is on disk.
    pub fn save_thread(&self, session_id: &str, record: &mut ThreadRecord) -> WorkflowResult<()> {
        let dir = self.existing_dir(session_id)?;
        let meta = read_meta(&dir, session_id)?;
        write_record(&dir, record, meta.thread_count)?;
        let session = self.load(session_id)?;
        write_summary(&dir, &session.meta, &session.records)?;
        Ok(())
    }

    /// Write every comment of `session` into one markdown file. Without
    /// `output` the file lands next to the session directory as
    /// `<session id>_comments.md`.
    pub fn export_comments(&self, session: &Session, output: Option<&Path>) -> WorkflowResult<PathBuf> {
        let path = match output {
            Some(path) => path.to_path_buf(),
            None => self.root.join(format!("{}_comments.md", session.id())),
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("export path {} has no file name", path.display()))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        write_atomic(&dir, &name, &export::render(session))?;
        log::info!("session {}: comments exported to {}", session.id(), path.display());
        Ok(path)
    }

    fn existing_dir(&self, session_id: &str) -> WorkflowResult<PathBuf> {
        let dir = self.session_dir(session_id);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(WorkflowError::SessionNotFound(session_id.to_string()))
        }
    }
}

fn reconcile_draft(session_id: &str, parsed: ParsedThreadFile) -> ThreadRecord {
    let ParsedThreadFile {
        mut record,
        draft_text,
    } = parsed;
    let Some(text) = draft_text else {
        return record;
    };
    let label = record.label();

    if let Some(active) = record.active_draft_mut() {
        if active.content.trim() != text {
            log::info!("session {session_id}: {label} draft was edited on disk");
            active.content = text;
        }
        return record;
    }
    if record.classification.is_skip() {
        log::warn!("session {session_id}: ignoring draft text on skipped {label}");
        return record;
    }
    if record
        .latest_posted()
        .is_some_and(|posted| posted.content.trim() == text)
    {
        log::warn!("session {session_id}: {label} draft text matches the posted reply, ignoring");
        return record;
    }
    log::info!("session {session_id}: new draft for {label} found on disk");
    let draft = DraftResponse::new(record.thread_id(), text);
    record.drafts.push(draft);
    record
}

fn read_meta(dir: &Path, session_id: &str) -> WorkflowResult<SessionMeta> {
    let path = dir.join(SUMMARY_FILE);
    let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let meta = summary::parse_meta(&text)
        .with_context(|| format!("session {session_id}: {SUMMARY_FILE}"))?;
    Ok(meta)
}

fn write_record(dir: &Path, record: &mut ThreadRecord, thread_count: u32) -> WorkflowResult<()> {
    record.revision += 1;
    let name = thread_file_name(record, thread_count);
    let contents = record::render(record)?;
    write_atomic(dir, &name, &contents)?;
    remove_stale_copies(dir, record.index, &name)?;
    Ok(())
}

fn write_summary(dir: &Path, meta: &SessionMeta, records: &[ThreadRecord]) -> WorkflowResult<()> {
    let contents = summary::render(meta, records)?;
    write_atomic(dir, SUMMARY_FILE, &contents)?;
    Ok(())
}

/// A reader sees either the old file or the new one, never a partial write.
fn write_atomic(dir: &Path, name: &str, contents: &str) -> anyhow::Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".presto-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("write {name}"))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync {name}"))?;
    tmp.persist(dir.join(name))
        .map_err(|e| e.error)
        .with_context(|| format!("replace {name}"))?;
    Ok(())
}

/// Thread filenames change with classification; drop older names for the
/// same index.
fn remove_stale_copies(dir: &Path, index: u32, keep: &str) -> anyhow::Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("list {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name != keep && layout::index_from_file_name(&name) == Some(index) {
            log::debug!("removing stale thread file {name}");
            fs::remove_file(entry.path()).with_context(|| format!("remove {name}"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Comment, CommentKind, SkipReason};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn comment(id: u64, author: &str, body: &str) -> Comment {
        Comment {
            id,
            author: author.into(),
            author_is_bot: false,
            body: body.into(),
            file_path: Some("src/cache.rs".into()),
            line: Some(id as u32 * 10),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, id as u32, 0).unwrap(),
            reply_to_id: None,
            thread_id: None,
            resolved: false,
            is_outdated: false,
            kind: CommentKind::Review,
        }
    }

    fn thread(c: Comment) -> Thread {
        Thread {
            thread_id: format!("review-{}", c.id),
            file_path: c.file_path.clone(),
            anchor_line: c.line,
            participants: [c.author.clone()].into_iter().collect(),
            resolved: false,
            comments: vec![c],
        }
    }

    fn pr() -> PullRequestInfo {
        PullRequestInfo {
            number: 18,
            title: "Add caching".into(),
            author: "pat".into(),
            url: None,
            state: None,
        }
    }

    fn create(store: &SessionStore) -> Session {
        let threads = vec![
            thread(comment(1, "alice", "Please add a test for eviction")),
            thread(comment(2, "renovate[bot]", "Update dependency")),
        ];
        let classifications = vec![
            ThreadClassification::skip("review-2", SkipReason::BotAuthor),
            ThreadClassification::needs_response("review-1"),
        ];
        store.create("owner/repo", &pr(), threads, classifications).unwrap()
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn create_writes_thread_files_and_summary() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let session = create(&store);

        assert!(session.id().starts_with("pr_18_review_"));
        let names = file_names(&store.session_dir(session.id()));
        assert_eq!(
            names,
            vec![
                "session_summary.md".to_string(),
                "thread_01_alice_Please_add_a_test_for_eviction.md".to_string(),
                "thread_02_SKIP-bot_renovatebot_Update_dependency.md".to_string(),
            ]
        );

        let loaded = store.load(session.id()).unwrap();
        assert_eq!(loaded, session);
        assert_eq!(loaded.summary().needs_response, 1);
    }

    #[test]
    fn load_picks_up_hand_written_draft() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let session = create(&store);
        let path = store
            .session_dir(session.id())
            .join("thread_01_alice_Please_add_a_test_for_eviction.md");

        let mut text = fs::read_to_string(&path).unwrap();
        text.push_str("Added `evicts_oldest_entry` in the latest push.\n");
        fs::write(&path, text).unwrap();

        let record = store.load_thread(session.id(), &ThreadKey::Index(1)).unwrap();
        let draft = record.active_draft().unwrap();
        assert_eq!(draft.content, "Added `evicts_oldest_entry` in the latest push.");
        assert!(!draft.posted);
    }

    #[test]
    fn draft_written_with_crlf_line_endings_is_kept() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let session = create(&store);
        let path = store
            .session_dir(session.id())
            .join("thread_01_alice_Please_add_a_test_for_eviction.md");

        let text = fs::read_to_string(&path).unwrap().replace('\n', "\r\n");
        fs::write(&path, format!("{text}Added the test.\r\n")).unwrap();

        let record = store.load_thread(session.id(), &ThreadKey::Index(1)).unwrap();
        assert_eq!(record.active_draft().unwrap().content, "Added the test.");
    }

    #[test]
    fn edits_replace_the_active_draft() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let session = create(&store);
        let mut record = store.load_thread(session.id(), &ThreadKey::Index(1)).unwrap();
        record.drafts.push(DraftResponse::new(record.thread_id(), "first take"));
        store.save_thread(session.id(), &mut record).unwrap();

        let path = store.session_dir(session.id()).join(thread_file_name(&record, 2));
        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.replace("first take", "second take")).unwrap();

        let reloaded = store.load_thread(session.id(), &ThreadKey::Index(1)).unwrap();
        assert_eq!(reloaded.drafts.len(), 1);
        assert_eq!(reloaded.active_draft().unwrap().content, "second take");
    }

    #[test]
    fn draft_text_on_skipped_thread_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let session = create(&store);
        let path = store
            .session_dir(session.id())
            .join("thread_02_SKIP-bot_renovatebot_Update_dependency.md");
        let mut text = fs::read_to_string(&path).unwrap();
        text.push_str("should not become a draft\n");
        fs::write(&path, text).unwrap();

        let record = store.load_thread(session.id(), &ThreadKey::Index(2)).unwrap();
        assert!(record.drafts.is_empty());
    }

    #[test]
    fn reclassification_renames_the_file() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let session = create(&store);
        let mut record = store.load_thread(session.id(), &ThreadKey::Index(1)).unwrap();
        record.classification = ThreadClassification::skip(record.thread_id(), SkipReason::Manual);
        store.save_thread(session.id(), &mut record).unwrap();

        let names = file_names(&store.session_dir(session.id()));
        assert!(names.contains(&"thread_01_SKIP-manual_alice_Please_add_a_test_for_eviction.md".to_string()));
        assert!(!names.contains(&"thread_01_alice_Please_add_a_test_for_eviction.md".to_string()));
        assert_eq!(store.load(session.id()).unwrap().records.len(), 2);
    }

    #[test]
    fn newest_revision_wins_over_leftover_copy() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let session = create(&store);
        let dir = store.session_dir(session.id());

        let mut record = store.load_thread(session.id(), &ThreadKey::Index(1)).unwrap();
        let old_name = thread_file_name(&record, 2);
        let old_text = fs::read_to_string(dir.join(&old_name)).unwrap();
        record.classification = ThreadClassification::skip(record.thread_id(), SkipReason::Manual);
        store.save_thread(session.id(), &mut record).unwrap();
        // Simulate a crash between writing the new name and removing the old one.
        fs::write(dir.join(&old_name), old_text).unwrap();

        let loaded = store.load_thread(session.id(), &ThreadKey::Index(1)).unwrap();
        assert!(loaded.classification.is_skip());
    }

    #[test]
    fn leftover_temp_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let session = create(&store);
        fs::write(
            store.session_dir(session.id()).join(".presto-half.tmp"),
            "<!-- presto:record {\"index\":",
        )
        .unwrap();
        assert_eq!(store.load(session.id()).unwrap().records.len(), 2);
    }

    #[test]
    fn missing_session_and_thread_are_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let err = store.load("pr_1_review_20240101_000000").unwrap_err();
        assert!(matches!(err, WorkflowError::SessionNotFound(_)));

        let session = create(&store);
        let err = store.load_thread(session.id(), &ThreadKey::Index(9)).unwrap_err();
        assert!(matches!(err, WorkflowError::ThreadNotFound { .. }));
        assert!(err.to_string().contains(session.id()));
    }

    #[test]
    fn export_writes_threaded_comments_with_id_index() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let session = create(&store);

        let path = store.export_comments(&session, None).unwrap();
        assert_eq!(path, tmp.path().join(format!("{}_comments.md", session.id())));
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# PR #18: Add caching\n"));
        assert!(text.contains("_No general comments on this PR._"));
        assert!(text.contains("### Thread 2\n**Status**: SKIP (bot author)"));
        assert!(text.contains("(Comment ID: 1)\n\n> Please add a test for eviction"));
        assert!(text.contains("- Review Comment 2: 2 by renovate[bot] (src/cache.rs:20)"));

        // Exports never count as thread files.
        assert_eq!(store.load(session.id()).unwrap().records.len(), 2);

        let custom = tmp.path().join("review-notes.md");
        assert_eq!(store.export_comments(&session, Some(&custom)).unwrap(), custom);
        assert_eq!(fs::read_to_string(&custom).unwrap(), text);
    }

    #[test]
    fn for_session_dir_splits_root_and_id() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        let session = create(&store);
        let (opened, id) = SessionStore::for_session_dir(&store.session_dir(session.id())).unwrap();
        assert_eq!(id, session.id());
        assert!(opened.load(&id).is_ok());
        assert!(SessionStore::for_session_dir(&tmp.path().join("nope")).is_err());
    }
}
