use super::draft::DraftResponse;
use super::insights::{Level, ThreadInsights};
use super::thread::{SkipReason, Thread, ThreadClassification};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identifier of a review session, `pr_<number>_review_<YYYYMMDD_HHMMSS>`.
pub type SessionId = String;

pub fn session_id_for(pr_number: u32, at: DateTime<Local>) -> SessionId {
    format!("pr_{pr_number}_review_{}", at.format("%Y%m%d_%H%M%S"))
}

/// How callers address a thread inside a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadKey {
    /// 1-based position in the session (the `NN` in `thread_NN_...`)
    Index(u32),
    Id(String),
}

impl FromStr for ThreadKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("empty thread reference".to_string());
        }
        match trimmed.parse::<u32>() {
            Ok(index) => Ok(Self::Index(index)),
            Err(_) => Ok(Self::Id(trimmed.to_string())),
        }
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "thread {index}"),
            Self::Id(id) => write!(f, "thread {id}"),
        }
    }
}

/// Persisted state of one thread: the conversation, its verdict and the
/// full draft history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub index: u32,
    pub thread: Thread,
    pub classification: ThreadClassification,
    #[serde(default)]
    pub insights: ThreadInsights,
    #[serde(default)]
    pub drafts: Vec<DraftResponse>,
    /// Bumped on every write; resolves duplicate files for one index
    #[serde(default)]
    pub revision: u64,
}

impl ThreadRecord {
    pub fn thread_id(&self) -> &str {
        &self.thread.thread_id
    }

    pub fn matches(&self, key: &ThreadKey) -> bool {
        match key {
            ThreadKey::Index(index) => self.index == *index,
            ThreadKey::Id(id) => self.thread.thread_id == *id,
        }
    }

    /// Latest draft, if it has not been posted yet. Older unposted drafts are
    /// superseded history.
    pub fn active_draft(&self) -> Option<&DraftResponse> {
        self.drafts.last().filter(|d| !d.posted)
    }

    pub fn active_draft_mut(&mut self) -> Option<&mut DraftResponse> {
        self.drafts.last_mut().filter(|d| !d.posted)
    }

    pub fn latest_posted(&self) -> Option<&DraftResponse> {
        self.drafts.iter().rev().find(|d| d.posted)
    }

    pub fn has_posted(&self) -> bool {
        self.drafts.iter().any(|d| d.posted)
    }

    pub fn label(&self) -> String {
        format!("thread {:02}", self.index)
    }
}

/// A review session: one `analyze` run and everything drafted or posted
/// against it since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub meta: SessionMeta,
    /// Ordered by index
    pub records: Vec<ThreadRecord>,
}

/// Session facts fixed at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub session_id: SessionId,
    pub repo: String,
    pub pr_number: u32,
    #[serde(default)]
    pub pr_author: String,
    #[serde(default)]
    pub pr_title: String,
    pub created_at: DateTime<Utc>,
    /// Fixed at creation; sets the zero padding of thread filenames
    #[serde(default)]
    pub thread_count: u32,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.meta.session_id
    }

    pub fn find(&self, key: &ThreadKey) -> Option<&ThreadRecord> {
        self.records.iter().find(|r| r.matches(key))
    }

    pub fn find_mut(&mut self, key: &ThreadKey) -> Option<&mut ThreadRecord> {
        self.records.iter_mut().find(|r| r.matches(key))
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary::from_records(&self.records)
    }
}

/// Derived counts over a session's threads. Recomputed on every save.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSummary {
    pub total: usize,
    pub needs_response: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    /// Threads with at least one posted reply
    pub posted: usize,
    /// Threads with an active, unposted draft
    pub drafted_unposted: usize,
    pub priorities: BTreeMap<Level, usize>,
}

impl SessionSummary {
    pub fn from_records(records: &[ThreadRecord]) -> Self {
        let mut summary = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            match record.classification.skip_reason {
                Some(reason) if record.classification.is_skip() => {
                    *summary.skipped.entry(reason).or_default() += 1;
                }
                _ => summary.needs_response += 1,
            }
            if record.has_posted() {
                summary.posted += 1;
            }
            if record.active_draft().is_some() {
                summary.drafted_unposted += 1;
            }
            *summary
                .priorities
                .entry(record.insights.priority)
                .or_default() += 1;
        }
        summary
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ThreadStatus;
    use std::collections::BTreeSet;

    fn record(index: u32, classification: ThreadClassification, drafts: Vec<DraftResponse>) -> ThreadRecord {
        let thread_id = classification.thread_id.clone();
        ThreadRecord {
            index,
            thread: Thread {
                thread_id,
                comments: vec![],
                file_path: None,
                anchor_line: None,
                participants: BTreeSet::new(),
                resolved: false,
            },
            classification,
            insights: ThreadInsights::default(),
            drafts,
            revision: 0,
        }
    }

    #[test]
    fn session_id_format() {
        let at = Local::now();
        let id = session_id_for(18, at);
        assert!(id.starts_with("pr_18_review_"));
        assert_eq!(id.len(), "pr_18_review_".len() + "YYYYMMDD_HHMMSS".len());
    }

    #[test]
    fn thread_key_parse() {
        assert_eq!(ThreadKey::from_str("02").unwrap(), ThreadKey::Index(2));
        assert_eq!(
            ThreadKey::from_str("PRRT_abc").unwrap(),
            ThreadKey::Id("PRRT_abc".into())
        );
        assert!(ThreadKey::from_str("  ").is_err());
    }

    #[test]
    fn active_draft_is_latest_unposted() {
        let mut first = DraftResponse::new("t1", "first");
        first.mark_posted(10, Utc::now());
        let second = DraftResponse::new("t1", "second");
        let mut rec = record(1, ThreadClassification::needs_response("t1"), vec![first, second]);
        assert_eq!(rec.active_draft().unwrap().content, "second");
        rec.drafts.last_mut().unwrap().mark_posted(11, Utc::now());
        assert!(rec.active_draft().is_none());
        assert_eq!(rec.latest_posted().unwrap().posted_comment_id, Some(11));
    }

    #[test]
    fn superseded_unposted_draft_is_not_active() {
        let stale = DraftResponse::new("t1", "stale");
        let mut posted = DraftResponse::new("t1", "sent");
        posted.mark_posted(3, Utc::now());
        let rec = record(1, ThreadClassification::needs_response("t1"), vec![stale, posted]);
        assert!(rec.active_draft().is_none());
    }

    #[test]
    fn summary_counts() {
        let mut posted = DraftResponse::new("a", "x");
        posted.mark_posted(1, Utc::now());
        let records = vec![
            record(1, ThreadClassification::needs_response("a"), vec![posted]),
            record(2, ThreadClassification::needs_response("b"), vec![DraftResponse::new("b", "y")]),
            record(3, ThreadClassification::skip("c", SkipReason::Resolved), vec![]),
            record(4, ThreadClassification::skip("d", SkipReason::BotAuthor), vec![]),
            record(5, ThreadClassification::skip("e", SkipReason::Resolved), vec![]),
        ];
        let summary = SessionSummary::from_records(&records);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.needs_response, 2);
        assert_eq!(summary.skipped_total(), 3);
        assert_eq!(summary.skipped[&SkipReason::Resolved], 2);
        assert_eq!(summary.posted, 1);
        assert_eq!(summary.drafted_unposted, 1);
        assert_eq!(records[2].classification.status, ThreadStatus::Skip);
    }
}
