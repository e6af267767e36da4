//! Groups a flat list of review comments into conversation threads.

use crate::domain::{Comment, CommentId, CommentKind, Thread};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

lazy_static! {
    // A short reply that reads as "I did it".
    static ref ACK_RE: Regex = Regex::new(
        r"(?i)^\s*(?:[✅✔️👍]\s*)?(?:done|fixed|addressed|resolved|updated|changed|applied|fixed in [0-9a-f]{7,40})\b"
    )
    .expect("acknowledgement regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadingOptions {
    /// Merge reply-less review comments that share a root's `(file, line)`
    /// into that root's thread.
    pub merge_by_location: bool,
}

impl Default for ThreadingOptions {
    fn default() -> Self {
        Self {
            merge_by_location: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ThreadBuilder {
    options: ThreadingOptions,
    pr_author: Option<String>,
}

impl ThreadBuilder {
    pub fn new(options: ThreadingOptions) -> Self {
        Self {
            options,
            pr_author: None,
        }
    }

    /// PR author, used by the acknowledgement heuristic for `resolved`.
    pub fn with_pr_author(mut self, author: impl Into<String>) -> Self {
        let author = author.into();
        self.pr_author = (!author.is_empty()).then_some(author);
        self
    }

    /// Build threads ordered by their first comment (time, then id). The
    /// result does not depend on the order of `comments`.
    pub fn build(&self, comments: &[Comment]) -> Vec<Thread> {
        let comments = canonical_order(comments);
        let mut groups = DisjointSet::new(comments.len());

        let mut by_key: HashMap<(CommentKind, CommentId), usize> = HashMap::new();
        let mut by_native: HashMap<&str, usize> = HashMap::new();
        for (idx, comment) in comments.iter().enumerate() {
            by_key.insert((comment.kind, comment.id), idx);
            if let Some(native) = comment.thread_id.as_deref() {
                match by_native.get(native) {
                    Some(&first) => groups.union(first, idx),
                    None => {
                        by_native.insert(native, idx);
                    }
                }
            }
        }

        for (idx, comment) in comments.iter().enumerate() {
            if let Some(parent) = comment.reply_to_id
                && let Some(&parent_idx) = by_key.get(&(comment.kind, parent))
            {
                groups.union(parent_idx, idx);
            }
        }

        if self.options.merge_by_location {
            self.merge_by_location(&comments, &mut groups);
        }

        let mut members: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
        for idx in 0..comments.len() {
            members[groups.find(idx)].push(idx);
        }

        members
            .into_iter()
            .filter(|m| !m.is_empty())
            .map(|m| self.make_thread(m.into_iter().map(|i| comments[i].clone()).collect()))
            .collect()
    }

    fn merge_by_location(&self, comments: &[Comment], groups: &mut DisjointSet) {
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
        for idx in 0..comments.len() {
            members[groups.find(idx)].push(idx);
        }

        // Roots are visited in chronological order, so the earliest group at a
        // location owns the anchor.
        let mut anchors: HashMap<(&str, u32), usize> = HashMap::new();
        for (root, group) in members.iter().enumerate() {
            if group.is_empty() || group.iter().any(|&i| comments[i].thread_id.is_some()) {
                continue;
            }
            let first = &comments[root];
            let (CommentKind::Review, Some(path), Some(line)) =
                (first.kind, first.file_path.as_deref(), first.line)
            else {
                continue;
            };
            match anchors.get(&(path, line)) {
                Some(&owner) => {
                    log::debug!("merging comment {} into thread at {path}:{line}", first.id);
                    groups.union(owner, root);
                }
                None => {
                    anchors.insert((path, line), root);
                }
            }
        }
    }

    fn make_thread(&self, comments: Vec<Comment>) -> Thread {
        let root = &comments[0];
        let thread_id = comments
            .iter()
            .find_map(|c| c.thread_id.clone())
            .unwrap_or_else(|| format!("{}-{}", root.kind, root.id));
        let participants: BTreeSet<String> = comments.iter().map(|c| c.author.clone()).collect();
        let resolved = comments.iter().any(|c| c.resolved) || self.acknowledged(&comments);

        Thread {
            thread_id,
            file_path: root.file_path.clone(),
            anchor_line: root.line,
            participants,
            resolved,
            comments,
        }
    }

    /// Best-effort: the PR author's last word is "done"/"fixed" without a
    /// follow-up question.
    fn acknowledged(&self, comments: &[Comment]) -> bool {
        let (Some(author), Some(last)) = (self.pr_author.as_deref(), comments.last()) else {
            return false;
        };
        comments.len() > 1
            && last.author == author
            && !last.body.contains('?')
            && ACK_RE.is_match(&last.body)
    }
}

fn canonical_order(comments: &[Comment]) -> Vec<Comment> {
    let mut sorted = comments.to_vec();
    sorted.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then(a.id.cmp(&b.id))
            .then(a.kind.cmp(&b.kind))
    });
    // Keep the earliest copy of a comment fetched more than once.
    let mut seen = HashSet::new();
    sorted.retain(|c| seen.insert((c.kind, c.id)));
    sorted
}

/// Union-find whose representative is always the smallest index, i.e. the
/// earliest comment of the group.
#[derive(Debug)]
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, idx: usize) -> usize {
        let mut root = idx;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = idx;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[high] = low;
        }
    }
}
