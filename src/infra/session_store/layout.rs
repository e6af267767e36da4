//! File naming inside a session directory.
//!
//! Names are presentation only: the thread index and skip marker embedded in
//! a filename make `ls` readable, but the record inside the file is what
//! gets loaded.

use crate::domain::ThreadRecord;

pub const SUMMARY_FILE: &str = "session_summary.md";
const THREAD_PREFIX: &str = "thread_";
const THREAD_SUFFIX: &str = ".md";
const TOPIC_LEN: usize = 30;
const MIN_INDEX_WIDTH: usize = 2;

/// `thread_<NN>[_SKIP-<reason>]_<author>[_<topic>].md`
///
/// The index is zero-padded to the digit count of `thread_count` (at least
/// two) so every file of a session sorts in thread order.
pub fn thread_file_name(record: &ThreadRecord, thread_count: u32) -> String {
    let width = index_width(thread_count);
    let mut name = format!("{THREAD_PREFIX}{:0width$}", record.index);
    if record.classification.is_skip() {
        let token = record
            .classification
            .skip_reason
            .map(|r| r.token())
            .unwrap_or("other");
        name.push_str(&format!("_SKIP-{token}"));
    }

    let root = record.thread.root();
    let author = sanitize(root.map(|c| c.author.as_str()).unwrap_or("unknown"));
    name.push('_');
    name.push_str(if author.is_empty() { "unknown" } else { &author });

    let topic: String = root.map(|c| c.headline()).unwrap_or("").chars().take(TOPIC_LEN).collect();
    let topic = sanitize(&topic.replace([' ', '/', '\\'], "_"));
    if !topic.is_empty() {
        name.push('_');
        name.push_str(&topic);
    }
    name.push_str(THREAD_SUFFIX);
    name
}

fn index_width(thread_count: u32) -> usize {
    thread_count.to_string().len().max(MIN_INDEX_WIDTH)
}

pub fn is_thread_file(name: &str) -> bool {
    name.starts_with(THREAD_PREFIX) && name.ends_with(THREAD_SUFFIX)
}

/// Index embedded in a thread filename. Only used to find stale copies of a
/// record whose name changed.
pub fn index_from_file_name(name: &str) -> Option<u32> {
    if !is_thread_file(name) {
        return None;
    }
    let digits: String = name[THREAD_PREFIX.len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}
