//! Thread file format.
//!
//! ```text
//! <!-- presto:record {compact json ThreadRecord} -->
//! # Thread 02 ...            (rendered conversation, quoted)
//! ## Posted Responses        (one `<!-- presto:posted ... -->` per reply)
//! ## Draft Response
//! <!-- presto:draft -->
//! free text written by a human or agent
//! ```
//!
//! The record line is authoritative for everything except the text below the
//! draft marker, which is the editable body of the active draft.

use crate::domain::ThreadRecord;
use anyhow::{Context, Result, anyhow};

const RECORD_PREFIX: &str = "<!-- presto:record ";
const MARKER_SUFFIX: &str = " -->";
pub const DRAFT_MARKER: &str = "<!-- presto:draft -->";

#[derive(Debug)]
pub struct ParsedThreadFile {
    pub record: ThreadRecord,
    /// Trimmed text below the draft marker; `None` when empty or missing
    pub draft_text: Option<String>,
}

pub fn render(record: &ThreadRecord) -> Result<String> {
    let json = serde_json::to_string(record).context("serialize thread record")?;
    let thread = &record.thread;
    let mut out = Vec::new();

    out.push(format!("{RECORD_PREFIX}{json}{MARKER_SUFFIX}"));
    out.push(format!("# Thread {:02}", record.index));
    out.push(String::new());
    out.push("## Metadata".to_string());
    out.push(format!("- **Status**: {}", record.classification.label()));
    out.push(format!("- **Thread ID**: {}", thread.thread_id));
    out.push(format!("- **Location**: `{}`", thread.location()));
    out.push(format!(
        "- **Participants**: {}",
        thread.participants.iter().cloned().collect::<Vec<_>>().join(", ")
    ));
    out.push(format!("- **Resolved**: {}", if thread.resolved { "yes" } else { "no" }));
    out.push(format!("- **Priority**: {}", record.insights.priority));
    out.push(format!("- **Complexity**: {}", record.insights.complexity));
    out.push(String::new());

    out.push("## Conversation".to_string());
    out.push(String::new());
    for (i, comment) in thread.comments.iter().enumerate() {
        let heading = if i == 0 { "Comment" } else { "Reply" };
        let mut line = format!(
            "### {heading} {} by {} ({})",
            comment.id,
            comment.author,
            comment.created_at.to_rfc3339()
        );
        if comment.is_outdated {
            line.push_str(" [outdated]");
        }
        out.push(line);
        if let Some(reply_to) = comment.reply_to_id {
            out.push(format!("In reply to {reply_to}"));
        }
        out.push(String::new());
        out.push(quote(&comment.body));
        out.push(String::new());
    }

    let posted: Vec<_> = record.drafts.iter().filter(|d| d.posted).collect();
    if !posted.is_empty() {
        out.push("## Posted Responses".to_string());
        out.push(String::new());
        for draft in posted {
            out.push(format!(
                "<!-- presto:posted comment={} at={} -->",
                draft
                    .posted_comment_id
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
                draft.posted_at.map(|t| t.to_rfc3339()).unwrap_or_default()
            ));
            out.push(quote(&draft.content));
            out.push(String::new());
        }
    }

    let superseded = record.drafts.len()
        - record.drafts.iter().filter(|d| d.posted).count()
        - usize::from(record.active_draft().is_some());
    out.push("## Draft Response".to_string());
    out.push(String::new());
    if record.classification.is_skip() {
        out.push("_This thread is skipped; drafts are not accepted._".to_string());
    } else {
        out.push("_Write the reply below the marker. Everything after it is posted verbatim._".to_string());
    }
    if superseded > 0 {
        out.push(format!("_{superseded} earlier unposted draft(s) kept in history._"));
    }
    out.push(DRAFT_MARKER.to_string());
    if let Some(draft) = record.active_draft() {
        out.push(draft.content.clone());
    }

    let mut text = out.join("\n");
    text.push('\n');
    Ok(text)
}

pub fn parse(text: &str) -> Result<ParsedThreadFile> {
    let mut lines = text.lines();
    let header = lines
        .by_ref()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| anyhow!("thread file is empty"))?;
    let json = header
        .trim()
        .strip_prefix(RECORD_PREFIX)
        .and_then(|rest| rest.strip_suffix(MARKER_SUFFIX))
        .ok_or_else(|| anyhow!("missing thread record header"))?;
    let record: ThreadRecord = serde_json::from_str(json).context("parse thread record")?;

    let draft_text = text_after_draft_marker(text)
        .map(|rest| rest.replace("\r\n", "\n"))
        .map(|rest| rest.trim().to_string())
        .filter(|t| !t.is_empty());

    Ok(ParsedThreadFile { record, draft_text })
}

/// Everything after the first line that is exactly the draft marker. Line
/// endings may be `\n` or `\r\n`.
fn text_after_draft_marker(text: &str) -> Option<&str> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        offset += line.len();
        if line.trim_end_matches(['\r', '\n']) == DRAFT_MARKER {
            return Some(&text[offset..]);
        }
    }
    None
}

pub(super) fn quote(body: &str) -> String {
    if body.trim().is_empty() {
        return ">".to_string();
    }
    body.lines()
        .map(|l| if l.is_empty() { ">".to_string() } else { format!("> {l}") })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Comment, CommentKind, DraftResponse, Thread, ThreadClassification, ThreadInsights,
    };
    use chrono::Utc;

    fn sample() -> ThreadRecord {
        let comment = Comment {
            id: 7,
            author: "alice".into(),
            author_is_bot: false,
            body: format!("tricky body\n{DRAFT_MARKER}\n-->"),
            file_path: Some("src/lib.rs".into()),
            line: Some(42),
            created_at: Utc::now(),
            reply_to_id: None,
            thread_id: None,
            resolved: false,
            is_outdated: true,
            kind: CommentKind::Review,
        };
        ThreadRecord {
            index: 2,
            thread: Thread {
                thread_id: "review-7".into(),
                participants: ["alice".to_string()].into_iter().collect(),
                comments: vec![comment],
                file_path: Some("src/lib.rs".into()),
                anchor_line: Some(42),
                resolved: false,
            },
            classification: ThreadClassification::needs_response("review-7"),
            insights: ThreadInsights::default(),
            drafts: vec![],
            revision: 1,
        }
    }

    #[test]
    fn render_then_parse_keeps_record() {
        let mut record = sample();
        record.drafts.push(DraftResponse::new("review-7", "Thanks!\n\nFixed."));
        let text = render(&record).unwrap();
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.record, record);
        assert_eq!(parsed.draft_text.as_deref(), Some("Thanks!\n\nFixed."));
    }

    #[test]
    fn comment_bodies_cannot_fake_the_draft_marker() {
        let text = render(&sample()).unwrap();
        assert!(text.contains(&format!("> {DRAFT_MARKER}")));
        assert!(parse(&text).unwrap().draft_text.is_none());
    }

    #[test]
    fn edited_draft_text_is_picked_up() {
        let mut text = render(&sample()).unwrap();
        text.push_str("\nLooks right, will change it.\n");
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.draft_text.as_deref(), Some("Looks right, will change it."));
    }

    #[test]
    fn crlf_files_keep_their_draft() {
        let text = render(&sample()).unwrap().replace('\n', "\r\n");
        let text = format!("{text}Added the test.\r\n\r\nSee cache_tests.rs.\r\n");
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.record.index, 2);
        assert_eq!(
            parsed.draft_text.as_deref(),
            Some("Added the test.\n\nSee cache_tests.rs.")
        );
    }

    #[test]
    fn marker_on_last_line_without_newline() {
        let text = render(&sample()).unwrap();
        let text = text.trim_end();
        assert!(text.ends_with(DRAFT_MARKER));
        assert!(parse(text).unwrap().draft_text.is_none());
    }

    #[test]
    fn posted_text_is_not_a_draft() {
        let mut record = sample();
        let mut sent = DraftResponse::new("review-7", "Already sent");
        sent.mark_posted(99, Utc::now());
        record.drafts.push(sent);
        let text = render(&record).unwrap();
        assert!(text.contains("<!-- presto:posted comment=99"));
        assert!(parse(&text).unwrap().draft_text.is_none());
    }

    #[test]
    fn rejects_files_without_record() {
        assert!(parse("# Thread 01\n").is_err());
        assert!(parse("").is_err());
    }
}
