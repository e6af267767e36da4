//! `session_summary.md`: a machine header with the session's fixed facts,
//! followed by counts regenerated from the thread records on every save.

use super::layout::thread_file_name;
use crate::domain::{SessionMeta, SessionSummary, SkipReason, ThreadRecord};
use anyhow::{Context, Result, anyhow};

const SESSION_PREFIX: &str = "<!-- presto:session ";
const MARKER_SUFFIX: &str = " -->";

pub fn render(meta: &SessionMeta, records: &[ThreadRecord]) -> Result<String> {
    let json = serde_json::to_string(meta).context("serialize session metadata")?;
    let summary = SessionSummary::from_records(records);
    let mut out = Vec::new();

    out.push(format!("{SESSION_PREFIX}{json}{MARKER_SUFFIX}"));
    out.push(format!("# PR {} Review Session", meta.pr_number));
    out.push(String::new());
    out.push(format!("**Repository**: {}", meta.repo));
    if !meta.pr_title.is_empty() {
        out.push(format!("**PR Title**: {}", meta.pr_title));
    }
    if !meta.pr_author.is_empty() {
        out.push(format!("**PR Author**: {}", meta.pr_author));
    }
    out.push(format!("**Session**: {}", meta.session_id));
    out.push(format!("**Created**: {}", meta.created_at.to_rfc3339()));
    out.push(String::new());

    out.push("## Statistics".to_string());
    out.push(String::new());
    out.push(format!("- **Total Threads**: {}", summary.total));
    out.push(format!("- **Needs Response**: {}", summary.needs_response));
    out.push(format!("- **Skipped**: {}", summary.skipped_total()));
    for reason in SkipReason::ALL {
        if let Some(count) = summary.skipped.get(&reason) {
            out.push(format!("  - {reason}: {count}"));
        }
    }
    out.push(format!("- **Posted**: {}", summary.posted));
    out.push(format!("- **Drafted (unposted)**: {}", summary.drafted_unposted));
    out.push(String::new());

    out.push("## Priority Breakdown".to_string());
    out.push(String::new());
    for (level, count) in summary.priorities.iter().rev() {
        out.push(format!("- **{level}**: {count}"));
    }
    out.push(String::new());

    out.push("## Threads".to_string());
    out.push(String::new());
    for record in records {
        let state = if record.active_draft().is_some() {
            " [draft]"
        } else if record.has_posted() {
            " [posted]"
        } else {
            ""
        };
        out.push(format!(
            "{}. `{}` {}{} - {}",
            record.index,
            thread_file_name(record, meta.thread_count),
            record.classification.label(),
            state,
            record.thread.location()
        ));
    }
    out.push(String::new());

    out.push("## Next Steps".to_string());
    out.push(String::new());
    out.push("1. Read each NEEDS RESPONSE thread file for context".to_string());
    out.push(format!(
        "2. Draft replies with `presto append --session-dir {} --thread <N> --content <text>` or by editing below the draft marker",
        meta.session_id
    ));
    out.push(format!(
        "3. Preview with `presto post --session-dir {} --all --dry-run`, then post",
        meta.session_id
    ));

    let mut text = out.join("\n");
    text.push('\n');
    Ok(text)
}

pub fn parse_meta(text: &str) -> Result<SessionMeta> {
    let header = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| anyhow!("session summary is empty"))?;
    let json = header
        .trim()
        .strip_prefix(SESSION_PREFIX)
        .and_then(|rest| rest.strip_suffix(MARKER_SUFFIX))
        .ok_or_else(|| anyhow!("missing session header"))?;
    serde_json::from_str(json).context("parse session header")
}
