//! Single-file markdown export of every comment in a session: conversation
//! comments first, then review threads, then an id index for `reply`.

use super::record::quote;
use crate::domain::{Comment, CommentKind, Session, ThreadRecord};

pub fn render(session: &Session) -> String {
    let meta = &session.meta;
    let mut out = Vec::new();

    if meta.pr_title.is_empty() {
        out.push(format!("# PR #{}", meta.pr_number));
    } else {
        out.push(format!("# PR #{}: {}", meta.pr_number, meta.pr_title));
    }
    out.push(format!("**Repository**: {}", meta.repo));
    if !meta.pr_author.is_empty() {
        out.push(format!("**Author**: {}", meta.pr_author));
    }
    out.push(format!("**Session**: {}", meta.session_id));
    out.push(String::new());

    let general = comments_of(session, CommentKind::General);
    out.push("## General Comments".to_string());
    out.push(String::new());
    if general.is_empty() {
        out.push("_No general comments on this PR._".to_string());
        out.push(String::new());
    }
    for (i, comment) in general.iter().enumerate() {
        out.push(format!("### Comment {} - ID: {}", i + 1, comment.id));
        out.push(format!("**Author**: {}", comment.author));
        out.push(format!("**Created**: {}", comment.created_at.to_rfc3339()));
        out.push(String::new());
        out.push(quote(&comment.body));
        out.push(String::new());
    }

    let review_threads: Vec<&ThreadRecord> = session
        .records
        .iter()
        .filter(|r| r.thread.root().is_some_and(|c| c.kind == CommentKind::Review))
        .collect();
    out.push("## Review Comments (Inline) - Threaded".to_string());
    out.push(String::new());
    if review_threads.is_empty() {
        out.push("_No review comments on this PR._".to_string());
        out.push(String::new());
    }
    for (i, record) in review_threads.iter().enumerate() {
        push_thread(&mut out, i + 1, record);
    }

    out.push("## Comment ID Summary".to_string());
    out.push(String::new());
    out.push("### General Comment IDs".to_string());
    for (i, comment) in general.iter().enumerate() {
        out.push(format!("- Comment {}: {} by {}", i + 1, comment.id, comment.author));
    }
    out.push(String::new());
    out.push("### Review Comment IDs".to_string());
    for (i, comment) in comments_of(session, CommentKind::Review).iter().enumerate() {
        out.push(format!(
            "- Review Comment {}: {} by {} ({})",
            i + 1,
            comment.id,
            comment.author,
            comment.location()
        ));
    }

    let mut text = out.join("\n");
    text.push('\n');
    text
}

fn push_thread(out: &mut Vec<String>, number: usize, record: &ThreadRecord) {
    let thread = &record.thread;
    out.push(format!("### Thread {number}"));
    if thread.root().is_some_and(|c| c.reply_to_id.is_some()) {
        out.push("_(Reply to missing comment)_".to_string());
    }
    out.push(format!("**Status**: {}", record.classification.label()));
    out.push(format!("**Location**: `{}`", thread.location()));
    out.push(String::new());

    for (i, comment) in thread.comments.iter().enumerate() {
        let role = if i == 0 { "Comment ID" } else { "Reply ID" };
        let mut line = format!(
            "**{}** - _{}_ ({role}: {})",
            comment.author,
            comment.created_at.to_rfc3339(),
            comment.id
        );
        if comment.is_outdated {
            line.push_str(" [outdated]");
        }
        out.push(line);
        out.push(String::new());
        out.push(quote(&comment.body));
        out.push(String::new());
    }
    out.push("---".to_string());
    out.push(String::new());
}

/// Every comment of one kind across the session, oldest first.
fn comments_of(session: &Session, kind: CommentKind) -> Vec<&Comment> {
    let mut comments: Vec<&Comment> = session
        .records
        .iter()
        .flat_map(|r| &r.thread.comments)
        .filter(|c| c.kind == kind)
        .collect();
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    comments
}
