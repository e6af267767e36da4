//! Ad-hoc lookups on a PR's comments, outside of any session.

use crate::domain::{Comment, CommentId, CommentKind, WorkflowError, WorkflowResult};
use crate::infra::vcs::{PrRef, ReviewPlatform};

/// Comments whose body contains `query`, ignoring case, oldest first.
pub fn matching_comments<'c>(comments: &'c [Comment], query: &str) -> Vec<&'c Comment> {
    let needle = query.to_lowercase();
    let mut hits: Vec<_> = comments
        .iter()
        .filter(|c| c.body.to_lowercase().contains(&needle))
        .collect();
    hits.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
    hits
}

pub async fn search(platform: &dyn ReviewPlatform, pr: &PrRef, query: &str) -> WorkflowResult<Vec<Comment>> {
    let fetched = platform
        .fetch_review_comments(pr)
        .await
        .map_err(|err| WorkflowError::external(format!("fetch comments of {pr}"), err))?;
    Ok(matching_comments(&fetched.comments, query)
        .into_iter()
        .cloned()
        .collect())
}

/// Reply to one comment by id. Review comments get a threaded reply;
/// conversation comments get a new conversation comment.
pub async fn reply(
    platform: &dyn ReviewPlatform,
    pr: &PrRef,
    comment_id: CommentId,
    message: &str,
) -> WorkflowResult<CommentId> {
    let message = message.trim();
    if message.is_empty() {
        return Err(WorkflowError::invalid_state(
            pr.to_string(),
            format!("comment {comment_id}"),
            "reply message is blank",
        ));
    }

    let fetched = platform
        .fetch_review_comments(pr)
        .await
        .map_err(|err| WorkflowError::external(format!("fetch comments of {pr}"), err))?;
    let target = find_comment(&fetched.comments, comment_id).ok_or_else(|| {
        WorkflowError::CommentNotFound {
            pr_number: pr.number,
            comment_id: comment_id.to_string(),
        }
    })?;

    platform
        .submit_reply(pr, target, message)
        .await
        .map_err(|err| WorkflowError::external(format!("reply to comment {comment_id} on {pr}"), err))
}

/// Review and conversation ids are separate sequences; prefer the review
/// comment when both match.
fn find_comment(comments: &[Comment], id: CommentId) -> Option<&Comment> {
    let mut matches = comments.iter().filter(|c| c.id == id);
    let first = matches.next()?;
    if first.kind == CommentKind::Review {
        return Some(first);
    }
    Some(
        matches
            .find(|c| c.kind == CommentKind::Review)
            .unwrap_or(first),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn comment(id: CommentId, minute: u32, kind: CommentKind, body: &str) -> Comment {
        Comment {
            id,
            author: "alice".into(),
            author_is_bot: false,
            body: body.into(),
            file_path: None,
            line: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap(),
            reply_to_id: None,
            thread_id: None,
            resolved: false,
            is_outdated: false,
            kind,
        }
    }

    #[test]
    fn search_is_case_insensitive_and_ordered() {
        let comments = vec![
            comment(3, 5, CommentKind::Review, "Retry LOGIC looks off"),
            comment(1, 1, CommentKind::General, "retry logic needs a test"),
            comment(2, 2, CommentKind::Review, "unrelated"),
        ];
        let ids: Vec<_> = matching_comments(&comments, "retry logic")
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn colliding_ids_prefer_review_comments() {
        let comments = vec![
            comment(7, 1, CommentKind::General, "general"),
            comment(7, 2, CommentKind::Review, "inline"),
        ];
        assert_eq!(find_comment(&comments, 7).unwrap().body, "inline");
        assert!(find_comment(&comments, 8).is_none());
    }
}
