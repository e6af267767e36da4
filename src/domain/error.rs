//! Domain error types for the review workflow.
//!
//! These errors represent workflow-level failures: a missing session or
//! thread, an operation that is illegal for the thread's current state, or a
//! failure of the hosting platform. Every variant names the session and/or
//! thread it concerns so the message can be shown to the user as-is.

use thiserror::Error;

/// Errors raised by session, draft and posting operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("{thread} not found in session {session}")]
    ThreadNotFound { session: String, thread: String },

    #[error("Comment {comment_id} not found in PR #{pr_number}")]
    CommentNotFound { pr_number: u32, comment_id: String },

    #[error("Invalid state for {thread} in session {session}: {reason}")]
    InvalidState {
        session: String,
        thread: String,
        reason: String,
    },

    #[error("{thread} in session {session} was already posted as comment {comment_id}")]
    AlreadyPosted {
        session: String,
        thread: String,
        comment_id: String,
    },

    #[error("Nothing to post for {thread} in session {session}")]
    NothingToPost { session: String, thread: String },

    #[error("Hosting platform call failed ({context}): {source:#}")]
    ExternalCollaboratorFailure {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Session storage failed: {0:#}")]
    OperationFailed(#[from] anyhow::Error),
}

impl WorkflowError {
    /// True for the not-found family (session, thread or comment).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound(_) | Self::ThreadNotFound { .. } | Self::CommentNotFound { .. }
        )
    }

    pub(crate) fn invalid_state(
        session: impl Into<String>,
        thread: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            session: session.into(),
            thread: thread.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn external(context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::ExternalCollaboratorFailure {
            context: context.into(),
            source,
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
