use super::threading::{ThreadBuilder, ThreadingOptions};
use super::triage::{ClassifierOptions, SkipClassifier};
use crate::domain::{ResponseSignals, Session, WorkflowError, WorkflowResult};
use crate::infra::session_store::SessionStore;
use crate::infra::vcs::{PrRef, ReviewPlatform};

/// Result of `analyze`: the new session plus every comment record that had
/// to be dropped while fetching.
#[derive(Debug)]
pub struct AnalyzeOutcome {
    pub session: Session,
    pub signals: ResponseSignals,
    pub warnings: Vec<String>,
}

/// Fetch a PR's comments and turn them into a new review session.
pub struct Analyzer<'a> {
    store: &'a SessionStore,
    platform: &'a dyn ReviewPlatform,
    threading: ThreadingOptions,
    classifier: ClassifierOptions,
}

impl<'a> Analyzer<'a> {
    pub fn new(store: &'a SessionStore, platform: &'a dyn ReviewPlatform) -> Self {
        Self {
            store,
            platform,
            threading: ThreadingOptions::default(),
            classifier: ClassifierOptions::default(),
        }
    }

    pub fn with_threading(mut self, options: ThreadingOptions) -> Self {
        self.threading = options;
        self
    }

    pub fn with_classifier(mut self, options: ClassifierOptions) -> Self {
        self.classifier = options;
        self
    }

    pub async fn analyze(&self, pr: &PrRef) -> WorkflowResult<AnalyzeOutcome> {
        let info = self
            .platform
            .fetch_pull_request(pr)
            .await
            .map_err(|err| WorkflowError::external(format!("fetch {pr}"), err))?;
        let fetched = self
            .platform
            .fetch_review_comments(pr)
            .await
            .map_err(|err| WorkflowError::external(format!("fetch comments of {pr}"), err))?;
        log::info!(
            "{pr}: {} comments fetched, {} skipped",
            fetched.comments.len(),
            fetched.warnings.len()
        );

        let threads = ThreadBuilder::new(self.threading)
            .with_pr_author(info.author.clone())
            .build(&fetched.comments);
        let signals = ResponseSignals::tally(threads.iter().flat_map(|t| &t.comments));
        let classifications = SkipClassifier::new(info.author.clone(), &self.classifier)
            .classify_all(&threads);

        let session = self
            .store
            .create(&pr.slug(), &info, threads, classifications)?;
        Ok(AnalyzeOutcome {
            session,
            signals,
            warnings: fetched.warnings,
        })
    }
}
