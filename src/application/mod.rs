//! Application layer (use-cases, policies).
//!
//! Orchestrates domain logic over the session store and the hosting
//! platform without knowing about the command line.

pub mod analyze;
pub mod drafts;
pub mod posting;
pub mod search;
pub mod threading;
pub mod triage;

pub use analyze::{AnalyzeOutcome, Analyzer};
pub use drafts::DraftManager;
pub use posting::{PostOutcome, PostReport, PostResult, PostTarget, Poster};
pub use threading::{ThreadBuilder, ThreadingOptions};
pub use triage::{ClassifierOptions, SkipClassifier, SkipRule};
