//! Hosting platform adapters.

pub mod github;
pub mod traits;

pub use github::GhCli;
pub use traits::{FetchedComments, PrRef, ReviewPlatform};
