//! Domain types for Presto.
//! Defines the comments, threads, drafts and sessions the workflow operates on.

pub mod comment;
pub mod draft;
pub mod error;
pub mod insights;
pub mod session;
pub mod thread;

pub use comment::*;
pub use draft::*;
pub use error::*;
pub use insights::*;
pub use session::*;
pub use thread::*;
