//! Infrastructure layer (adapters/implementations).
//!
//! This module contains IO-heavy integrations: the session files on disk,
//! the `gh` CLI and the config file.

pub mod app_config;
pub mod session_store;
pub mod shell;
pub mod vcs;
