//! Test utilities shared across the lockstep-rebase workspace
//!
//! Provides git repository fixtures ([`GitRepoTestGuard`]) for building the
//! multi-repository submodule hierarchies the orchestrator tests exercise,
//! and XDG directory mocking ([`EnvTestGuard`]) for config tests.
//!
//! The clippy dead_code lint is disabled for this crate because test
//! utilities may not be used by all tests, and the compiler cannot detect
//! usage across crate boundaries in development dependencies.

#![allow(clippy::dead_code)]

pub mod env;
pub mod git;

pub use env::EnvTestGuard;
pub use git::{GitRepoTestGuard, NestedRepo};
