//! # lockstep-cli
//!
//! Argument parsing, terminal rendering, logging setup, and the interactive
//! conflict-resolution prompts that drive `lockstep-core`.

pub mod agent;
pub mod cli;
