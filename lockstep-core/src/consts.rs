//! Core constants shared across lockstep-rebase components.

/// Overrides the rotating log file's path (see [`crate::config::ConfigDirs::log_file_path`]).
pub const ENV_LOCKSTEP_REBASE_LOG: &str = "LOCKSTEP_REBASE_LOG";

/// Prefix every session backup branch is namespaced under.
pub const BACKUP_BRANCH_PREFIX: &str = "lockstep/backup";

/// Platform-specific Git executable name.
#[cfg(windows)]
#[cfg_attr(not(windows), allow(dead_code))]
pub const GIT_EXECUTABLE: &str = "git.exe";

/// Platform-specific Git executable name.
#[cfg(not(windows))]
#[cfg_attr(windows, allow(dead_code))]
pub const GIT_EXECUTABLE: &str = "git";
