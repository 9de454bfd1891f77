//! # lockstep-core
//!
//! Coordinates a single logical rebase across a tree of git repositories
//! linked by submodule pointers: hierarchy discovery, per-repo commit
//! tracking, submodule-pointer conflict auto-resolution, and orchestration
//! of the bottom-up rebase with session-scoped backups.

pub mod agent;
pub mod config;
pub mod consts;
pub mod error;
pub mod gateway;
pub mod git;
pub mod hierarchy;
pub mod model;
pub mod orchestrator;
pub mod output;
pub mod resolver;

pub use agent::{RemoteBranchDecision, ScriptedUserAgent, SubmoduleDecision, UserAgent};
pub use config::{ConfigDirs, get_config_dirs};
pub use error::{EnvironmentError, InvocationError, PlanError, PreconditionError, RebaseConflict, RestoreError};
pub use gateway::{CurrentBranch, FakeGateway, Git2Gateway, RebaseOutcome, RepoGateway};
pub use hierarchy::discover;
pub use model::{
  BackupRef, BranchName, CommitMap, CommitSha, ConflictSet, Hierarchy, Plan, RelPath, RepoId, RepoInfo, RepoTask,
  SessionId, SubmoduleConflictEntry, SubmoduleLink,
};
pub use orchestrator::{
  BranchOverride, Orchestrator, PlanInputs, RepoRef, SessionOutcome, TaskOutcome, build_plan, validate_plan,
};
pub use output::{ColorMode, get_emoji_or_default, print_error, print_header, print_info, print_plain, print_success, print_warning};
pub use resolver::{ConflictResolver, Resolution};
