//! Error taxonomy.
//!
//! Every failure the core can produce is one of these leaf enums. Only the
//! outermost CLI collaborator converts them into exit codes and messages;
//! every other layer propagates with `?` via [`anyhow::Result`], downcasting
//! where it needs to branch on the concrete kind (the Orchestrator's
//! conflict loop does this for [`RebaseConflict`]).

use std::path::PathBuf;

use thiserror::Error;

use crate::model::{BranchName, CommitSha, RelPath, RepoId};

/// Fatal, pre-plan.
#[derive(Debug, Error)]
pub enum EnvironmentError {
  #[error("{0} is not inside a git repository")]
  NotAGitRepo(PathBuf),
  #[error("git binary not found on PATH")]
  GitBinaryMissing,
}

/// Fatal during validation; no state mutated.
#[derive(Debug, Error)]
pub enum PreconditionError {
  #[error("worktree for {repo} is not clean")]
  DirtyWorktree { repo: RepoId },
  #[error("a rebase is already in progress in {repo}")]
  RebaseInProgress { repo: RepoId },
  #[error("branch '{branch}' does not exist in {repo}")]
  BranchMissing { repo: RepoId, branch: BranchName },
  #[error("'{reference}' is ambiguous: matches {candidates:?}")]
  AmbiguousRepoRef { reference: String, candidates: Vec<RepoId> },
}

/// Fatal during planning.
#[derive(Debug, Error)]
pub enum PlanError {
  #[error("no enabled tasks in plan")]
  NoEnabledTasks,
  #[error("submodule '{path}' in {repo} is not initialized")]
  SubmoduleNotInitialized { repo: RepoId, path: RelPath },
  #[error("submodule cycle detected at '{path}'")]
  CycleDetected { path: RelPath },
}

/// Recoverable; handled by the Conflict Resolver. `FileConflict` is always
/// surfaced to the human. `UnresolvableSubmoduleConflict` is fatal for the
/// session.
#[derive(Debug, Error)]
pub enum RebaseConflict {
  #[error("submodule pointer conflict at '{path}' (ours {ours_sha}, theirs {theirs_sha})")]
  SubmodulePointerConflict {
    path: RelPath,
    ours_sha: CommitSha,
    theirs_sha: CommitSha,
  },
  #[error("file conflicts pending in {repo}: {paths:?}")]
  FileConflict { repo: RepoId, paths: Vec<RelPath> },
  #[error(
    "unresolvable submodule conflict in {repo} at '{path}': ours={ours_sha} theirs={theirs_sha}, searched {searched_children:?}"
  )]
  UnresolvableSubmoduleConflict {
    repo: RepoId,
    path: RelPath,
    ours_sha: CommitSha,
    theirs_sha: CommitSha,
    searched_children: Vec<RepoId>,
  },
}

/// Non-zero git exit with unexpected stderr. Fatal for the current task.
#[derive(Debug, Error)]
#[error("git command failed in {repo} ({command}): {stderr}")]
pub struct InvocationError {
  pub repo: RepoId,
  pub command: String,
  pub stderr: String,
}

/// A repo in the backup set no longer exists, or its ref was deleted.
/// Reported per-repo; restore continues best-effort for the rest.
#[derive(Debug, Error)]
#[error("backup ref for '{original_branch}' in {repo} no longer exists")]
pub struct RestoreError {
  pub repo: RepoId,
  pub original_branch: BranchName,
}
