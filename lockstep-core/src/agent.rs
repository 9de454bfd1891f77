//! The human-interaction capability the Orchestrator depends on, abstracted
//! so `lockstep-core` has no terminal/CLI dependency of its own. The CLI
//! supplies a `dialoguer`-backed implementation; tests supply a scripted one.

use anyhow::Result;

use crate::model::{BranchName, RelPath};

/// The human's answer to "create a local branch tracking the remote?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteBranchDecision {
  Create,
  Decline,
}

/// The human's answer to an auto-discovered submodule proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmoduleDecision {
  Include,
  Exclude,
  IncludeWithOverrides { source: BranchName, target: BranchName },
}

/// The three events `spec.md` §6 names as the orchestrator's human-interaction
/// contract.
pub trait UserAgent {
  fn prompt_remote_branch_create(&self, repo_label: &str, branch: &str, remote: &str) -> Result<RemoteBranchDecision>;

  fn prompt_auto_discovered_submodule(
    &self,
    submodule_path: &RelPath,
    suggested_source: &BranchName,
    suggested_target: &BranchName,
  ) -> Result<SubmoduleDecision>;

  /// Blocks until the human signals the file conflicts at `paths` in `repo`
  /// are resolved. The orchestrator never trusts this alone: it re-examines
  /// the index afterward.
  fn await_file_conflict_resolution(&self, repo_label: &str, paths: &[RelPath]) -> Result<()>;
}

/// A scripted agent for tests: answers come from a pre-loaded queue, in
/// call order. Panics (test failure) if the queue is exhausted or the
/// wrong decision type is asked for, which makes an unexpected prompt
/// impossible to silently tolerate.
#[derive(Default)]
pub struct ScriptedUserAgent {
  remote_branch_answers: std::cell::RefCell<std::collections::VecDeque<RemoteBranchDecision>>,
  submodule_answers: std::cell::RefCell<std::collections::VecDeque<SubmoduleDecision>>,
  file_conflict_acks: std::cell::RefCell<usize>,
}

impl ScriptedUserAgent {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_remote_branch_answer(self, decision: RemoteBranchDecision) -> Self {
    self.remote_branch_answers.borrow_mut().push_back(decision);
    self
  }

  pub fn with_submodule_answer(self, decision: SubmoduleDecision) -> Self {
    self.submodule_answers.borrow_mut().push_back(decision);
    self
  }
}

impl UserAgent for ScriptedUserAgent {
  fn prompt_remote_branch_create(
    &self,
    _repo_label: &str,
    _branch: &str,
    _remote: &str,
  ) -> Result<RemoteBranchDecision> {
    self
      .remote_branch_answers
      .borrow_mut()
      .pop_front()
      .ok_or_else(|| anyhow::anyhow!("ScriptedUserAgent: no remote-branch answer queued"))
  }

  fn prompt_auto_discovered_submodule(
    &self,
    _submodule_path: &RelPath,
    _suggested_source: &BranchName,
    _suggested_target: &BranchName,
  ) -> Result<SubmoduleDecision> {
    self
      .submodule_answers
      .borrow_mut()
      .pop_front()
      .ok_or_else(|| anyhow::anyhow!("ScriptedUserAgent: no submodule answer queued"))
  }

  fn await_file_conflict_resolution(&self, _repo_label: &str, _paths: &[RelPath]) -> Result<()> {
    *self.file_conflict_acks.borrow_mut() += 1;
    Ok(())
  }
}
