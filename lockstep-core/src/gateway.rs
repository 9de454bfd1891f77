//! Repo Gateway: a typed facade over a single repository's git operations.
//!
//! [`RepoGateway`] is the capability set the rest of the core is generic
//! over, so the Orchestrator can run against a real worktree
//! ([`Git2Gateway`]) or a pure in-memory double ([`FakeGateway`]) without any
//! other component knowing the difference. Read operations go through
//! `git2`; operations `git2` doesn't expose equivalently (rebase
//! sequencing, the submodule gitlink write, a force-with-lease push) shell
//! out to the `git` binary the way the same kind of sequencing does
//! elsewhere in this workspace.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use git2::Repository as Git2Repository;

use crate::error::{EnvironmentError, InvocationError, PreconditionError};
use crate::model::{CommitSha, ConflictSet, RelPath, RepoId, SubmoduleConflictEntry};

/// `BranchName | DETACHED`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurrentBranch {
  On(String),
  Detached,
}

/// Outcome of starting or continuing a rebase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseOutcome {
  Completed,
  Stopped,
  Failed,
}

/// The narrow set of git operations the core needs, serialized per-repo: no
/// two of these run concurrently against the same gateway (see the
/// concurrency model in `orchestrator.rs`).
pub trait RepoGateway {
  fn current_branch(&self) -> Result<CurrentBranch>;
  fn is_clean(&self) -> Result<bool>;
  fn branch_exists_local(&self, name: &str) -> Result<bool>;
  fn branch_exists_remote(&self, name: &str, remote: &str) -> Result<bool>;
  fn create_local_from_remote(&self, name: &str, remote: &str) -> Result<()>;
  fn checkout(&self, branch: &str) -> Result<()>;
  fn rev_parse(&self, reference: &str) -> Result<CommitSha>;
  fn commits_between(&self, target: &str, source: &str) -> Result<Vec<CommitSha>>;
  /// The submodule gitlink entry at `path` as recorded on `branch`'s tip,
  /// without checking it out. Backs auto-discovery's `diff target..source --
  /// <path>` comparison.
  fn submodule_pointer_on_branch(&self, path: &str, branch: &str) -> Result<Option<CommitSha>>;
  fn rebase_start(&self, source: &str, onto: &str) -> Result<RebaseOutcome>;
  fn rebase_continue(&self) -> Result<RebaseOutcome>;
  fn rebase_abort(&self) -> Result<()>;
  fn index_conflicts(&self) -> Result<ConflictSet>;
  fn stage_path(&self, path: &str) -> Result<()>;
  fn write_submodule_pointer(&self, path: &str, sha: &str) -> Result<()>;
  fn create_backup_branch(&self, name: &str, at: &str) -> Result<()>;
  fn delete_branch(&self, name: &str, force: bool) -> Result<()>;
  fn force_update_branch(&self, name: &str, to: &str) -> Result<()>;
  fn list_backup_branches(&self) -> Result<Vec<String>>;
  /// `git push --force-with-lease <remote> <branch>`, used by the
  /// force-push offer after a completed session.
  fn push_with_lease(&self, branch: &str, remote: &str) -> Result<()>;
}

/// Production gateway over one repository's worktree.
pub struct Git2Gateway {
  id: RepoId,
  /// Relative path from the hierarchy root; "" for the root itself. Carried
  /// alongside `id` purely so errors raised from this repo can name it by
  /// path rather than by arena index.
  rel_path: RelPath,
  worktree_path: PathBuf,
  repo: Git2Repository,
}

impl Git2Gateway {
  /// `id`/`rel_path` are the gateway's own node in the hierarchy, used to
  /// identify it in errors raised from this repo (invocation failures, a
  /// dirty worktree on checkout).
  pub fn open<P: AsRef<Path>>(id: RepoId, rel_path: impl Into<RelPath>, worktree_path: P) -> Result<Self> {
    let worktree_path = worktree_path.as_ref().to_path_buf();
    let repo = Git2Repository::open(&worktree_path)
      .map_err(|_| EnvironmentError::NotAGitRepo(worktree_path.clone()))?;
    Ok(Self {
      id,
      rel_path: rel_path.into(),
      worktree_path,
      repo,
    })
  }

  /// The hierarchy-relative path of this repo, or `"."` for the root.
  fn display_path(&self) -> &str {
    if self.rel_path.is_empty() { "." } else { &self.rel_path }
  }

  fn git(&self, args: &[&str]) -> Result<GitOutput> {
    let output = Command::new(crate::consts::GIT_EXECUTABLE)
      .args(args)
      .current_dir(&self.worktree_path)
      .output()
      .map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
          anyhow!(EnvironmentError::GitBinaryMissing)
        } else {
          anyhow::Error::new(err).context(format!("failed to execute git {args:?}"))
        }
      })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    Ok(GitOutput {
      success: output.status.success(),
      stdout,
      stderr,
    })
  }

  fn invocation_failed(&self, command: &str, stderr: String) -> anyhow::Error {
    anyhow!(InvocationError {
      repo: self.id,
      command: command.to_string(),
      stderr,
    })
    .context(format!("repo path: {}", self.display_path()))
  }
}

struct GitOutput {
  success: bool,
  stdout: String,
  stderr: String,
}

impl RepoGateway for Git2Gateway {
  fn current_branch(&self) -> Result<CurrentBranch> {
    let head = self.repo.head().context("failed to read HEAD")?;
    if head.is_branch() {
      Ok(CurrentBranch::On(
        head.shorthand().unwrap_or("HEAD").to_string(),
      ))
    } else {
      Ok(CurrentBranch::Detached)
    }
  }

  fn is_clean(&self) -> Result<bool> {
    if self.worktree_path.join(".git").join("rebase-merge").exists()
      || self.worktree_path.join(".git").join("rebase-apply").exists()
    {
      return Ok(false);
    }

    let mut opts = git2::StatusOptions::new();
    opts.include_untracked(true).renames_head_to_index(true);
    let statuses = self.repo.statuses(Some(&mut opts))?;
    Ok(statuses.is_empty())
  }

  fn branch_exists_local(&self, name: &str) -> Result<bool> {
    Ok(self.repo.find_branch(name, git2::BranchType::Local).is_ok())
  }

  fn branch_exists_remote(&self, name: &str, remote: &str) -> Result<bool> {
    let qualified = format!("{remote}/{name}");
    Ok(self.repo.find_branch(&qualified, git2::BranchType::Remote).is_ok())
  }

  fn create_local_from_remote(&self, name: &str, remote: &str) -> Result<()> {
    let qualified = format!("{remote}/{name}");
    let remote_branch = self
      .repo
      .find_branch(&qualified, git2::BranchType::Remote)
      .with_context(|| format!("remote branch '{qualified}' not found"))?;
    let commit = remote_branch.into_reference().peel_to_commit()?;
    self.repo.branch(name, &commit, false)?;
    Ok(())
  }

  fn checkout(&self, branch: &str) -> Result<()> {
    if !self.is_clean()? {
      return Err(
        anyhow!(PreconditionError::DirtyWorktree { repo: self.id }).context(format!("repo path: {}", self.display_path())),
      );
    }
    crate::git::branches::checkout_branch(&self.repo, branch)
  }

  fn rev_parse(&self, reference: &str) -> Result<CommitSha> {
    let object = self.repo.revparse_single(reference)?;
    Ok(object.peel_to_commit()?.id().to_string())
  }

  fn commits_between(&self, target: &str, source: &str) -> Result<Vec<CommitSha>> {
    let target_oid = self.repo.revparse_single(target)?.peel_to_commit()?.id();
    let source_oid = self.repo.revparse_single(source)?.peel_to_commit()?.id();

    let mut walk = self.repo.revwalk()?;
    walk.push(source_oid)?;
    walk.hide(target_oid)?;
    walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::REVERSE)?;

    let mut shas = Vec::new();
    for oid in walk {
      shas.push(oid?.to_string());
    }
    Ok(shas)
  }

  fn submodule_pointer_on_branch(&self, path: &str, branch: &str) -> Result<Option<CommitSha>> {
    let commit = self.repo.find_branch(branch, git2::BranchType::Local)?.into_reference().peel_to_commit()?;
    let tree = commit.tree()?;
    match tree.get_path(Path::new(path)) {
      Ok(entry) if entry.filemode() == 0o160000 => Ok(Some(entry.id().to_string())),
      Ok(_) | Err(_) => Ok(None),
    }
  }

  fn rebase_start(&self, source: &str, onto: &str) -> Result<RebaseOutcome> {
    self.checkout(source)?;
    let result = self.git(&["rebase", "--onto", onto, target_merge_base(onto).as_str(), source])?;
    classify_rebase_result(&result)
  }

  fn rebase_continue(&self) -> Result<RebaseOutcome> {
    let result = self.git(&["rebase", "--continue"])?;
    classify_rebase_result(&result)
  }

  fn rebase_abort(&self) -> Result<()> {
    self.git(&["rebase", "--abort"])?;
    Ok(())
  }

  fn index_conflicts(&self) -> Result<ConflictSet> {
    let index = self.repo.index()?;
    let mut submodule_entries = Vec::new();
    let mut file_entries = Vec::new();
    let mut by_path: HashMap<String, Vec<(i32, u32, git2::Oid)>> = HashMap::new();

    for entry in index.iter() {
      let stage = (entry.flags >> git2::IndexEntryFlag::STAGEMASK.bits()) as i32 & 0x3;
      if stage == 0 {
        continue;
      }
      let path = String::from_utf8_lossy(&entry.path).into_owned();
      by_path.entry(path).or_default().push((stage, entry.mode, entry.id));
    }

    for (path, stages) in by_path {
      let ours = stages.iter().find(|(s, ..)| *s == 2);
      let theirs = stages.iter().find(|(s, ..)| *s == 3);
      let is_submodule = stages.iter().any(|(_, mode, _)| *mode == 0o160000);

      if is_submodule {
        submodule_entries.push(SubmoduleConflictEntry {
          path,
          ours_sha: ours.map(|(_, _, id)| id.to_string()).unwrap_or_default(),
          theirs_sha: theirs.map(|(_, _, id)| id.to_string()).unwrap_or_default(),
        });
      } else {
        file_entries.push(path);
      }
    }

    Ok(ConflictSet {
      submodule_entries,
      file_entries,
    })
  }

  fn stage_path(&self, path: &str) -> Result<()> {
    let mut index = self.repo.index()?;
    index.add_path(Path::new(path))?;
    index.write()?;
    Ok(())
  }

  fn write_submodule_pointer(&self, path: &str, sha: &str) -> Result<()> {
    let result = self.git(&["update-index", "--cacheinfo", "160000", sha, path])?;
    if !result.success {
      return Err(self.invocation_failed("update-index --cacheinfo", result.stderr));
    }
    Ok(())
  }

  fn create_backup_branch(&self, name: &str, at: &str) -> Result<()> {
    let result = self.git(&["branch", name, at])?;
    if !result.success {
      return Err(self.invocation_failed("branch", result.stderr));
    }
    Ok(())
  }

  fn delete_branch(&self, name: &str, force: bool) -> Result<()> {
    let flag = if force { "-D" } else { "-d" };
    let result = self.git(&["branch", flag, name])?;
    if !result.success {
      return Err(self.invocation_failed("branch -d", result.stderr));
    }
    Ok(())
  }

  fn force_update_branch(&self, name: &str, to: &str) -> Result<()> {
    let result = self.git(&["update-ref", &format!("refs/heads/{name}"), to])?;
    if !result.success {
      return Err(self.invocation_failed("update-ref", result.stderr));
    }
    Ok(())
  }

  fn list_backup_branches(&self) -> Result<Vec<String>> {
    let branches = self.repo.branches(Some(git2::BranchType::Local))?;
    let mut names = Vec::new();
    for branch_result in branches {
      let (branch, _) = branch_result?;
      if let Some(name) = branch.name()?
        && name.starts_with("lockstep/backup/")
      {
        names.push(name.to_string());
      }
    }
    Ok(names)
  }

  fn push_with_lease(&self, branch: &str, remote: &str) -> Result<()> {
    let result = self.git(&["push", "--force-with-lease", remote, branch])?;
    if !result.success {
      return Err(self.invocation_failed("push --force-with-lease", result.stderr));
    }
    Ok(())
  }
}

/// `rebase --onto` needs an explicit upstream boundary; using `onto` itself
/// keeps the replayed range equal to `commits_between(onto, source)`.
fn target_merge_base(onto: &str) -> String {
  onto.to_string()
}

fn classify_rebase_result(result: &GitOutput) -> Result<RebaseOutcome> {
  if result.stdout.contains("CONFLICT") || result.stderr.contains("CONFLICT") {
    return Ok(RebaseOutcome::Stopped);
  }
  if result.success {
    Ok(RebaseOutcome::Completed)
  } else {
    Ok(RebaseOutcome::Failed)
  }
}

/// A single scripted step in a [`FakeGateway`]'s rebase timeline: either the
/// step lands cleanly (producing a new commit) or it stops with a given
/// conflict set.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
  Lands { new_sha: CommitSha },
  Stops { conflicts: ConflictSet },
}

/// Pure in-memory double for [`RepoGateway`], driven by a scripted rebase
/// timeline instead of a real worktree. Used by component tests for the
/// Orchestrator and Resolver so the scenarios in the testable-properties
/// section run without shelling to git.
pub struct FakeGateway {
  pub current_branch: std::cell::RefCell<CurrentBranch>,
  pub clean: std::cell::RefCell<bool>,
  pub local_branches: std::cell::RefCell<HashMap<String, CommitSha>>,
  pub remote_branches: std::cell::RefCell<HashMap<String, CommitSha>>,
  pub rebase_timeline: std::cell::RefCell<Vec<ScriptedStep>>,
  pub staged_submodule_pointers: std::cell::RefCell<HashMap<RelPath, CommitSha>>,
  pub backup_branches: std::cell::RefCell<HashMap<String, CommitSha>>,
  pub pending_conflicts: std::cell::RefCell<Option<ConflictSet>>,
  /// Branches `push_with_lease` was called for, in call order.
  pub pushed_branches: std::cell::RefCell<Vec<String>>,
  /// `(path, branch) -> recorded sha`, the fake's substitute for reading a
  /// submodule gitlink entry off an arbitrary branch's tree.
  pub submodule_pointers_by_branch: std::cell::RefCell<HashMap<(RelPath, String), CommitSha>>,
}

impl FakeGateway {
  pub fn new() -> Self {
    Self {
      current_branch: std::cell::RefCell::new(CurrentBranch::On("main".to_string())),
      clean: std::cell::RefCell::new(true),
      local_branches: std::cell::RefCell::new(HashMap::new()),
      remote_branches: std::cell::RefCell::new(HashMap::new()),
      rebase_timeline: std::cell::RefCell::new(Vec::new()),
      staged_submodule_pointers: std::cell::RefCell::new(HashMap::new()),
      backup_branches: std::cell::RefCell::new(HashMap::new()),
      pending_conflicts: std::cell::RefCell::new(None),
      submodule_pointers_by_branch: std::cell::RefCell::new(HashMap::new()),
      pushed_branches: std::cell::RefCell::new(Vec::new()),
    }
  }

  pub fn with_branch(self, name: &str, tip: &str) -> Self {
    self.local_branches.borrow_mut().insert(name.to_string(), tip.to_string());
    self
  }

  pub fn with_submodule_pointer_on_branch(self, path: &str, branch: &str, sha: &str) -> Self {
    self
      .submodule_pointers_by_branch
      .borrow_mut()
      .insert((path.to_string(), branch.to_string()), sha.to_string());
    self
  }

  pub fn with_remote_branch(self, name: &str, tip: &str) -> Self {
    self
      .remote_branches
      .borrow_mut()
      .insert(name.to_string(), tip.to_string());
    self
  }

  pub fn with_timeline(self, steps: Vec<ScriptedStep>) -> Self {
    *self.rebase_timeline.borrow_mut() = steps;
    self
  }

  pub fn with_dirty(self) -> Self {
    *self.clean.borrow_mut() = false;
    self
  }
}

impl Default for FakeGateway {
  fn default() -> Self {
    Self::new()
  }
}

impl RepoGateway for FakeGateway {
  fn current_branch(&self) -> Result<CurrentBranch> {
    Ok(self.current_branch.borrow().clone())
  }

  fn is_clean(&self) -> Result<bool> {
    Ok(*self.clean.borrow())
  }

  fn branch_exists_local(&self, name: &str) -> Result<bool> {
    Ok(self.local_branches.borrow().contains_key(name))
  }

  fn branch_exists_remote(&self, name: &str, _remote: &str) -> Result<bool> {
    Ok(self.remote_branches.borrow().contains_key(name))
  }

  fn create_local_from_remote(&self, name: &str, _remote: &str) -> Result<()> {
    let tip = self
      .remote_branches
      .borrow()
      .get(name)
      .cloned()
      .ok_or_else(|| anyhow!("remote branch '{name}' not found"))?;
    self.local_branches.borrow_mut().insert(name.to_string(), tip);
    Ok(())
  }

  fn checkout(&self, branch: &str) -> Result<()> {
    if !self.local_branches.borrow().contains_key(branch) {
      return Err(anyhow!(PreconditionError::BranchMissing {
        repo: crate::model::RepoId(0),
        branch: branch.to_string(),
      }));
    }
    *self.current_branch.borrow_mut() = CurrentBranch::On(branch.to_string());
    Ok(())
  }

  fn rev_parse(&self, reference: &str) -> Result<CommitSha> {
    if reference == "HEAD" {
      return match &*self.current_branch.borrow() {
        CurrentBranch::On(branch) => self
          .local_branches
          .borrow()
          .get(branch)
          .cloned()
          .ok_or_else(|| anyhow!("current branch '{branch}' has no recorded tip")),
        CurrentBranch::Detached => Err(anyhow!("HEAD is detached")),
      };
    }
    self
      .local_branches
      .borrow()
      .get(reference)
      .or_else(|| self.backup_branches.borrow().get(reference))
      .cloned()
      .ok_or_else(|| anyhow!("unknown ref '{reference}'"))
  }

  fn commits_between(&self, _target: &str, _source: &str) -> Result<Vec<CommitSha>> {
    Ok(
      self
        .rebase_timeline
        .borrow()
        .iter()
        .filter_map(|step| match step {
          ScriptedStep::Lands { new_sha } => Some(new_sha.clone()),
          ScriptedStep::Stops { .. } => None,
        })
        .collect(),
    )
  }

  fn submodule_pointer_on_branch(&self, path: &str, branch: &str) -> Result<Option<CommitSha>> {
    Ok(
      self
        .submodule_pointers_by_branch
        .borrow()
        .get(&(path.to_string(), branch.to_string()))
        .cloned(),
    )
  }

  fn rebase_start(&self, source: &str, _onto: &str) -> Result<RebaseOutcome> {
    self.checkout(source)?;
    self.advance()
  }

  fn rebase_continue(&self) -> Result<RebaseOutcome> {
    *self.pending_conflicts.borrow_mut() = None;
    self.advance()
  }

  fn rebase_abort(&self) -> Result<()> {
    *self.pending_conflicts.borrow_mut() = None;
    self.rebase_timeline.borrow_mut().clear();
    Ok(())
  }

  fn index_conflicts(&self) -> Result<ConflictSet> {
    Ok(self.pending_conflicts.borrow().clone().unwrap_or_default())
  }

  fn stage_path(&self, _path: &str) -> Result<()> {
    Ok(())
  }

  fn write_submodule_pointer(&self, path: &str, sha: &str) -> Result<()> {
    self
      .staged_submodule_pointers
      .borrow_mut()
      .insert(path.to_string(), sha.to_string());
    Ok(())
  }

  fn create_backup_branch(&self, name: &str, at: &str) -> Result<()> {
    let mut backups = self.backup_branches.borrow_mut();
    if backups.contains_key(name) {
      return Err(anyhow!("backup branch '{name}' already exists"));
    }
    backups.insert(name.to_string(), at.to_string());
    Ok(())
  }

  fn delete_branch(&self, name: &str, _force: bool) -> Result<()> {
    self.local_branches.borrow_mut().remove(name);
    self.backup_branches.borrow_mut().remove(name);
    Ok(())
  }

  fn force_update_branch(&self, name: &str, to: &str) -> Result<()> {
    self.local_branches.borrow_mut().insert(name.to_string(), to.to_string());
    Ok(())
  }

  fn list_backup_branches(&self) -> Result<Vec<String>> {
    Ok(self.backup_branches.borrow().keys().cloned().collect())
  }

  fn push_with_lease(&self, branch: &str, _remote: &str) -> Result<()> {
    if !self.local_branches.borrow().contains_key(branch) {
      return Err(anyhow!("unknown branch '{branch}'"));
    }
    self.pushed_branches.borrow_mut().push(branch.to_string());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use lockstep_test_utils::GitRepoTestGuard;

  use super::*;
  use crate::model::RepoId;

  fn open(guard: &GitRepoTestGuard) -> Git2Gateway {
    Git2Gateway::open(RepoId(0), "", guard.path()).unwrap()
  }

  #[test]
  fn open_rejects_non_git_directory() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let err = Git2Gateway::open(RepoId(0), "", temp_dir.path()).unwrap_err();
    assert!(err.downcast_ref::<EnvironmentError>().is_some());
  }

  #[test]
  fn current_branch_reports_head_shorthand() {
    let guard = GitRepoTestGuard::new();
    guard.commit_file("a.txt", "one", "initial");
    let gateway = open(&guard);

    let branch = gateway.current_branch().unwrap();
    assert!(matches!(branch, CurrentBranch::On(_)));
  }

  #[test]
  fn is_clean_reflects_worktree_state() {
    let guard = GitRepoTestGuard::new();
    guard.commit_file("a.txt", "one", "initial");
    let gateway = open(&guard);
    assert!(gateway.is_clean().unwrap());

    std::fs::write(guard.path().join("a.txt"), "two").unwrap();
    assert!(!gateway.is_clean().unwrap());
  }

  #[test]
  fn checkout_refuses_on_dirty_worktree() {
    let guard = GitRepoTestGuard::new();
    guard.commit_file("a.txt", "one", "initial");
    guard.branch_at_head("feature");
    std::fs::write(guard.path().join("a.txt"), "uncommitted").unwrap();

    let gateway = open(&guard);
    let err = gateway.checkout("feature").unwrap_err();
    let precondition = err.downcast_ref::<PreconditionError>().expect("expected PreconditionError");
    assert!(matches!(precondition, PreconditionError::DirtyWorktree { repo } if *repo == RepoId(0)));
  }

  #[test]
  fn checkout_switches_branch_and_stays_clean() {
    let guard = GitRepoTestGuard::new();
    guard.commit_file("a.txt", "one", "initial");
    guard.branch_at_head("feature");

    let gateway = open(&guard);
    gateway.checkout("feature").unwrap();
    assert_eq!(gateway.current_branch().unwrap(), CurrentBranch::On("feature".to_string()));
    assert!(gateway.is_clean().unwrap());
  }

  #[test]
  fn rev_parse_and_commits_between_track_new_commits() {
    let guard = GitRepoTestGuard::new();
    let base = guard.commit_file("a.txt", "one", "base");
    guard.branch_at_head("feature");
    let tip = guard.commit_file("a.txt", "two", "on feature");

    let gateway = open(&guard);
    assert_eq!(gateway.rev_parse("HEAD").unwrap(), tip);

    let shas = gateway.commits_between(&base, &tip).unwrap();
    assert_eq!(shas, vec![tip]);
  }

  #[test]
  fn backup_branches_are_created_listed_and_deleted() {
    let guard = GitRepoTestGuard::new();
    let tip = guard.commit_file("a.txt", "one", "initial");
    let gateway = open(&guard);

    gateway.create_backup_branch("lockstep/backup/main/sess1", &tip).unwrap();
    assert_eq!(
      gateway.list_backup_branches().unwrap(),
      vec!["lockstep/backup/main/sess1".to_string()]
    );

    gateway.delete_branch("lockstep/backup/main/sess1", true).unwrap();
    assert!(gateway.list_backup_branches().unwrap().is_empty());
  }

  #[test]
  fn invocation_failure_reports_the_originating_repo() {
    let guard = GitRepoTestGuard::new();
    guard.commit_file("a.txt", "one", "initial");
    let gateway = Git2Gateway::open(RepoId(3), "libs/c", guard.path()).unwrap();

    let err = gateway.delete_branch("does-not-exist", false).unwrap_err();
    let invocation = err.downcast_ref::<InvocationError>().expect("expected InvocationError");
    assert_eq!(invocation.repo, RepoId(3));
  }
}

impl FakeGateway {
  fn advance(&self) -> Result<RebaseOutcome> {
    let mut timeline = self.rebase_timeline.borrow_mut();
    if timeline.is_empty() {
      return Ok(RebaseOutcome::Completed);
    }
    match timeline.remove(0) {
      ScriptedStep::Lands { new_sha } => {
        if let CurrentBranch::On(branch) = &*self.current_branch.borrow() {
          self.local_branches.borrow_mut().insert(branch.clone(), new_sha);
        }
        if timeline.is_empty() {
          Ok(RebaseOutcome::Completed)
        } else {
          drop(timeline);
          self.advance()
        }
      }
      ScriptedStep::Stops { conflicts } => {
        *self.pending_conflicts.borrow_mut() = Some(conflicts);
        Ok(RebaseOutcome::Stopped)
      }
    }
  }
}
