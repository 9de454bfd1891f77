//! Data model shared by every component: the repository hierarchy, the
//! execution plan derived from it, and the per-task bookkeeping (commit maps,
//! conflict sets) that flows between them.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// A 40-character git commit hash.
pub type CommitSha = String;

/// A local git branch name.
pub type BranchName = String;

/// A path relative to the hierarchy root, using `/` separators.
pub type RelPath = String;

/// A stable index into a [`Hierarchy`]'s arena. Never reused within one
/// hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoId(pub usize);

impl fmt::Display for RepoId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "repo#{}", self.0)
  }
}

/// A submodule pointer recorded in a parent's tree, linking it to a child
/// node in the same hierarchy.
#[derive(Debug, Clone)]
pub struct SubmoduleLink {
  pub parent: RepoId,
  pub child: RepoId,
  pub path_in_parent: RelPath,
  /// The submodule pointer in the parent's tree on the source branch, at
  /// plan time.
  pub recorded_sha: CommitSha,
}

/// One repository in the hierarchy, as captured at discovery time.
#[derive(Debug, Clone)]
pub struct RepoInfo {
  pub id: RepoId,
  pub parent: Option<RepoId>,
  pub worktree_path: PathBuf,
  /// "" for the hierarchy root.
  pub rel_path: RelPath,
  pub submodules: Vec<SubmoduleLink>,
  /// `None` when the submodule worktree was not initialized at discovery.
  pub head_before: Option<CommitSha>,
  pub current_branch: Option<BranchName>,
  pub initialized: bool,
}

impl RepoInfo {
  pub const fn is_root(&self) -> bool {
    self.parent.is_none()
  }
}

/// A rooted tree of repositories with a total execution order.
///
/// Stored as a flat arena with index-based edges (`RepoId`) rather than
/// owned parent/child pointers, so the tree has no ownership cycles and
/// iteration order is an explicit vector rather than something recomputed
/// by traversal each time.
#[derive(Debug, Clone)]
pub struct Hierarchy {
  nodes: Vec<RepoInfo>,
  /// Post-order: every child strictly before its ancestors, ties broken
  /// lexicographically on relative path.
  execution_order: Vec<RepoId>,
}

impl Hierarchy {
  pub fn new(nodes: Vec<RepoInfo>, execution_order: Vec<RepoId>) -> Self {
    Self { nodes, execution_order }
  }

  pub fn get(&self, id: RepoId) -> &RepoInfo {
    &self.nodes[id.0]
  }

  pub fn nodes(&self) -> &[RepoInfo] {
    &self.nodes
  }

  pub fn execution_order(&self) -> &[RepoId] {
    &self.execution_order
  }

  pub fn root(&self) -> RepoId {
    self
      .nodes
      .iter()
      .find(|n| n.is_root())
      .map(|n| n.id)
      .expect("hierarchy must have exactly one root")
  }

  pub fn find_by_rel_path(&self, rel_path: &str) -> Option<RepoId> {
    self.nodes.iter().find(|n| n.rel_path == rel_path).map(|n| n.id)
  }

  pub fn find_by_abs_path(&self, abs_path: &std::path::Path) -> Option<RepoId> {
    self
      .nodes
      .iter()
      .find(|n| n.worktree_path == abs_path)
      .map(|n| n.id)
  }

  pub fn find_by_name(&self, name: &str) -> Vec<RepoId> {
    self
      .nodes
      .iter()
      .filter(|n| n.worktree_path.file_name().and_then(|f| f.to_str()) == Some(name))
      .map(|n| n.id)
      .collect()
  }

  /// Submodules of `repo` whose parent-side pointer changed between two
  /// commits of the parent's tree, keyed by the submodule's relative path.
  pub fn submodules_of(&self, repo: RepoId) -> &[SubmoduleLink] {
    &self.get(repo).submodules
  }
}

/// The effective rebase to perform in one repository.
#[derive(Debug, Clone)]
pub struct RepoTask {
  pub repo: RepoId,
  pub source: BranchName,
  pub target: BranchName,
  pub enabled: bool,
}

/// A short, time-ordered, locally unique token namespacing backup branches
/// and commit-map bookkeeping for one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
  /// `YYYYMMDDThhmmss-<token>`, where `token` disambiguates sessions started
  /// within the same second.
  pub fn new(now: DateTime<Utc>, token: &str) -> Self {
    Self(format!("{}-{token}", now.format("%Y%m%dT%H%M%S")))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for SessionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<String> for SessionId {
  fn from(value: String) -> Self {
    Self(value)
  }
}

/// An ordered, validated set of per-repository rebase tasks.
#[derive(Debug, Clone)]
pub struct Plan {
  pub session_id: SessionId,
  /// In execution order.
  pub tasks: Vec<RepoTask>,
  pub auto_discovered: bool,
}

impl Plan {
  pub fn enabled_tasks(&self) -> impl Iterator<Item = &RepoTask> {
    self.tasks.iter().filter(|t| t.enabled)
  }

  pub fn task_for(&self, repo: RepoId) -> Option<&RepoTask> {
    self.tasks.iter().find(|t| t.repo == repo)
  }

  pub fn is_enabled(&self, repo: RepoId) -> bool {
    self.task_for(repo).is_some_and(|t| t.enabled)
  }
}

/// A branch's tip captured before any rewrite, so the hierarchy can be
/// restored.
#[derive(Debug, Clone)]
pub struct BackupRef {
  pub repo: RepoId,
  pub original_branch: BranchName,
  pub backup_branch: BranchName,
  pub tip_at_backup: CommitSha,
}

impl BackupRef {
  pub fn backup_branch_name(original_branch: &str, session_id: &SessionId) -> String {
    format!("{}/{original_branch}/{session_id}", crate::consts::BACKUP_BRANCH_PREFIX)
  }
}

/// Per-repo bidirectional map from a pre-rebase commit being replayed to its
/// post-rebase replacement, populated in replay order as the rebase
/// progresses.
#[derive(Debug, Clone, Default)]
pub struct CommitMap {
  /// The old SHAs the rebase is expected to replay, in the order
  /// `commits_between(target, source)` returned them.
  expected_old_shas: Vec<CommitSha>,
  /// How many of `expected_old_shas` have been paired with a new SHA.
  next_index: usize,
  by_old: HashMap<CommitSha, CommitSha>,
  frozen: bool,
}

impl CommitMap {
  pub fn new(expected_old_shas: Vec<CommitSha>) -> Self {
    Self {
      expected_old_shas,
      next_index: 0,
      by_old: HashMap::new(),
      frozen: false,
    }
  }

  /// Pair the next unconsumed expected old SHA (in replay order) with
  /// `new_sha`. Called once per commit the rebase actually creates.
  pub fn record_next(&mut self, new_sha: CommitSha) -> Option<&CommitSha> {
    if self.frozen || self.next_index >= self.expected_old_shas.len() {
      return None;
    }
    let old_sha = self.expected_old_shas[self.next_index].clone();
    self.next_index += 1;
    self.by_old.entry(old_sha.clone()).or_insert(new_sha);
    self.by_old.get(&old_sha)
  }

  pub fn get(&self, old_sha: &str) -> Option<&CommitSha> {
    self.by_old.get(old_sha)
  }

  pub fn freeze(&mut self) {
    self.frozen = true;
  }

  pub const fn is_frozen(&self) -> bool {
    self.frozen
  }

  pub fn len(&self) -> usize {
    self.by_old.len()
  }

  pub fn is_empty(&self) -> bool {
    self.by_old.is_empty()
  }

  pub fn expected_len(&self) -> usize {
    self.expected_old_shas.len()
  }
}

/// A submodule pointer conflict at a rebase stop: `path`'s gitlink entry has
/// two candidate SHAs, one from each side of the rebase.
#[derive(Debug, Clone)]
pub struct SubmoduleConflictEntry {
  pub path: RelPath,
  pub ours_sha: CommitSha,
  pub theirs_sha: CommitSha,
}

/// The unmerged state of a repository's index at a rebase stop.
#[derive(Debug, Clone, Default)]
pub struct ConflictSet {
  pub submodule_entries: Vec<SubmoduleConflictEntry>,
  pub file_entries: Vec<RelPath>,
}

impl ConflictSet {
  pub fn is_clean(&self) -> bool {
    self.submodule_entries.is_empty() && self.file_entries.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn commit_map_pairs_in_replay_order() {
    let mut map = CommitMap::new(vec!["old1".into(), "old2".into()]);
    map.record_next("new1".into());
    map.record_next("new2".into());

    assert_eq!(map.get("old1"), Some(&"new1".to_string()));
    assert_eq!(map.get("old2"), Some(&"new2".to_string()));
    assert_eq!(map.len(), 2);
    assert_eq!(map.expected_len(), 2);
  }

  #[test]
  fn commit_map_ignores_records_past_expected_len() {
    let mut map = CommitMap::new(vec!["old1".into()]);
    assert!(map.record_next("new1".into()).is_some());
    assert!(map.record_next("new2".into()).is_none());
    assert_eq!(map.len(), 1);
  }

  #[test]
  fn commit_map_frozen_rejects_further_records() {
    let mut map = CommitMap::new(vec!["old1".into()]);
    map.freeze();
    assert!(map.record_next("new1".into()).is_none());
    assert!(map.is_frozen());
  }

  #[test]
  fn backup_branch_name_matches_convention() {
    let session = SessionId::new(Utc::now(), "abcd");
    let name = BackupRef::backup_branch_name("feat", &session);
    assert!(name.starts_with("lockstep/backup/feat/"));
  }

  #[test]
  fn plan_enabled_tasks_filters_disabled() {
    let plan = Plan {
      session_id: SessionId::new(Utc::now(), "abcd"),
      tasks: vec![
        RepoTask {
          repo: RepoId(0),
          source: "feat".into(),
          target: "main".into(),
          enabled: true,
        },
        RepoTask {
          repo: RepoId(1),
          source: "feat".into(),
          target: "main".into(),
          enabled: false,
        },
      ],
      auto_discovered: false,
    };

    assert_eq!(plan.enabled_tasks().count(), 1);
    assert!(plan.is_enabled(RepoId(0)));
    assert!(!plan.is_enabled(RepoId(1)));
  }
}
