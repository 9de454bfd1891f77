//! Hierarchy Mapper: locating the root of a submodule tree from any working
//! directory and building the ordered [`Hierarchy`] the rest of the core
//! operates on.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use git2::Repository as Git2Repository;

use crate::error::PlanError;
use crate::model::{Hierarchy, RepoId, RepoInfo, SubmoduleLink};

/// A submodule pointer read straight from a repository's tree, before it is
/// resolved to a child [`RepoId`].
struct RawSubmodule {
  path_in_parent: String,
  recorded_sha: String,
  worktree_path: PathBuf,
  initialized: bool,
}

fn read_submodules(repo: &Git2Repository) -> Result<Vec<RawSubmodule>> {
  let mut raw = Vec::new();
  for submodule in repo.submodules()? {
    let path_in_parent = submodule.path().to_string_lossy().replace('\\', "/");
    let Some(sha) = submodule.workdir_id().or_else(|| submodule.head_id()) else {
      continue;
    };
    let worktree_path = repo
      .workdir()
      .ok_or_else(|| anyhow!("repository has no worktree"))?
      .join(&path_in_parent);
    let initialized = worktree_path.join(".git").exists();
    raw.push(RawSubmodule {
      path_in_parent,
      recorded_sha: sha.to_string(),
      worktree_path,
      initialized,
    });
  }
  Ok(raw)
}

/// Walk upward from `start` until we find a directory that is itself not
/// recorded as a submodule of its own parent. That directory is the
/// hierarchy root.
fn find_hierarchy_root(start: &Path) -> Result<PathBuf> {
  let mut candidate = Git2Repository::discover(start)
    .with_context(|| format!("{} is not inside a git repository", start.display()))?
    .workdir()
    .ok_or_else(|| anyhow!("repository has no worktree"))?
    .to_path_buf();

  loop {
    let Some(parent_dir) = candidate.parent() else {
      break;
    };
    let Ok(parent_repo) = Git2Repository::discover(parent_dir) else {
      break;
    };
    let Some(parent_workdir) = parent_repo.workdir() else {
      break;
    };
    let parent_workdir = parent_workdir.to_path_buf();
    if parent_workdir == candidate {
      break;
    }

    let is_recorded_submodule = read_submodules(&parent_repo)?
      .iter()
      .any(|s| s.worktree_path == candidate);
    if !is_recorded_submodule {
      break;
    }
    candidate = parent_workdir;
  }

  Ok(candidate)
}

/// Discover the hierarchy containing `start` and compute its execution
/// order. `start` need not be the root; discovery always walks up first.
pub fn discover(start: &Path) -> Result<Hierarchy> {
  let root_path = find_hierarchy_root(start)?;
  let mut nodes: Vec<RepoInfo> = Vec::new();
  let mut visiting: HashSet<PathBuf> = HashSet::new();

  build_node(&root_path, None, String::new(), &mut nodes, &mut visiting)?;

  let execution_order = compute_execution_order(&nodes);
  Ok(Hierarchy::new(nodes, execution_order))
}

fn build_node(
  worktree_path: &Path,
  parent: Option<RepoId>,
  rel_path: String,
  nodes: &mut Vec<RepoInfo>,
  visiting: &mut HashSet<PathBuf>,
) -> Result<RepoId> {
  let canonical = worktree_path
    .canonicalize()
    .unwrap_or_else(|_| worktree_path.to_path_buf());
  if !visiting.insert(canonical.clone()) {
    return Err(anyhow!(PlanError::CycleDetected { path: rel_path }));
  }

  let id = RepoId(nodes.len());
  // Reserve the slot so `build_node` for children can reference `id` as their
  // parent while we're still constructing this node's submodule list.
  nodes.push(RepoInfo {
    id,
    parent,
    worktree_path: worktree_path.to_path_buf(),
    rel_path: rel_path.clone(),
    submodules: Vec::new(),
    head_before: None,
    current_branch: None,
    initialized: true,
  });

  let repo = Git2Repository::open(worktree_path)
    .with_context(|| format!("failed to open {}", worktree_path.display()))?;

  let head_before = repo
    .head()
    .ok()
    .and_then(|h| h.peel_to_commit().ok())
    .map(|c| c.id().to_string());
  let current_branch = repo
    .head()
    .ok()
    .filter(|h| h.is_branch())
    .and_then(|h| h.shorthand().map(str::to_string));

  nodes[id.0].head_before = head_before;
  nodes[id.0].current_branch = current_branch;

  let raw_submodules = read_submodules(&repo)?;
  let mut links = Vec::with_capacity(raw_submodules.len());
  for raw in raw_submodules {
    if !raw.initialized {
      tracing::warn!(
        path = %raw.path_in_parent,
        "submodule worktree not initialized, skipping recursion"
      );
      continue;
    }
    let child_rel = if rel_path.is_empty() {
      raw.path_in_parent.clone()
    } else {
      format!("{rel_path}/{}", raw.path_in_parent)
    };
    let child_id = build_node(&raw.worktree_path, Some(id), child_rel, nodes, visiting)?;
    links.push(SubmoduleLink {
      parent: id,
      child: child_id,
      path_in_parent: raw.path_in_parent,
      recorded_sha: raw.recorded_sha,
    });
  }
  nodes[id.0].submodules = links;

  visiting.remove(&canonical);
  Ok(id)
}

fn compute_execution_order(nodes: &[RepoInfo]) -> Vec<RepoId> {
  let mut children_by_parent: HashMap<Option<RepoId>, Vec<RepoId>> = HashMap::new();
  for node in nodes {
    children_by_parent.entry(node.parent).or_default().push(node.id);
  }
  for children in children_by_parent.values_mut() {
    children.sort_by_key(|id| nodes[id.0].rel_path.clone());
  }

  let root = nodes
    .iter()
    .find(|n| n.is_root())
    .map(|n| n.id)
    .expect("discover always produces exactly one root");

  let mut order = Vec::with_capacity(nodes.len());
  post_order(root, &children_by_parent, &mut order);
  order
}

fn post_order(id: RepoId, children_by_parent: &HashMap<Option<RepoId>, Vec<RepoId>>, order: &mut Vec<RepoId>) {
  if let Some(children) = children_by_parent.get(&Some(id)) {
    for &child in children {
      post_order(child, children_by_parent, order);
    }
  }
  order.push(id);
}

#[cfg(test)]
mod tests {
  use lockstep_test_utils::GitRepoTestGuard;

  use super::*;

  #[test]
  fn single_repo_hierarchy_has_one_node() {
    let repo = GitRepoTestGuard::new();
    repo.commit_file("README.md", "hello", "initial");

    let hierarchy = discover(repo.path()).unwrap();
    assert_eq!(hierarchy.nodes().len(), 1);
    assert_eq!(hierarchy.execution_order().len(), 1);
    assert!(hierarchy.get(hierarchy.root()).is_root());
  }

  #[test]
  fn parent_with_submodule_orders_child_first() {
    let child = GitRepoTestGuard::new();
    child.commit_file("lib.rs", "fn x() {}", "child initial");

    let parent = GitRepoTestGuard::new();
    parent.commit_file("README.md", "root", "root initial");
    parent.link_submodule("libs/c", &child, "add submodule c");

    // The test fixture doesn't materialize a nested worktree at libs/c, so
    // the mapper must treat the link as discovered-but-uninitialized rather
    // than recursing.
    let hierarchy = discover(parent.path()).unwrap();
    assert_eq!(hierarchy.nodes().len(), 1);
    assert!(hierarchy.get(hierarchy.root()).submodules.is_empty());
  }
}
