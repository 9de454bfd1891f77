//! Git repository management for testing
//!
//! This module provides utilities for creating temporary git repositories,
//! linking them together as a submodule hierarchy, and changing the current
//! working directory for testing.

use std::env;
use std::path::{Path, PathBuf};

use git2::{IndexEntry, IndexTime, Oid, Repository as Git2Repository};
use tempfile::TempDir;

/// A test guard that creates a temporary git repository and
/// optionally changes the current working directory to that repository.
/// The original working directory is restored when the guard is dropped.
pub struct GitRepoTestGuard {
  /// The temporary directory containing the git repository
  pub temp_dir: TempDir,
  /// The git repository
  pub repo: Git2Repository,
  /// The original working directory, if changed
  original_dir: Option<PathBuf>,
}

impl GitRepoTestGuard {
  /// Create a new test git repository without changing the current working
  /// directory
  pub fn new() -> Self {
    // Create a temporary directory
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let temp_path = temp_dir.path();

    // Initialize a git repository in the temporary directory
    let repo = Git2Repository::init(temp_path).expect("Failed to initialize git repository");
    set_test_identity(&repo);

    // Verify that the .git directory was created
    assert!(
      temp_path.join(".git").exists(),
      "Git repository was not properly initialized"
    );

    Self {
      temp_dir,
      repo,
      original_dir: None,
    }
  }

  /// Create a new test git repository and change the current working directory
  /// to it
  pub fn new_and_change_dir() -> Self {
    // Create a temporary directory and initialize git repository
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let temp_path = temp_dir.path();

    // Initialize a git repository in the temporary directory
    let repo = Git2Repository::init(temp_path).expect("Failed to initialize git repository");
    set_test_identity(&repo);

    // Verify that the .git directory was created
    assert!(
      temp_path.join(".git").exists(),
      "Git repository was not properly initialized"
    );

    // Save the current directory so we can restore it later
    let original_dir = env::current_dir().expect("Failed to get current directory");

    // Change the current directory to our temporary git repository
    env::set_current_dir(temp_path).expect("Failed to change current directory");

    Self {
      temp_dir,
      repo,
      original_dir: Some(original_dir),
    }
  }

  /// Get the path to the git repository
  pub fn path(&self) -> &Path {
    self.temp_dir.path()
  }

  /// Change the current working directory to the git repository
  /// Returns the original directory so it can be restored later if needed
  pub fn change_dir(&mut self) -> PathBuf {
    // If we've already changed the directory, return early
    if self.original_dir.is_some() {
      return self.original_dir.as_ref().unwrap().clone();
    }

    // Save the current directory so we can restore it later
    let original_dir = env::current_dir().expect("Failed to get current directory");
    self.original_dir = Some(original_dir.clone());

    // Change the current directory to our temporary git repository
    env::set_current_dir(self.temp_dir.path()).expect("Failed to change current directory");

    original_dir
  }

  /// Restore the original working directory if it was changed
  pub fn restore_dir(&mut self) {
    if let Some(original_dir) = self.original_dir.take() {
      env::set_current_dir(original_dir).expect("Failed to restore original directory");
    }
  }

  /// Commit the given file contents on top of HEAD (or as the initial commit
  /// if there is none yet) and return the new commit's sha.
  pub fn commit_file(&self, relative_path: &str, contents: &str, message: &str) -> String {
    let full_path = self.temp_dir.path().join(relative_path);
    if let Some(parent) = full_path.parent() {
      std::fs::create_dir_all(parent).expect("Failed to create parent directory for test file");
    }
    std::fs::write(&full_path, contents).expect("Failed to write test file");

    let mut index = self.repo.index().expect("Failed to open index");
    index
      .add_path(Path::new(relative_path))
      .expect("Failed to stage test file");
    index.write().expect("Failed to write index");
    let tree_oid = index.write_tree().expect("Failed to write tree");
    let tree = self.repo.find_tree(tree_oid).expect("Failed to find tree");

    let signature = git2::Signature::now("Test User", "test@example.com").expect("Failed to build signature");
    let parents = match self.repo.head().ok().and_then(|h| h.peel_to_commit().ok()) {
      Some(parent) => vec![parent],
      None => Vec::new(),
    };
    let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

    let commit_oid = self
      .repo
      .commit(Some("HEAD"), &signature, &signature, message, &tree, &parent_refs)
      .expect("Failed to create commit");

    commit_oid.to_string()
  }

  /// Create a branch pointing at the current HEAD commit.
  pub fn branch_at_head(&self, name: &str) {
    let head_commit = self.repo.head().unwrap().peel_to_commit().unwrap();
    self.repo.branch(name, &head_commit, false).unwrap();
  }

  /// Record `child`'s current HEAD as a submodule gitlink entry at
  /// `path_in_parent` and commit it. Mirrors `git update-index --cacheinfo
  /// 160000 <sha> <path>` followed by a commit, without registering
  /// `.gitmodules` (the hierarchy mapper only reads tree entries, not
  /// `.gitmodules`, for pointer tracking).
  pub fn link_submodule(&self, path_in_parent: &str, child: &GitRepoTestGuard, message: &str) -> String {
    let child_sha = child.repo.head().unwrap().peel_to_commit().unwrap().id();
    self.write_submodule_pointer(path_in_parent, child_sha, message)
  }

  /// Overwrite an existing submodule gitlink entry at `path_in_parent` with
  /// `sha` and commit it.
  pub fn write_submodule_pointer(&self, path_in_parent: &str, sha: Oid, message: &str) -> String {
    let mut index = self.repo.index().expect("Failed to open index");

    let entry = IndexEntry {
      ctime: IndexTime::new(0, 0),
      mtime: IndexTime::new(0, 0),
      dev: 0,
      ino: 0,
      mode: 0o160000,
      uid: 0,
      gid: 0,
      file_size: 0,
      id: sha,
      flags: 0,
      flags_extended: 0,
      path: path_in_parent.as_bytes().to_vec(),
    };
    index.add_frombuffer(&entry, &[]).expect("Failed to stage submodule gitlink");
    index.write().expect("Failed to write index");

    let tree_oid = index.write_tree().expect("Failed to write tree");
    let tree = self.repo.find_tree(tree_oid).expect("Failed to find tree");
    let signature = git2::Signature::now("Test User", "test@example.com").expect("Failed to build signature");
    let parents = match self.repo.head().ok().and_then(|h| h.peel_to_commit().ok()) {
      Some(parent) => vec![parent],
      None => Vec::new(),
    };
    let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

    let commit_oid = self
      .repo
      .commit(Some("HEAD"), &signature, &signature, message, &tree, &parent_refs)
      .expect("Failed to create commit");

    commit_oid.to_string()
  }

  /// Check out an existing local branch, updating the working tree.
  pub fn checkout(&self, branch: &str) {
    checkout_branch(&self.repo, branch);
  }

  /// Register a real nested submodule at `path_in_parent`: write both the
  /// `.gitmodules` entry and the `160000` gitlink tree entry pointing at
  /// `sha`, then commit. Mirrors what `git submodule add` leaves on disk, so
  /// libgit2's submodule enumeration (and the hierarchy mapper) sees it.
  /// Use [`GitRepoTestGuard::write_submodule_pointer`] for later pointer
  /// updates on other branches; it reuses the `.gitmodules` entry this
  /// writes.
  pub fn add_submodule(&self, path_in_parent: &str, sha: Oid, message: &str) -> String {
    let gitmodules_path = self.temp_dir.path().join(".gitmodules");
    let mut contents = std::fs::read_to_string(&gitmodules_path).unwrap_or_default();
    contents.push_str(&format!(
      "[submodule \"{path_in_parent}\"]\n\tpath = {path_in_parent}\n\turl = ./{path_in_parent}\n"
    ));
    std::fs::write(&gitmodules_path, &contents).expect("Failed to write .gitmodules");

    let mut index = self.repo.index().expect("Failed to open index");
    index
      .add_path(Path::new(".gitmodules"))
      .expect("Failed to stage .gitmodules");

    let entry = IndexEntry {
      ctime: IndexTime::new(0, 0),
      mtime: IndexTime::new(0, 0),
      dev: 0,
      ino: 0,
      mode: 0o160000,
      uid: 0,
      gid: 0,
      file_size: 0,
      id: sha,
      flags: 0,
      flags_extended: 0,
      path: path_in_parent.as_bytes().to_vec(),
    };
    index.add_frombuffer(&entry, &[]).expect("Failed to stage submodule gitlink");
    index.write().expect("Failed to write index");

    let tree_oid = index.write_tree().expect("Failed to write tree");
    let tree = self.repo.find_tree(tree_oid).expect("Failed to find tree");
    let signature = git2::Signature::now("Test User", "test@example.com").expect("Failed to build signature");
    let parents = match self.repo.head().ok().and_then(|h| h.peel_to_commit().ok()) {
      Some(parent) => vec![parent],
      None => Vec::new(),
    };
    let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

    self
      .repo
      .commit(Some("HEAD"), &signature, &signature, message, &tree, &parent_refs)
      .expect("Failed to create commit")
      .to_string()
  }
}

/// Shared checkout logic for both [`GitRepoTestGuard`] and [`NestedRepo`]:
/// point HEAD at the branch and sync the working tree to its commit.
fn checkout_branch(repo: &Git2Repository, branch: &str) {
  let reference = format!("refs/heads/{branch}");
  let commit = repo
    .find_branch(branch, git2::BranchType::Local)
    .unwrap()
    .into_reference()
    .peel_to_commit()
    .unwrap();
  repo
    .checkout_tree(commit.as_object(), Some(git2::build::CheckoutBuilder::new().force()))
    .unwrap();
  repo.set_head(&reference).unwrap();
}

impl Default for GitRepoTestGuard {
  fn default() -> Self {
    Self::new()
  }
}

impl GitRepoTestGuard {
  /// Initialize a real, standalone git repository at `path_in_parent` inside
  /// this repo's worktree: its own `.git` directory, not a shared one, so
  /// the hierarchy mapper sees an initialized submodule worktree and
  /// recurses into it. Unlike [`GitRepoTestGuard::link_submodule`], which
  /// only writes the gitlink tree entry, this mirrors what `git submodule
  /// add` leaves on disk.
  pub fn init_nested_submodule(&self, path_in_parent: &str) -> NestedRepo {
    let path = self.temp_dir.path().join(path_in_parent);
    std::fs::create_dir_all(&path).expect("Failed to create nested submodule directory");
    let repo = Git2Repository::init(&path).expect("Failed to initialize nested git repository");
    set_test_identity(&repo);
    NestedRepo { path, repo }
  }
}

/// Set a repo-local commit identity so a shelled-out `git rebase` (which,
/// unlike libgit2 commits made with an explicit `Signature`, reads
/// `user.name`/`user.email` from config) has one to replay commits with, and
/// pin the unborn HEAD to a throwaway branch name so `branch_at_head("main")`
/// never collides with whatever `init.defaultBranch` the host git is
/// configured with.
fn set_test_identity(repo: &Git2Repository) {
  let mut config = repo.config().expect("Failed to open repo config");
  config.set_str("user.name", "Test User").expect("Failed to set user.name");
  config
    .set_str("user.email", "test@example.com")
    .expect("Failed to set user.email");
  repo.set_head("refs/heads/__scratch__").expect("Failed to pin initial HEAD");
}

/// A standalone git repository nested inside a [`GitRepoTestGuard`]'s
/// worktree, used to build real two-level hierarchies for integration
/// tests. Lives inside the parent's `TempDir`, so it's cleaned up with it.
pub struct NestedRepo {
  pub path: PathBuf,
  pub repo: Git2Repository,
}

impl NestedRepo {
  /// Commit the given file contents on top of HEAD (or as the initial commit
  /// if there is none yet) and return the new commit's sha.
  pub fn commit_file(&self, relative_path: &str, contents: &str, message: &str) -> String {
    let full_path = self.path.join(relative_path);
    if let Some(parent) = full_path.parent() {
      std::fs::create_dir_all(parent).expect("Failed to create parent directory for test file");
    }
    std::fs::write(&full_path, contents).expect("Failed to write test file");

    let mut index = self.repo.index().expect("Failed to open index");
    index
      .add_path(Path::new(relative_path))
      .expect("Failed to stage test file");
    index.write().expect("Failed to write index");
    let tree_oid = index.write_tree().expect("Failed to write tree");
    let tree = self.repo.find_tree(tree_oid).expect("Failed to find tree");

    let signature = git2::Signature::now("Test User", "test@example.com").expect("Failed to build signature");
    let parents = match self.repo.head().ok().and_then(|h| h.peel_to_commit().ok()) {
      Some(parent) => vec![parent],
      None => Vec::new(),
    };
    let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

    let commit_oid = self
      .repo
      .commit(Some("HEAD"), &signature, &signature, message, &tree, &parent_refs)
      .expect("Failed to create commit");

    commit_oid.to_string()
  }

  /// Create a branch pointing at the current HEAD commit.
  pub fn branch_at_head(&self, name: &str) {
    let head_commit = self.repo.head().unwrap().peel_to_commit().unwrap();
    self.repo.branch(name, &head_commit, false).unwrap();
  }

  /// Current HEAD commit oid.
  pub fn head_oid(&self) -> Oid {
    self.repo.head().unwrap().peel_to_commit().unwrap().id()
  }

  /// Check out an existing local branch, updating the working tree.
  pub fn checkout(&self, branch: &str) {
    checkout_branch(&self.repo, branch);
  }
}

impl Drop for GitRepoTestGuard {
  fn drop(&mut self) {
    // Restore the original working directory if it was changed
    self.restore_dir();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_new_creates_git_repo() {
    let git_repo = GitRepoTestGuard::new();
    assert!(git_repo.path().join(".git").exists());
  }

  #[test]
  fn test_new_and_change_dir() {
    let original_dir = env::current_dir().unwrap();

    {
      let git_repo = GitRepoTestGuard::new_and_change_dir();
      assert!(git_repo.path().join(".git").exists());

      // Current directory should be the git repo
      assert_eq!(env::current_dir().unwrap(), git_repo.path());
    }

    // After dropping, we should be back in the original directory
    assert_eq!(env::current_dir().unwrap(), original_dir);
  }

  #[test]
  fn test_change_and_restore_dir() {
    let original_dir = env::current_dir().unwrap();

    let mut git_repo = GitRepoTestGuard::new();
    assert!(git_repo.path().join(".git").exists());

    // Change directory
    git_repo.change_dir();
    assert_eq!(env::current_dir().unwrap(), git_repo.path());

    // Restore directory
    git_repo.restore_dir();
    assert_eq!(env::current_dir().unwrap(), original_dir);
  }
}
