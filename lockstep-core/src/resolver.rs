//! Conflict Resolver: classifies a rebase stop and auto-resolves submodule
//! pointer conflicts using a child repository's Commit Tracker, handing
//! anything else back to the human.
//!
//! Grounded on the continue/abort/skip conflict loop shape in the teacher's
//! `rebase_common::handle_rebase_conflict`/`attempt_rebase_continue`, widened
//! from a plain yes/no prompt to the submodule-first auto-resolve model.

use std::collections::HashMap;

use anyhow::Result;

use crate::error::RebaseConflict;
use crate::gateway::{RebaseOutcome, RepoGateway};
use crate::model::{CommitMap, CommitSha, ConflictSet, RelPath, RepoId, SubmoduleLink};

/// What the Resolver did with one rebase stop.
pub enum Resolution {
  /// All conflicts were auto-resolved (or there were none); `rebase_continue`
  /// has already been issued and its outcome is attached.
  Continued(RebaseOutcome),
  /// File conflicts remain; the caller must prompt the human and call
  /// [`ConflictResolver::retry_after_human`] once they signal completion.
  AwaitingHuman { paths: Vec<RelPath> },
}

/// Resolves conflicts for one parent repo, consulting the frozen
/// [`CommitMap`]s of its submodules' child repos.
pub struct ConflictResolver<'a> {
  repo: RepoId,
  submodules_by_path: HashMap<RelPath, &'a SubmoduleLink>,
  child_maps: &'a HashMap<RepoId, CommitMap>,
}

impl<'a> ConflictResolver<'a> {
  pub fn new(repo: RepoId, submodules: &'a [SubmoduleLink], child_maps: &'a HashMap<RepoId, CommitMap>) -> Self {
    let submodules_by_path = submodules.iter().map(|s| (s.path_in_parent.clone(), s)).collect();
    Self {
      repo,
      submodules_by_path,
      child_maps,
    }
  }

  /// Handle a fresh `Stopped` outcome: resolve submodule entries first (tie
  /// break per spec), then either continue (no file conflicts) or surface
  /// the file list.
  pub fn handle_stop(&self, gateway: &dyn RepoGateway) -> Result<Resolution> {
    let conflicts = gateway.index_conflicts()?;
    self.resolve_submodules(gateway, &conflicts)?;

    if conflicts.file_entries.is_empty() {
      let outcome = gateway.rebase_continue()?;
      Ok(Resolution::Continued(outcome))
    } else {
      Ok(Resolution::AwaitingHuman {
        paths: conflicts.file_entries,
      })
    }
  }

  /// Called after the human signals they've resolved the file conflicts.
  /// Re-examines the index; refuses to continue if anything is still
  /// unmerged.
  pub fn retry_after_human(&self, gateway: &dyn RepoGateway) -> Result<Resolution> {
    let conflicts = gateway.index_conflicts()?;
    if !conflicts.is_clean() {
      return Ok(Resolution::AwaitingHuman {
        paths: conflicts.file_entries,
      });
    }
    let outcome = gateway.rebase_continue()?;
    Ok(Resolution::Continued(outcome))
  }

  fn resolve_submodules(&self, gateway: &dyn RepoGateway, conflicts: &ConflictSet) -> Result<()> {
    for entry in &conflicts.submodule_entries {
      let link = self.submodules_by_path.get(&entry.path);

      let resolved_sha = match self.lookup_replacement(link, &entry.theirs_sha) {
        Some(sha) => sha,
        // Not in the tracker: only safe to keep `ours_sha` when the submodule
        // wasn't actually touched on the feature side. Any other unmatched
        // case is unresolvable — writing `ours_sha` there would silently
        // discard the feature branch's submodule change.
        None if entry.ours_sha == entry.theirs_sha => entry.ours_sha.clone(),
        None => {
          return Err(anyhow::anyhow!(RebaseConflict::UnresolvableSubmoduleConflict {
            repo: self.repo,
            path: entry.path.clone(),
            ours_sha: entry.ours_sha.clone(),
            theirs_sha: entry.theirs_sha.clone(),
            searched_children: link.map(|l| vec![l.child]).unwrap_or_default(),
          }));
        }
      };

      gateway.write_submodule_pointer(&entry.path, &resolved_sha)?;
      gateway.stage_path(&entry.path)?;
    }
    Ok(())
  }

  fn lookup_replacement(&self, link: Option<&&SubmoduleLink>, theirs_sha: &CommitSha) -> Option<CommitSha> {
    let child = link?.child;
    self.child_maps.get(&child)?.get(theirs_sha).cloned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gateway::FakeGateway;
  use crate::model::SubmoduleConflictEntry;

  fn link(parent: RepoId, child: RepoId, path: &str, recorded: &str) -> SubmoduleLink {
    SubmoduleLink {
      parent,
      child,
      path_in_parent: path.to_string(),
      recorded_sha: recorded.to_string(),
    }
  }

  fn gateway_stopped_at(conflicts: ConflictSet) -> FakeGateway {
    FakeGateway::new()
      .with_branch("feat", "tip_feat")
      .with_branch("main", "tip_main")
      .with_timeline(vec![crate::gateway::ScriptedStep::Stops { conflicts }])
  }

  #[test]
  fn auto_resolves_submodule_conflict_via_child_map() {
    let child = RepoId(0);
    let parent = RepoId(1);
    let links = vec![link(parent, child, "libs/c", "old_sha")];

    let mut map = CommitMap::new(vec!["old_sha".into()]);
    map.record_next("new_sha".into());
    let mut child_maps = HashMap::new();
    child_maps.insert(child, map);

    let gateway = gateway_stopped_at(ConflictSet {
      submodule_entries: vec![SubmoduleConflictEntry {
        path: "libs/c".into(),
        ours_sha: "ours".into(),
        theirs_sha: "old_sha".into(),
      }],
      file_entries: vec![],
    });
    gateway.rebase_start("feat", "main").unwrap();

    let resolver = ConflictResolver::new(parent, &links, &child_maps);
    let resolution = resolver.handle_stop(&gateway).unwrap();

    assert_eq!(
      gateway.staged_submodule_pointers.borrow().get("libs/c"),
      Some(&"new_sha".to_string())
    );
    assert!(matches!(resolution, Resolution::Continued(RebaseOutcome::Completed)));
  }

  #[test]
  fn unknown_submodule_and_empty_ours_is_unresolvable() {
    let parent = RepoId(1);
    let links: Vec<SubmoduleLink> = vec![];
    let child_maps = HashMap::new();

    let gateway = gateway_stopped_at(ConflictSet {
      submodule_entries: vec![SubmoduleConflictEntry {
        path: "libs/c".into(),
        ours_sha: "".into(),
        theirs_sha: "old_sha".into(),
      }],
      file_entries: vec![],
    });
    gateway.rebase_start("feat", "main").unwrap();

    let resolver = ConflictResolver::new(parent, &links, &child_maps);
    let err = resolver.handle_stop(&gateway).unwrap_err();
    assert!(err.downcast_ref::<RebaseConflict>().is_some());
  }

  /// Both sides recorded a real, different submodule commit and the tracker
  /// has no mapping for it: must raise, never silently keep `ours_sha`.
  #[test]
  fn diverging_submodule_pointers_with_no_tracker_match_is_unresolvable() {
    let parent = RepoId(1);
    let links: Vec<SubmoduleLink> = vec![];
    let child_maps = HashMap::new();

    let gateway = gateway_stopped_at(ConflictSet {
      submodule_entries: vec![SubmoduleConflictEntry {
        path: "libs/c".into(),
        ours_sha: "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".into(),
        theirs_sha: "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".into(),
      }],
      file_entries: vec![],
    });
    gateway.rebase_start("feat", "main").unwrap();

    let resolver = ConflictResolver::new(parent, &links, &child_maps);
    let err = resolver.handle_stop(&gateway).unwrap_err();
    let conflict = err.downcast_ref::<RebaseConflict>().expect("expected RebaseConflict");
    assert!(matches!(conflict, RebaseConflict::UnresolvableSubmoduleConflict { .. }));
    assert!(gateway.staged_submodule_pointers.borrow().get("libs/c").is_none());
  }

  /// The submodule wasn't touched on the feature side at all (both sides
  /// agree): keep `ours_sha` even with no tracker entry, per spec's "was not
  /// actually modified on feature" fallback.
  #[test]
  fn matching_ours_and_theirs_keeps_ours_without_tracker() {
    let parent = RepoId(1);
    let links: Vec<SubmoduleLink> = vec![];
    let child_maps = HashMap::new();

    let gateway = gateway_stopped_at(ConflictSet {
      submodule_entries: vec![SubmoduleConflictEntry {
        path: "libs/c".into(),
        ours_sha: "same_sha".into(),
        theirs_sha: "same_sha".into(),
      }],
      file_entries: vec![],
    });
    gateway.rebase_start("feat", "main").unwrap();

    let resolver = ConflictResolver::new(parent, &links, &child_maps);
    let resolution = resolver.handle_stop(&gateway).unwrap();

    assert_eq!(
      gateway.staged_submodule_pointers.borrow().get("libs/c"),
      Some(&"same_sha".to_string())
    );
    assert!(matches!(resolution, Resolution::Continued(RebaseOutcome::Completed)));
  }

  #[test]
  fn file_conflicts_surface_then_continue_after_human() {
    let parent = RepoId(0);
    let links: Vec<SubmoduleLink> = vec![];
    let child_maps = HashMap::new();

    let gateway = gateway_stopped_at(ConflictSet {
      submodule_entries: vec![],
      file_entries: vec!["README.md".into()],
    });
    gateway.rebase_start("feat", "main").unwrap();

    let resolver = ConflictResolver::new(parent, &links, &child_maps);
    let resolution = resolver.handle_stop(&gateway).unwrap();
    assert!(matches!(resolution, Resolution::AwaitingHuman { .. }));

    *gateway.pending_conflicts.borrow_mut() = None;
    let resolution = resolver.retry_after_human(&gateway).unwrap();
    assert!(matches!(resolution, Resolution::Continued(RebaseOutcome::Completed)));
  }
}
