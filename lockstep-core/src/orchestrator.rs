//! Rebase Orchestrator: plan construction, session backups, bottom-up
//! execution, force-push offer, and restore.
//!
//! The per-task conflict loop is structurally grounded on the teacher's
//! `cli::cascade::rebase_downstream` cascading-rebase loop (topological
//! order, `failed_branches`-style skip propagation, repeated
//! continue/resolve cycle), generalized from "cascade over branch
//! dependents" to "cascade over submodule-hierarchy tasks in post-order".

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use crate::agent::{RemoteBranchDecision, SubmoduleDecision, UserAgent};
use crate::error::{PlanError, PreconditionError, RestoreError};
use crate::gateway::{RebaseOutcome, RepoGateway};
use crate::model::{BackupRef, BranchName, CommitMap, Hierarchy, Plan, RepoId, RepoTask, SessionId};
use crate::resolver::{ConflictResolver, Resolution};

/// How the caller identifies a repo in `--branch-map`/`--include`/`--exclude`:
/// by directory name, by path relative to the hierarchy root, or by absolute
/// path.
#[derive(Debug, Clone)]
pub enum RepoRef {
  Name(String),
  RelPath(String),
  AbsPath(PathBuf),
}

/// A `--branch-map repo=SRC[:TGT]` override.
#[derive(Debug, Clone)]
pub struct BranchOverride {
  pub repo: RepoRef,
  pub source: BranchName,
  pub target: Option<BranchName>,
}

/// Plan inputs, per `spec.md` §6.
#[derive(Debug, Clone)]
pub struct PlanInputs {
  pub global_source: BranchName,
  pub global_target: BranchName,
  pub include: Vec<RepoRef>,
  pub exclude: Vec<RepoRef>,
  pub branch_map: Vec<BranchOverride>,
  pub dry_run: bool,
  pub force: bool,
  pub auto_select_submodules: bool,
  pub offer_force_push: bool,
}

fn resolve_repo_ref(hierarchy: &Hierarchy, reference: &RepoRef) -> Result<RepoId> {
  match reference {
    RepoRef::RelPath(rel) => hierarchy
      .find_by_rel_path(rel)
      .ok_or_else(|| anyhow!("no repo at relative path '{rel}'")),
    RepoRef::AbsPath(path) => hierarchy
      .find_by_abs_path(path)
      .ok_or_else(|| anyhow!("no repo at path '{}'", path.display())),
    RepoRef::Name(name) => {
      let matches = hierarchy.find_by_name(name);
      match matches.as_slice() {
        [] => Err(anyhow!("no repo named '{name}'")),
        [one] => Ok(*one),
        many => Err(anyhow!(PreconditionError::AmbiguousRepoRef {
          reference: name.clone(),
          candidates: many.to_vec(),
        })),
      }
    }
  }
}

/// Ascendants of `repo`, root last, not including `repo` itself.
fn ascendants(hierarchy: &Hierarchy, repo: RepoId) -> Vec<RepoId> {
  let mut chain = Vec::new();
  let mut current = hierarchy.get(repo).parent;
  while let Some(id) = current {
    chain.push(id);
    current = hierarchy.get(id).parent;
  }
  chain
}

/// Build a [`Plan`] from [`PlanInputs`], applying overrides, include/exclude,
/// auto-discovery, and the remote-only-branch flow in that order.
pub fn build_plan(
  hierarchy: &Hierarchy,
  inputs: &PlanInputs,
  gateways: &HashMap<RepoId, Box<dyn RepoGateway>>,
  agent: &dyn UserAgent,
  session_id: SessionId,
) -> Result<Plan> {
  let mut tasks: Vec<RepoTask> = hierarchy
    .execution_order()
    .iter()
    .map(|&repo| RepoTask {
      repo,
      source: inputs.global_source.clone(),
      target: inputs.global_target.clone(),
      enabled: true,
    })
    .collect();

  for over in &inputs.branch_map {
    let repo = resolve_repo_ref(hierarchy, &over.repo)?;
    if let Some(task) = tasks.iter_mut().find(|t| t.repo == repo) {
      task.source = over.source.clone();
      if let Some(target) = &over.target {
        task.target = target.clone();
      }
    }
  }

  if !inputs.include.is_empty() {
    let mut enabled_set = std::collections::HashSet::new();
    for reference in &inputs.include {
      let repo = resolve_repo_ref(hierarchy, reference)?;
      enabled_set.insert(repo);
      for ancestor in ascendants(hierarchy, repo) {
        enabled_set.insert(ancestor);
      }
    }
    for task in &mut tasks {
      task.enabled = enabled_set.contains(&task.repo);
    }
  }

  for reference in &inputs.exclude {
    let repo = resolve_repo_ref(hierarchy, reference)?;
    if let Some(task) = tasks.iter_mut().find(|t| t.repo == repo) {
      task.enabled = false;
    }
  }

  if inputs.auto_select_submodules {
    run_auto_discovery(hierarchy, gateways, agent, &mut tasks)?;
  }

  apply_remote_branch_flow(hierarchy, gateways, agent, &mut tasks)?;

  if !tasks.iter().any(|t| t.enabled) {
    return Err(anyhow!(PlanError::NoEnabledTasks));
  }

  Ok(Plan {
    session_id,
    tasks,
    auto_discovered: inputs.auto_select_submodules,
  })
}

fn run_auto_discovery(
  hierarchy: &Hierarchy,
  gateways: &HashMap<RepoId, Box<dyn RepoGateway>>,
  agent: &dyn UserAgent,
  tasks: &mut [RepoTask],
) -> Result<()> {
  let enabled_repos: Vec<RepoId> = tasks.iter().filter(|t| t.enabled).map(|t| t.repo).collect();

  for repo in enabled_repos {
    let task_source = tasks.iter().find(|t| t.repo == repo).unwrap().source.clone();
    let task_target = tasks.iter().find(|t| t.repo == repo).unwrap().target.clone();
    let Some(gateway) = gateways.get(&repo) else { continue };

    for link in hierarchy.submodules_of(repo) {
      let on_source = gateway.submodule_pointer_on_branch(&link.path_in_parent, &task_source)?;
      let on_target = gateway.submodule_pointer_on_branch(&link.path_in_parent, &task_target)?;
      if on_source == on_target {
        continue;
      }

      let child_task_idx = tasks.iter().position(|t| t.repo == link.child);
      let Some(child_task_idx) = child_task_idx else { continue };
      if tasks[child_task_idx].enabled {
        continue;
      }

      let decision =
        agent.prompt_auto_discovered_submodule(&link.path_in_parent, &task_source, &task_target)?;
      match decision {
        SubmoduleDecision::Exclude => {}
        SubmoduleDecision::Include => {
          tasks[child_task_idx].enabled = true;
        }
        SubmoduleDecision::IncludeWithOverrides { source, target } => {
          tasks[child_task_idx].enabled = true;
          tasks[child_task_idx].source = source;
          tasks[child_task_idx].target = target;
        }
      }
    }
  }
  Ok(())
}

fn apply_remote_branch_flow(
  hierarchy: &Hierarchy,
  gateways: &HashMap<RepoId, Box<dyn RepoGateway>>,
  agent: &dyn UserAgent,
  tasks: &mut [RepoTask],
) -> Result<()> {
  for task in tasks.iter() {
    if !task.enabled {
      continue;
    }
    let Some(gateway) = gateways.get(&task.repo) else { continue };
    let label = hierarchy.get(task.repo).rel_path.clone();

    for branch in [&task.source, &task.target] {
      if gateway.branch_exists_local(branch)? {
        continue;
      }
      if !gateway.branch_exists_remote(branch, "origin")? {
        return Err(anyhow!(PreconditionError::BranchMissing {
          repo: task.repo,
          branch: branch.clone(),
        }));
      }
      match agent.prompt_remote_branch_create(&label, branch, "origin")? {
        RemoteBranchDecision::Create => gateway.create_local_from_remote(branch, "origin")?,
        RemoteBranchDecision::Decline => {
          return Err(anyhow!(PreconditionError::BranchMissing {
            repo: task.repo,
            branch: branch.clone(),
          }));
        }
      }
    }
  }
  Ok(())
}

/// Pre-execution validation: every enabled task's repo is clean, both
/// branches resolvable, no rebase already in progress.
pub fn validate_plan(hierarchy: &Hierarchy, plan: &Plan, gateways: &HashMap<RepoId, Box<dyn RepoGateway>>) -> Result<()> {
  for task in plan.enabled_tasks() {
    let gateway = gateways
      .get(&task.repo)
      .ok_or_else(|| anyhow!("no gateway for {}", hierarchy.get(task.repo).rel_path))?;

    if !gateway.is_clean()? {
      return Err(anyhow!(PreconditionError::DirtyWorktree { repo: task.repo }));
    }
    if !gateway.branch_exists_local(&task.source)? {
      return Err(anyhow!(PreconditionError::BranchMissing {
        repo: task.repo,
        branch: task.source.clone(),
      }));
    }
    if !gateway.branch_exists_local(&task.target)? {
      return Err(anyhow!(PreconditionError::BranchMissing {
        repo: task.repo,
        branch: task.target.clone(),
      }));
    }
  }
  Ok(())
}

/// Outcome of running one repo's rebase task to completion or failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
  Completed,
  Failed,
}

/// Terminal state of a whole session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
  Completed,
  Failed { at_repo: RepoId },
  Aborted,
}

/// Owns the per-task gateways and accumulates commit maps and backups across
/// one session. Not `Sync`/`Send`-sensitive: tasks run strictly one at a
/// time (§5).
pub struct Orchestrator {
  hierarchy: Hierarchy,
  gateways: HashMap<RepoId, Box<dyn RepoGateway>>,
  commit_maps: HashMap<RepoId, CommitMap>,
  backups: Vec<BackupRef>,
  session_id: SessionId,
}

impl Orchestrator {
  pub fn new(hierarchy: Hierarchy, gateways: HashMap<RepoId, Box<dyn RepoGateway>>, session_id: SessionId) -> Self {
    Self {
      hierarchy,
      gateways,
      commit_maps: HashMap::new(),
      backups: Vec::new(),
      session_id,
    }
  }

  pub fn hierarchy(&self) -> &Hierarchy {
    &self.hierarchy
  }

  pub fn backups(&self) -> &[BackupRef] {
    &self.backups
  }

  /// Back up every distinct source branch referenced by an enabled task, at
  /// its current tip. Aborts with no partial state on the first failure.
  pub fn backup(&mut self, plan: &Plan) -> Result<()> {
    let mut created = Vec::new();
    for task in plan.enabled_tasks() {
      let gateway = self
        .gateways
        .get(&task.repo)
        .ok_or_else(|| anyhow!("no gateway for {}", self.hierarchy.get(task.repo).rel_path))?;

      let tip = gateway.rev_parse(&task.source)?;
      let backup_branch = BackupRef::backup_branch_name(&task.source, &plan.session_id);

      gateway
        .create_backup_branch(&backup_branch, &tip)
        .with_context(|| format!("backup branch '{backup_branch}' collides with an existing ref"))?;

      created.push(BackupRef {
        repo: task.repo,
        original_branch: task.source.clone(),
        backup_branch,
        tip_at_backup: tip,
      });
    }
    self.backups.extend(created);
    Ok(())
  }

  /// Run every enabled task in plan order. Stops at the first task that
  /// fails; earlier completed tasks and their backups are left in place.
  pub fn execute(&mut self, plan: &Plan, agent: &dyn UserAgent) -> Result<SessionOutcome> {
    for task in plan.enabled_tasks() {
      let outcome = self.run_task(task, agent)?;
      if outcome == TaskOutcome::Failed {
        return Ok(SessionOutcome::Failed { at_repo: task.repo });
      }
    }
    Ok(SessionOutcome::Completed)
  }

  fn run_task(&mut self, task: &RepoTask, agent: &dyn UserAgent) -> Result<TaskOutcome> {
    let label = self.hierarchy.get(task.repo).rel_path.clone();
    let submodules = self.hierarchy.submodules_of(task.repo).to_vec();
    let gateway = self
      .gateways
      .get(&task.repo)
      .ok_or_else(|| anyhow!("no gateway for {label}"))?
      .as_ref();

    gateway.checkout(&task.source)?;
    let expected_old_shas = gateway.commits_between(&task.target, &task.source)?;
    let mut commit_map = CommitMap::new(expected_old_shas);
    let mut checkpoint = gateway.rev_parse(&task.target)?;

    let mut outcome = gateway.rebase_start(&task.source, &task.target)?;

    loop {
      let new_head = gateway.rev_parse("HEAD")?;
      for landed in gateway.commits_between(&checkpoint, &new_head)? {
        commit_map.record_next(landed);
      }
      checkpoint = new_head;

      match outcome {
        RebaseOutcome::Completed => {
          commit_map.freeze();
          self.commit_maps.insert(task.repo, commit_map);
          return Ok(TaskOutcome::Completed);
        }
        RebaseOutcome::Failed => {
          gateway.rebase_abort().ok();
          return Ok(TaskOutcome::Failed);
        }
        RebaseOutcome::Stopped => {
          let resolver = ConflictResolver::new(task.repo, &submodules, &self.commit_maps);
          let mut resolution = match resolver.handle_stop(gateway) {
            Ok(r) => r,
            Err(_) => {
              gateway.rebase_abort().ok();
              return Ok(TaskOutcome::Failed);
            }
          };
          loop {
            match resolution {
              Resolution::Continued(next) => {
                outcome = next;
                break;
              }
              Resolution::AwaitingHuman { paths } => {
                agent.await_file_conflict_resolution(&label, &paths)?;
                resolution = resolver.retry_after_human(gateway)?;
              }
            }
          }
        }
      }
    }
  }

  /// Push every rewritten source branch with `--force-with-lease` after a
  /// confirmation phrase, when `--offer-force-push` was set.
  pub fn offer_force_push(&self, plan: &Plan, confirmation_phrase: &str, typed: &str) -> Result<Vec<BranchName>> {
    if typed != confirmation_phrase {
      return Ok(Vec::new());
    }
    let mut pushed = Vec::new();
    for task in plan.enabled_tasks() {
      let Some(gateway) = self.gateways.get(&task.repo) else { continue };
      gateway.push_with_lease(&task.source, "origin")?;
      pushed.push(task.source.clone());
    }
    Ok(pushed)
  }

  /// Restore every backup ref belonging to `session_id`, best-effort.
  pub fn restore(gateways: &HashMap<RepoId, Box<dyn RepoGateway>>, backups: &[BackupRef]) -> Vec<Result<()>> {
    backups
      .iter()
      .map(|backup| {
        let gateway = gateways.get(&backup.repo).ok_or_else(|| {
          anyhow!(RestoreError {
            repo: backup.repo,
            original_branch: backup.original_branch.clone(),
          })
        })?;
        gateway.force_update_branch(&backup.original_branch, &backup.tip_at_backup)
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::agent::ScriptedUserAgent;
  use crate::gateway::{FakeGateway, ScriptedStep};
  use crate::model::{RepoInfo, SessionId};

  fn single_repo_hierarchy() -> Hierarchy {
    Hierarchy::new(
      vec![RepoInfo {
        id: RepoId(0),
        parent: None,
        worktree_path: PathBuf::from("/repo"),
        rel_path: String::new(),
        submodules: vec![],
        head_before: None,
        current_branch: None,
        initialized: true,
      }],
      vec![RepoId(0)],
    )
  }

  fn session_id() -> SessionId {
    SessionId::new(chrono::DateTime::from_timestamp(0, 0).unwrap(), "test")
  }

  #[test]
  fn build_plan_rejects_when_nothing_enabled() {
    let hierarchy = single_repo_hierarchy();
    let inputs = PlanInputs {
      global_source: "feat".into(),
      global_target: "main".into(),
      include: vec![],
      exclude: vec![RepoRef::RelPath(String::new())],
      branch_map: vec![],
      dry_run: false,
      force: false,
      auto_select_submodules: false,
      offer_force_push: false,
    };
    let gateways: HashMap<RepoId, Box<dyn RepoGateway>> = HashMap::new();
    let agent = ScriptedUserAgent::new();

    let err = build_plan(&hierarchy, &inputs, &gateways, &agent, session_id()).unwrap_err();
    assert!(err.downcast_ref::<PlanError>().is_some());
  }

  #[test]
  fn execute_runs_clean_rebase_to_completion() {
    let hierarchy = single_repo_hierarchy();
    let gateway = FakeGateway::new()
      .with_branch("feat", "tip_feat")
      .with_branch("main", "tip_main")
      .with_timeline(vec![ScriptedStep::Lands {
        new_sha: "new1".into(),
      }]);

    let mut gateways: HashMap<RepoId, Box<dyn RepoGateway>> = HashMap::new();
    gateways.insert(RepoId(0), Box::new(gateway));

    let mut orchestrator = Orchestrator::new(hierarchy, gateways, session_id());
    let plan = Plan {
      session_id: session_id(),
      tasks: vec![RepoTask {
        repo: RepoId(0),
        source: "feat".into(),
        target: "main".into(),
        enabled: true,
      }],
      auto_discovered: false,
    };

    let agent = ScriptedUserAgent::new();
    let outcome = orchestrator.execute(&plan, &agent).unwrap();
    assert_eq!(outcome, SessionOutcome::Completed);
  }

  #[test]
  fn backup_records_pre_rebase_tips() {
    let hierarchy = single_repo_hierarchy();
    let gateway = FakeGateway::new().with_branch("feat", "tip_feat");
    let mut gateways: HashMap<RepoId, Box<dyn RepoGateway>> = HashMap::new();
    gateways.insert(RepoId(0), Box::new(gateway));

    let mut orchestrator = Orchestrator::new(hierarchy, gateways, session_id());
    let plan = Plan {
      session_id: session_id(),
      tasks: vec![RepoTask {
        repo: RepoId(0),
        source: "feat".into(),
        target: "main".into(),
        enabled: true,
      }],
      auto_discovered: false,
    };

    orchestrator.backup(&plan).unwrap();
    assert_eq!(orchestrator.backups().len(), 1);
    assert_eq!(orchestrator.backups()[0].tip_at_backup, "tip_feat");
  }
}
