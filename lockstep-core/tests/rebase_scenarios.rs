//! End-to-end coverage over real nested git repositories: a root repo with
//! one submodule, driven entirely through `discover`, `build_plan`,
//! `validate_plan`, and `Orchestrator` the way the CLI commands do.

use std::collections::HashMap;

use lockstep_core::{
  Git2Gateway, Hierarchy, Orchestrator, PlanInputs, RepoGateway, RepoId, RepoRef, ScriptedUserAgent, SessionId,
  SessionOutcome, build_plan, discover, validate_plan,
};
use lockstep_test_utils::{GitRepoTestGuard, NestedRepo};

struct Fixture {
  root: GitRepoTestGuard,
  child: NestedRepo,
  /// `libs/c`'s `feat` tip before either repo is rebased.
  child_feat_before: String,
  /// The root's `feat` tip before either repo is rebased.
  root_feat_before: String,
}

/// Build a root repo containing a real nested submodule at `libs/c`, with
/// `main` and `feat` branches in both repos that have diverged independently
/// (so rebasing `feat` onto `main` produces new commit SHAs, not a no-op
/// fast-forward) and a genuine submodule-pointer conflict in the root between
/// `main`'s own pointer bump and `feat`'s recorded pointer.
fn two_repo_hierarchy_with_submodule_conflict() -> Fixture {
  let root = GitRepoTestGuard::new();
  root.commit_file("README.md", "root", "root initial");
  let child = root.init_nested_submodule("libs/c");

  let _child_base = child.commit_file("lib.rs", "v1", "child initial");
  let child_base_oid = child.head_oid();
  child.branch_at_head("main");
  child.checkout("main");
  child.branch_at_head("feat");

  child.commit_file("README.md", "child main progress", "child main advances independently");
  let child_main_oid = child.head_oid();

  child.checkout("feat");
  let child_feat_before = child.commit_file("lib.rs", "v2", "child feat advances independently");

  root.add_submodule("libs/c", child_base_oid, "add submodule c");
  root.branch_at_head("main");
  root.checkout("main");
  root.branch_at_head("feat");

  root.write_submodule_pointer("libs/c", child_main_oid, "bump submodule on main");

  root.checkout("feat");
  root.write_submodule_pointer(
    "libs/c",
    git2::Oid::from_str(&child_feat_before).unwrap(),
    "bump submodule on feat",
  );
  let root_feat_before = root.commit_file("README.md", "feat text update", "feat text-only change");

  Fixture {
    root,
    child,
    child_feat_before,
    root_feat_before,
  }
}

fn gateways_for(hierarchy: &Hierarchy) -> HashMap<RepoId, Box<dyn RepoGateway>> {
  let mut gateways: HashMap<RepoId, Box<dyn RepoGateway>> = HashMap::new();
  for node in hierarchy.nodes() {
    let gateway = Git2Gateway::open(node.id, node.rel_path.clone(), &node.worktree_path).unwrap();
    gateways.insert(node.id, Box::new(gateway));
  }
  gateways
}

fn plan_inputs() -> PlanInputs {
  PlanInputs {
    global_source: "feat".into(),
    global_target: "main".into(),
    include: vec![],
    exclude: vec![],
    branch_map: vec![],
    dry_run: false,
    force: false,
    auto_select_submodules: false,
    offer_force_push: false,
  }
}

fn session_id() -> SessionId {
  SessionId::new(chrono::DateTime::from_timestamp(0, 0).unwrap(), "scenario")
}

/// S1: a linear two-level hierarchy with no file conflicts. The child's
/// rebase lands first, the root's submodule-pointer conflict against it is
/// auto-resolved via the child's commit map, and the session completes with
/// the root's pointer correctly updated to the child's post-rebase tip.
#[test]
fn s1_linear_two_level_completes_with_resolved_submodule_pointer() {
  let fixture = two_repo_hierarchy_with_submodule_conflict();
  let hierarchy = discover(fixture.root.path()).unwrap();
  assert_eq!(hierarchy.nodes().len(), 2, "discovery must recurse into the nested submodule");

  let gateways = gateways_for(&hierarchy);
  let agent = ScriptedUserAgent::new();
  let plan = build_plan(&hierarchy, &plan_inputs(), &gateways, &agent, session_id()).unwrap();
  validate_plan(&hierarchy, &plan, &gateways).unwrap();

  let child_id = hierarchy.find_by_rel_path("libs/c").unwrap();
  let root_id = hierarchy.root();

  let mut orchestrator = Orchestrator::new(hierarchy, gateways, session_id());
  orchestrator.backup(&plan).unwrap();
  assert_eq!(orchestrator.backups().len(), 2);

  let outcome = orchestrator.execute(&plan, &agent).unwrap();
  assert_eq!(outcome, SessionOutcome::Completed);

  let hierarchy = orchestrator.hierarchy();
  let child_gateway = Git2Gateway::open(child_id, "libs/c", &hierarchy.get(child_id).worktree_path).unwrap();
  let root_gateway = Git2Gateway::open(root_id, "", &hierarchy.get(root_id).worktree_path).unwrap();

  let child_feat_after = child_gateway.rev_parse("feat").unwrap();
  assert_ne!(
    child_feat_after, fixture.child_feat_before,
    "child's feat commit should be replayed onto its own diverged main, producing a new sha"
  );

  let root_feat_after = root_gateway.rev_parse("feat").unwrap();
  assert_ne!(root_feat_after, fixture.root_feat_before);

  let resolved_pointer = root_gateway.submodule_pointer_on_branch("libs/c", "feat").unwrap();
  assert_eq!(
    resolved_pointer,
    Some(child_feat_after),
    "root's rebased pointer must follow the child's rebased commit, not its own pre-rebase ours/theirs value"
  );
}

/// S3: the submodule is excluded from the plan, so no commit map exists for
/// it when the root hits the same pointer conflict. The conflict is
/// unresolvable, the root's rebase aborts, and the child is left untouched.
#[test]
fn s3_excluded_submodule_makes_root_conflict_unresolvable() {
  let fixture = two_repo_hierarchy_with_submodule_conflict();
  let hierarchy = discover(fixture.root.path()).unwrap();

  let gateways = gateways_for(&hierarchy);
  let agent = ScriptedUserAgent::new();
  let inputs = PlanInputs {
    exclude: vec![RepoRef::RelPath("libs/c".into())],
    ..plan_inputs()
  };
  let plan = build_plan(&hierarchy, &inputs, &gateways, &agent, session_id()).unwrap();
  validate_plan(&hierarchy, &plan, &gateways).unwrap();

  let child_id = hierarchy.find_by_rel_path("libs/c").unwrap();
  let root_id = hierarchy.root();
  assert!(!plan.is_enabled(child_id));
  assert!(plan.is_enabled(root_id));

  let mut orchestrator = Orchestrator::new(hierarchy, gateways, session_id());
  orchestrator.backup(&plan).unwrap();
  assert_eq!(orchestrator.backups().len(), 1);
  assert_eq!(orchestrator.backups()[0].repo, root_id);

  let outcome = orchestrator.execute(&plan, &agent).unwrap();
  assert_eq!(outcome, SessionOutcome::Failed { at_repo: root_id });

  let hierarchy = orchestrator.hierarchy();
  let child_gateway = Git2Gateway::open(child_id, "libs/c", &hierarchy.get(child_id).worktree_path).unwrap();
  let root_gateway = Git2Gateway::open(root_id, "", &hierarchy.get(root_id).worktree_path).unwrap();

  assert_eq!(
    child_gateway.rev_parse("feat").unwrap(),
    fixture.child_feat_before,
    "the excluded child must never be touched"
  );
  assert_eq!(
    root_gateway.rev_parse("feat").unwrap(),
    fixture.root_feat_before,
    "the root's aborted rebase must leave feat exactly where it started"
  );
  assert!(root_gateway.is_clean().unwrap());
}

/// S5: after a completed session, restoring from its backups puts every
/// rewritten branch back at its pre-rebase tip.
#[test]
fn s5_restore_after_completed_session_reverts_both_repos() {
  let fixture = two_repo_hierarchy_with_submodule_conflict();
  let hierarchy = discover(fixture.root.path()).unwrap();
  let gateways = gateways_for(&hierarchy);
  let agent = ScriptedUserAgent::new();
  let plan = build_plan(&hierarchy, &plan_inputs(), &gateways, &agent, session_id()).unwrap();
  validate_plan(&hierarchy, &plan, &gateways).unwrap();

  let mut orchestrator = Orchestrator::new(hierarchy, gateways, session_id());
  orchestrator.backup(&plan).unwrap();
  let outcome = orchestrator.execute(&plan, &agent).unwrap();
  assert_eq!(outcome, SessionOutcome::Completed);

  // A fresh discovery and gateway set, the way a separate `backups restore`
  // invocation would open them.
  let restore_hierarchy = discover(fixture.root.path()).unwrap();
  let restore_gateways = gateways_for(&restore_hierarchy);
  let results = Orchestrator::restore(&restore_gateways, orchestrator.backups());
  assert!(results.iter().all(|r| r.is_ok()));

  let child_id = restore_hierarchy.find_by_rel_path("libs/c").unwrap();
  let root_id = restore_hierarchy.root();
  let child_gateway = Git2Gateway::open(child_id, "libs/c", &restore_hierarchy.get(child_id).worktree_path).unwrap();
  let root_gateway = Git2Gateway::open(root_id, "", &restore_hierarchy.get(root_id).worktree_path).unwrap();

  assert_eq!(child_gateway.rev_parse("feat").unwrap(), fixture.child_feat_before);
  assert_eq!(root_gateway.rev_parse("feat").unwrap(), fixture.root_feat_before);
}
