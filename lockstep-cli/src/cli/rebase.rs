//! # Rebase Command
//!
//! Drives `lockstep_core::Orchestrator` end to end: discover the hierarchy,
//! build a plan from the CLI flags, validate, back up, execute, and report.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Args;
use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use lockstep_core::output::{print_error, print_header, print_info, print_success, print_warning};
use lockstep_core::{
  BranchOverride, Git2Gateway, Orchestrator, Plan, PlanInputs, RepoGateway, RepoRef, SessionId, SessionOutcome,
  build_plan, validate_plan,
};

use crate::agent::TerminalUserAgent;

/// Rebase `source` onto `target` across the whole hierarchy.
#[derive(Args)]
pub struct RebaseArgs {
  /// The branch to rebase (present in every enabled repo by default)
  pub source: String,

  /// The branch to rebase onto (present in every enabled repo by default)
  pub target: String,

  /// Path to the repository to start hierarchy discovery from
  #[arg(short, long, value_name = "PATH")]
  pub repo: Option<String>,

  /// Only enable these repos (by name, relative path, or absolute path),
  /// plus their ancestors up to the hierarchy root
  #[arg(long = "include", value_name = "REPO")]
  pub include: Vec<String>,

  /// Disable these repos unconditionally, overriding `--include`
  #[arg(long = "exclude", value_name = "REPO")]
  pub exclude: Vec<String>,

  /// Override the source/target branch for one repo: `repo=SRC[:TGT]`
  #[arg(long = "branch-map", value_name = "REPO=SRC[:TGT]")]
  pub branch_map: Vec<String>,

  /// Show the plan and run validation, but make no changes
  #[arg(long = "dry-run")]
  pub dry_run: bool,

  /// Proceed even when a task's branches are already up to date
  #[arg(long)]
  pub force: bool,

  /// Propose including submodules whose pointer changed between source and
  /// target, prompting per-submodule
  #[arg(long = "auto-select-submodules")]
  pub auto_select_submodules: bool,

  /// After a completed session, offer to `push --force-with-lease` every
  /// rewritten branch
  #[arg(long = "offer-force-push")]
  pub offer_force_push: bool,
}

fn parse_repo_ref(raw: &str) -> RepoRef {
  let path = Path::new(raw);
  if path.is_absolute() {
    RepoRef::AbsPath(path.to_path_buf())
  } else if raw.contains('/') || raw.contains(std::path::MAIN_SEPARATOR) {
    RepoRef::RelPath(raw.to_string())
  } else {
    RepoRef::Name(raw.to_string())
  }
}

fn parse_branch_map(raw: &str) -> Result<BranchOverride> {
  let (repo, rest) = raw
    .split_once('=')
    .ok_or_else(|| anyhow!("invalid --branch-map entry '{raw}', expected repo=SRC[:TGT]"))?;
  let (source, target) = match rest.split_once(':') {
    Some((src, tgt)) => (src.to_string(), Some(tgt.to_string())),
    None => (rest.to_string(), None),
  };
  Ok(BranchOverride {
    repo: parse_repo_ref(repo),
    source,
    target,
  })
}

fn new_session_id() -> SessionId {
  let now = chrono::Utc::now();
  let token = format!("{:x}{:03x}", std::process::id(), now.timestamp_subsec_millis());
  SessionId::new(now, &token)
}

fn print_plan_summary(hierarchy: &lockstep_core::Hierarchy, plan: &Plan) {
  print_header(&format!("Plan for session {}", plan.session_id));
  for task in &plan.tasks {
    let label = hierarchy.get(task.repo).rel_path.clone();
    let label = if label.is_empty() { "." } else { &label };
    if task.enabled {
      print_info(&format!("  [x] {label}: {} -> {}", task.source, task.target));
    } else {
      print_info(&format!("  [ ] {label} (disabled)"));
    }
  }
}

/// Handle the `rebase` command, returning the process exit code.
pub fn handle_rebase_command(args: RebaseArgs) -> Result<i32> {
  let start = if let Some(ref repo_arg) = args.repo {
    PathBuf::from(repo_arg)
  } else {
    std::env::current_dir().context("failed to read current directory")?
  };

  let hierarchy = lockstep_core::discover(&start)?;

  let mut gateways: HashMap<lockstep_core::RepoId, Box<dyn RepoGateway>> = HashMap::new();
  for node in hierarchy.nodes() {
    let gateway = Git2Gateway::open(node.id, node.rel_path.clone(), &node.worktree_path)
      .with_context(|| format!("failed to open repository at {}", node.worktree_path.display()))?;
    gateways.insert(node.id, Box::new(gateway));
  }

  let branch_map = args
    .branch_map
    .iter()
    .map(|raw| parse_branch_map(raw))
    .collect::<Result<Vec<_>>>()?;

  let inputs = PlanInputs {
    global_source: args.source.clone(),
    global_target: args.target.clone(),
    include: args.include.iter().map(|s| parse_repo_ref(s)).collect(),
    exclude: args.exclude.iter().map(|s| parse_repo_ref(s)).collect(),
    branch_map,
    dry_run: args.dry_run,
    force: args.force,
    auto_select_submodules: args.auto_select_submodules,
    offer_force_push: args.offer_force_push,
  };

  let agent = TerminalUserAgent;
  let session_id = new_session_id();

  let plan = build_plan(&hierarchy, &inputs, &gateways, &agent, session_id.clone())?;
  validate_plan(&hierarchy, &plan, &gateways)?;
  print_plan_summary(&hierarchy, &plan);

  if inputs.dry_run {
    print_info("Dry run: no branches checked out, no backups created, no rebase invoked.");
    return Ok(0);
  }

  let mut orchestrator = Orchestrator::new(hierarchy, gateways, session_id.clone());
  orchestrator.backup(&plan)?;
  print_info(&format!("Created {} backup branch(es)", orchestrator.backups().len()));

  let outcome = match orchestrator.execute(&plan, &agent) {
    Ok(outcome) => outcome,
    Err(err) => {
      print_error(&format!("{err:#}"));
      print_warning(&format!(
        "Session {session_id} failed after backups were created; run `lockstep-rebase backups restore --session-id {session_id}` to recover."
      ));
      return Ok(2);
    }
  };

  match outcome {
    SessionOutcome::Completed => {
      print_success(&format!("Session {session_id} completed"));
      if args.offer_force_push {
        offer_force_push(&orchestrator, &plan, &session_id)?;
      }
      Ok(0)
    }
    SessionOutcome::Failed { at_repo } => {
      let label = orchestrator.hierarchy().get(at_repo).rel_path.clone();
      let label = if label.is_empty() { "." } else { &label };
      print_error(&format!(
        "Session {session_id} failed at {label}; earlier repos' backups remain for manual restore"
      ));
      Ok(2)
    }
    SessionOutcome::Aborted => {
      print_warning(&format!("Session {session_id} aborted"));
      Ok(130)
    }
  }
}

fn offer_force_push(orchestrator: &Orchestrator, plan: &Plan, session_id: &SessionId) -> Result<()> {
  let phrase = format!("force-push {session_id}");
  print_warning(&format!(
    "About to push {} branch(es) with --force-with-lease.",
    plan.enabled_tasks().count()
  ));
  let typed: String = Input::with_theme(&ColorfulTheme::default())
    .with_prompt(format!("Type '{phrase}' to confirm"))
    .allow_empty(true)
    .interact_text()?;

  let pushed = orchestrator.offer_force_push(plan, &phrase, &typed)?;
  if pushed.is_empty() {
    print_info("Force-push declined or confirmation phrase mismatched; nothing pushed.");
  } else {
    print_success(&format!("Force-pushed: {}", pushed.join(", ")));
  }
  Ok(())
}
