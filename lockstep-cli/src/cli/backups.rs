//! # Backups Command
//!
//! List, restore, or delete `lockstep/backup/<branch>/<session-id>` branches
//! across the discovered hierarchy.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use lockstep_core::consts::BACKUP_BRANCH_PREFIX;
use lockstep_core::output::{print_error, print_header, print_info, print_success, print_warning};
use lockstep_core::{BackupRef, Git2Gateway, Hierarchy, Orchestrator, RepoGateway, RepoId};

#[derive(Args)]
pub struct BackupsArgs {
  /// Path to the repository to start hierarchy discovery from
  #[arg(short, long, value_name = "PATH", global = true)]
  pub repo: Option<String>,

  #[command(subcommand)]
  pub command: BackupsCommand,
}

#[derive(Subcommand)]
pub enum BackupsCommand {
  /// List backup branches across the hierarchy
  List {
    /// Only show backups for this session id
    #[arg(long = "session-id")]
    session_id: Option<String>,
  },
  /// Restore every branch touched by a session back to its pre-rebase tip
  Restore {
    #[arg(long = "session-id")]
    session_id: String,
  },
  /// Delete every backup branch belonging to a session
  Delete {
    #[arg(long = "session-id")]
    session_id: String,
  },
}

fn parse_backup_branch_name(name: &str) -> Option<(String, String)> {
  let rest = name.strip_prefix(&format!("{BACKUP_BRANCH_PREFIX}/"))?;
  let (original_branch, session_id) = rest.rsplit_once('/')?;
  Some((original_branch.to_string(), session_id.to_string()))
}

fn open_hierarchy_and_gateways(
  repo_arg: &Option<String>,
) -> Result<(Hierarchy, HashMap<RepoId, Box<dyn RepoGateway>>)> {
  let start = if let Some(repo_arg) = repo_arg {
    PathBuf::from(repo_arg)
  } else {
    std::env::current_dir().context("failed to read current directory")?
  };

  let hierarchy = lockstep_core::discover(&start)?;
  let mut gateways: HashMap<RepoId, Box<dyn RepoGateway>> = HashMap::new();
  for node in hierarchy.nodes() {
    let gateway = Git2Gateway::open(node.id, node.rel_path.clone(), &node.worktree_path)
      .with_context(|| format!("failed to open repository at {}", node.worktree_path.display()))?;
    gateways.insert(node.id, Box::new(gateway));
  }
  Ok((hierarchy, gateways))
}

/// Backup branches belonging to one session, collected across every repo in
/// the hierarchy.
fn collect_session_backups(
  hierarchy: &Hierarchy,
  gateways: &HashMap<RepoId, Box<dyn RepoGateway>>,
  session_id: &str,
) -> Result<Vec<BackupRef>> {
  let mut backups = Vec::new();
  for node in hierarchy.nodes() {
    let Some(gateway) = gateways.get(&node.id) else { continue };
    for name in gateway.list_backup_branches()? {
      let Some((original_branch, found_session)) = parse_backup_branch_name(&name) else { continue };
      if found_session != session_id {
        continue;
      }
      let tip_at_backup = gateway.rev_parse(&name)?;
      backups.push(BackupRef {
        repo: node.id,
        original_branch,
        backup_branch: name,
        tip_at_backup,
      });
    }
  }
  Ok(backups)
}

pub fn handle_backups_command(args: BackupsArgs) -> Result<i32> {
  match args.command {
    BackupsCommand::List { session_id } => handle_list(&args.repo, session_id.as_deref()),
    BackupsCommand::Restore { session_id } => handle_restore(&args.repo, &session_id),
    BackupsCommand::Delete { session_id } => handle_delete(&args.repo, &session_id),
  }
}

fn handle_list(repo_arg: &Option<String>, session_id: Option<&str>) -> Result<i32> {
  let (hierarchy, gateways) = open_hierarchy_and_gateways(repo_arg)?;
  print_header("Backup branches");

  let mut found_any = false;
  for node in hierarchy.nodes() {
    let Some(gateway) = gateways.get(&node.id) else { continue };
    let label = if node.rel_path.is_empty() { "." } else { &node.rel_path };
    for name in gateway.list_backup_branches()? {
      let Some((original_branch, found_session)) = parse_backup_branch_name(&name) else { continue };
      if let Some(wanted) = session_id
        && wanted != found_session
      {
        continue;
      }
      found_any = true;
      print_info(&format!("  {label}: {original_branch} <- {name}"));
    }
  }

  if !found_any {
    print_warning("No backup branches found.");
  }
  Ok(0)
}

fn handle_restore(repo_arg: &Option<String>, session_id: &str) -> Result<i32> {
  let (hierarchy, gateways) = open_hierarchy_and_gateways(repo_arg)?;
  let backups = collect_session_backups(&hierarchy, &gateways, session_id)?;

  if backups.is_empty() {
    print_warning(&format!("No backup branches found for session '{session_id}'."));
    return Ok(1);
  }

  let results = Orchestrator::restore(&gateways, &backups);
  let mut failures = 0;
  for (backup, result) in backups.iter().zip(results) {
    let label = hierarchy.get(backup.repo).rel_path.clone();
    let label = if label.is_empty() { "." } else { &label };
    match result {
      Ok(()) => print_success(&format!(
        "{label}: restored '{}' to {}",
        backup.original_branch, backup.tip_at_backup
      )),
      Err(err) => {
        failures += 1;
        print_error(&format!("{label}: failed to restore '{}': {err:#}", backup.original_branch));
      }
    }
  }

  Ok(if failures == 0 { 0 } else { 2 })
}

fn handle_delete(repo_arg: &Option<String>, session_id: &str) -> Result<i32> {
  let (hierarchy, gateways) = open_hierarchy_and_gateways(repo_arg)?;
  let backups = collect_session_backups(&hierarchy, &gateways, session_id)?;

  if backups.is_empty() {
    print_warning(&format!("No backup branches found for session '{session_id}'."));
    return Ok(1);
  }

  let mut failures = 0;
  for backup in &backups {
    let Some(gateway) = gateways.get(&backup.repo) else { continue };
    let label = hierarchy.get(backup.repo).rel_path.clone();
    let label = if label.is_empty() { "." } else { &label };
    match gateway.delete_branch(&backup.backup_branch, true) {
      Ok(()) => print_success(&format!("{label}: deleted {}", backup.backup_branch)),
      Err(err) => {
        failures += 1;
        print_error(&format!("{label}: failed to delete {}: {err:#}", backup.backup_branch));
      }
    }
  }

  Ok(if failures == 0 { 0 } else { 2 })
}
