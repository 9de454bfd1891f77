//! Terminal-backed [`UserAgent`]: the three human-interaction prompts the
//! Orchestrator needs, rendered with `dialoguer`.

use anyhow::Result;
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use lockstep_core::output::{print_info, print_plain, print_warning};
use lockstep_core::{BranchName, RelPath, RemoteBranchDecision, SubmoduleDecision, UserAgent};

pub struct TerminalUserAgent;

impl UserAgent for TerminalUserAgent {
  fn prompt_remote_branch_create(&self, repo_label: &str, branch: &str, remote: &str) -> Result<RemoteBranchDecision> {
    let label = if repo_label.is_empty() { "." } else { repo_label };
    print_warning(&format!(
      "'{branch}' does not exist locally in {label}, only on '{remote}'"
    ));
    let create = Confirm::with_theme(&ColorfulTheme::default())
      .with_prompt(format!("Create a local tracking branch for '{branch}'?"))
      .default(true)
      .interact()?;

    Ok(if create {
      RemoteBranchDecision::Create
    } else {
      RemoteBranchDecision::Decline
    })
  }

  fn prompt_auto_discovered_submodule(
    &self,
    submodule_path: &RelPath,
    suggested_source: &BranchName,
    suggested_target: &BranchName,
  ) -> Result<SubmoduleDecision> {
    print_info(&format!(
      "Submodule '{submodule_path}' changed pointer between '{suggested_source}' and '{suggested_target}'"
    ));

    let choice = dialoguer::Select::with_theme(&ColorfulTheme::default())
      .with_prompt(format!("Include '{submodule_path}' in this session?"))
      .items([
        format!("Include - rebase '{suggested_source}' onto '{suggested_target}' here too"),
        "Exclude - leave this submodule's branches untouched".to_string(),
        "Include with different branches for this repo".to_string(),
      ])
      .default(0)
      .interact()?;

    match choice {
      0 => Ok(SubmoduleDecision::Include),
      2 => {
        let source = dialoguer::Input::with_theme(&ColorfulTheme::default())
          .with_prompt(format!("Source branch for '{submodule_path}'"))
          .default(suggested_source.clone())
          .interact_text()?;
        let target = dialoguer::Input::with_theme(&ColorfulTheme::default())
          .with_prompt(format!("Target branch for '{submodule_path}'"))
          .default(suggested_target.clone())
          .interact_text()?;
        Ok(SubmoduleDecision::IncludeWithOverrides { source, target })
      }
      _ => Ok(SubmoduleDecision::Exclude),
    }
  }

  fn await_file_conflict_resolution(&self, repo_label: &str, paths: &[RelPath]) -> Result<()> {
    let label = if repo_label.is_empty() { "." } else { repo_label };
    print_warning(&format!("File conflicts pending in {label}:"));
    for path in paths {
      print_plain(&format!("  - {path}"));
    }
    print_plain("");
    print_info("Resolve the conflicts above in your editor, `git add` the result, then confirm.");

    dialoguer::Input::<String>::with_theme(&ColorfulTheme::default())
      .with_prompt("Type 'done' once every listed path is staged")
      .validate_with(|input: &String| -> Result<(), &str> {
        if input.trim().eq_ignore_ascii_case("done") {
          Ok(())
        } else {
          Err("type 'done' to continue")
        }
      })
      .interact_text()?;

    Ok(())
  }
}
