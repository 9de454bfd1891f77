use std::process::Command;

#[test]
fn test_help_command() {
  let output = Command::new("cargo")
    .args(["run", "--", "--help"])
    .output()
    .expect("Failed to execute command");

  assert!(output.status.success(), "Command failed to execute successfully");

  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("rebase"), "rebase subcommand not found in help output");
  assert!(stdout.contains("backups"), "backups subcommand not found in help output");
}

#[test]
fn test_rebase_help_command() {
  let output = Command::new("cargo")
    .args(["run", "--", "rebase", "--help"])
    .output()
    .expect("Failed to execute command");

  assert!(output.status.success(), "Command failed to execute successfully");

  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("--include"), "--include flag not found in rebase help");
  assert!(stdout.contains("--exclude"), "--exclude flag not found in rebase help");
  assert!(stdout.contains("--branch-map"), "--branch-map flag not found in rebase help");
  assert!(stdout.contains("--dry-run"), "--dry-run flag not found in rebase help");
  assert!(
    stdout.contains("--offer-force-push"),
    "--offer-force-push flag not found in rebase help"
  );
}

#[test]
fn test_backups_help_command() {
  let output = Command::new("cargo")
    .args(["run", "--", "backups", "--help"])
    .output()
    .expect("Failed to execute command");

  assert!(output.status.success(), "Command failed to execute successfully");

  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("list"), "list subcommand not found in backups help");
  assert!(stdout.contains("restore"), "restore subcommand not found in backups help");
  assert!(stdout.contains("delete"), "delete subcommand not found in backups help");
}
