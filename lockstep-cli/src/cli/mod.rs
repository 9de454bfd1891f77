//! # Command Line Interface
//!
//! Defines the CLI structure and command handlers for `lockstep-rebase`:
//! the `rebase` command that drives one session, and the `backups`
//! subcommands for listing, restoring, and deleting session backup refs.

pub mod backups;
pub mod rebase;

use anyhow::Result;
use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{ArgAction, Parser, Subcommand};
use lockstep_core::ColorMode;

/// Top-level CLI command for `lockstep-rebase`.
#[derive(Parser)]
#[command(name = "lockstep-rebase")]
#[command(display_name = "Lockstep Rebase")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(about = "Coordinate a single logical rebase across a tree of git repositories linked by submodule pointers")]
#[command(
  long_about = "Lockstep Rebase walks a tree of git repositories connected by submodule\n\
        pointers, rebases the feature branch in each repository bottom-up, and\n\
        rewrites every parent's submodule pointer to the new child commit as it\n\
        goes, so the whole tree ends up on a consistent, rebased state."
)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
#[command(subcommand_required(true))]
#[command(disable_help_subcommand = true)]
#[command(max_term_width = 120)]
#[command(styles = Styles::styled()
    .header(AnsiColor::BrightGreen.on_default().bold().underline())
    .usage(AnsiColor::Green.on_default().bold())
    .literal(AnsiColor::BrightGreen.on_default().bold())
    .placeholder(AnsiColor::BrightWhite.on_default().italic())
    .valid(AnsiColor::Green.on_default())
    .invalid(AnsiColor::BrightRed.on_default().bold())
)]
pub struct Cli {
  /// Sets the level of verbosity (can be used multiple times)
  #[arg(
    short = 'v',
    long = "verbose",
    action = ArgAction::Count,
    long_help = "Sets the level of verbosity for console tracing output. The rotating log\n\
             file always captures debug-level detail regardless of this flag.\n\n\
             -v: Show info level messages\n\
             -vv: Show debug level messages\n\
             -vvv: Show trace level messages"
  )]
  pub verbose: u8,

  /// Controls when colored output is used
  #[arg(
    long,
    value_enum,
    ignore_case = true,
    default_value_t = ColorMode::Auto,
  )]
  pub colors: ColorMode,

  /// Subcommands
  #[command(subcommand)]
  pub command: Commands,
}

/// Subcommands for `lockstep-rebase`.
#[derive(Subcommand)]
pub enum Commands {
  /// Rebase a branch across the whole repository hierarchy
  #[command(
    long_about = "Rebase `source` onto `target` across every enabled repository in the\n\
            hierarchy, bottom-up, auto-resolving submodule pointer conflicts with\n\
            the commit map built during each repository's rebase."
  )]
  #[command(alias = "rb")]
  Rebase(rebase::RebaseArgs),

  /// Manage session backup branches
  #[command(
    long_about = "List, restore, or delete the `lockstep/backup/<branch>/<session-id>`\n\
            branches created before a rebase session begins rewriting history."
  )]
  Backups(backups::BackupsArgs),
}

/// Dispatch a parsed [`Cli`] invocation, returning the process exit code per
/// the external interface contract: `0` success, `1` plan/validation failure
/// before any write, `2` rebase failed after writes began.
pub fn handle_cli(cli: Cli) -> Result<i32> {
  match cli.colors {
    ColorMode::Always | ColorMode::Yes => owo_colors::set_override(true),
    ColorMode::Never | ColorMode::No => owo_colors::set_override(false),
    ColorMode::Auto => {
      // Let owo_colors use its default auto-detection.
    }
  }

  match cli.command {
    Commands::Rebase(args) => rebase::handle_rebase_command(args),
    Commands::Backups(args) => backups::handle_backups_command(args),
  }
}
