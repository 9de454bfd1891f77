//! # Lockstep Rebase CLI Entry Point
//!
//! The main entry point for `lockstep-rebase`, a tool that coordinates a
//! single logical rebase across a tree of git repositories connected by
//! submodule pointers.

use anyhow::Result;
use clap::Parser;
use lockstep_cli::cli::{self, handle_cli};
use lockstep_core::ConfigDirs;
use no_worries::{Config as NoWorriesConfig, Metadata as NoWorriesMetadata, no_worries};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> Result<()> {
  // Set up the no-worries panic handler with custom configuration
  let config: NoWorriesConfig = NoWorriesConfig {
    metadata: NoWorriesMetadata {
      name: "lockstep-rebase".to_string(),
      support_email: Some("e@eddie.land".to_string()),
      // Other metadata fields use defaults from Cargo.toml
      ..Default::default()
    },
    ..Default::default()
  };
  no_worries!(config).expect("Failed to set up panic handler");

  // Parse CLI arguments using the derive-based implementation
  let cmd = cli::Cli::parse();

  // Set up tracing based on verbosity level: console follows -v, the
  // rotating file sink always runs at DEBUG so post-mortem debugging
  // doesn't depend on the user having passed -v.
  let verbose_count = cmd.verbose;
  let console_level = match verbose_count {
    0 => tracing::Level::WARN,
    1 => tracing::Level::INFO,
    2 => tracing::Level::DEBUG,
    _ => tracing::Level::TRACE,
  };

  let config_dirs = ConfigDirs::new()?;
  config_dirs.init()?;
  let log_path = config_dirs.log_file_path();
  let log_dir = log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
  let log_file_name = log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("lockstep-rebase.log"));
  let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
  let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::registry()
    .with(fmt::layer().with_filter(EnvFilter::from_default_env().add_directive(console_level.into())))
    .with(
      fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG),
    )
    .init();

  tracing::debug!("Tracing initialized; console level {}, log file {}", console_level, log_path.display());

  let exit_code = match handle_cli(cmd) {
    Ok(code) => code,
    Err(err) => {
      lockstep_core::print_error(&format!("{err:#}"));
      1
    }
  };
  std::process::exit(exit_code)
}
