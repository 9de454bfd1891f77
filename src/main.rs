//! # Lockstep Rebase CLI Entry Point
//!
//! Thin entry point producing the `lockstep-rebase` binary from the
//! workspace root, matching the argument parsing, tracing setup, and
//! dispatch `lockstep-cli`'s own `[[bin]]` target uses (`cargo build` with
//! no arguments only builds `lockstep-cli` per `default-members`; this
//! target exists so `cargo build --workspace`/`cargo install --path .`
//! from the root still produce the binary).

use anyhow::Result;
use clap::Parser;
use lockstep_cli::cli::{self, handle_cli};
use lockstep_core::ConfigDirs;
use no_worries::{Config as NoWorriesConfig, Metadata as NoWorriesMetadata, no_worries};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> Result<()> {
  let config: NoWorriesConfig = NoWorriesConfig {
    metadata: NoWorriesMetadata {
      name: "lockstep-rebase".to_string(),
      support_email: Some("e@eddie.land".to_string()),
      ..Default::default()
    },
    ..Default::default()
  };
  no_worries!(config).expect("Failed to set up panic handler");

  let cmd = cli::Cli::parse();

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
