//! Configuration directories, following XDG base directory conventions via
//! `directories::ProjectDirs`.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use crate::consts::ENV_LOCKSTEP_REBASE_LOG;

/// XDG config/data/cache directories for the application.
#[derive(Debug, Clone)]
pub struct ConfigDirs {
  pub config_dir: PathBuf,
  pub data_dir: PathBuf,
  pub cache_dir: Option<PathBuf>,
}

impl ConfigDirs {
  pub fn new() -> Result<Self> {
    let proj_dirs =
      ProjectDirs::from("dev", "", "lockstep-rebase").context("Failed to determine project directories")?;

    Ok(Self {
      config_dir: proj_dirs.config_dir().to_path_buf(),
      data_dir: proj_dirs.data_dir().to_path_buf(),
      cache_dir: Some(proj_dirs.cache_dir().to_path_buf()),
    })
  }

  pub fn config_dir(&self) -> &PathBuf {
    &self.config_dir
  }

  pub fn data_dir(&self) -> &PathBuf {
    &self.data_dir
  }

  pub fn cache_dir(&self) -> Option<&PathBuf> {
    self.cache_dir.as_ref()
  }

  pub fn init(&self) -> Result<()> {
    fs::create_dir_all(&self.config_dir).context("Failed to create config directory")?;
    fs::create_dir_all(&self.data_dir).context("Failed to create data directory")?;
    if let Some(cache_dir) = &self.cache_dir {
      fs::create_dir_all(cache_dir).context("Failed to create cache directory")?;
    }
    fs::create_dir_all(self.log_dir()).context("Failed to create log directory")?;
    Ok(())
  }

  /// Directory holding the rotating log file, unless overridden by
  /// `LOCKSTEP_REBASE_LOG`.
  pub fn log_dir(&self) -> PathBuf {
    self.data_dir.join("logs")
  }

  /// Path to the rotating log file. Honors `LOCKSTEP_REBASE_LOG` as a full
  /// path override; otherwise `<data_dir>/logs/lockstep-rebase.log`.
  pub fn log_file_path(&self) -> PathBuf {
    if let Ok(path) = std::env::var(ENV_LOCKSTEP_REBASE_LOG) {
      return PathBuf::from(path);
    }
    self.log_dir().join("lockstep-rebase.log")
  }
}

pub fn get_config_dirs() -> Result<ConfigDirs> {
  ConfigDirs::new()
}
