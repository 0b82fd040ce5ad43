mod build;
mod configure;
mod info;
mod targets;

use std::path::PathBuf;

use anyhow::{Context, Result};

use loom_lib::consts::{DEFAULT_BUILD_DIR, DEFAULT_BUILD_FILE, OPT_BUILD_DIRECTORY, OPT_BUILD_FILE, SETTINGS_FILE};
use loom_lib::settings::Settings;

pub use build::cmd_build;
pub use configure::cmd_configure;
pub use info::cmd_info;
pub use targets::cmd_targets;

/// Global command-line state shared by every subcommand.
pub struct Invocation {
  pub directory: PathBuf,
  pub options: Vec<String>,
  pub settings_file: Option<PathBuf>,
  pub search_path: Vec<PathBuf>,
}

impl Invocation {
  /// The settings file given on the command line, or the project's default.
  pub fn settings_path(&self) -> PathBuf {
    self
      .settings_file
      .clone()
      .unwrap_or_else(|| self.directory.join(SETTINGS_FILE))
  }

  /// Settings file contents with `-O` overrides applied on top.
  pub fn settings(&self) -> Result<Settings> {
    let file = self.settings_path();
    let mut settings =
      Settings::from_file(&file).with_context(|| format!("Failed to load settings: {}", file.display()))?;
    settings.update(Settings::parse(&self.options).context("Invalid -O option")?);
    Ok(settings)
  }

  /// Search path entries as recorded in the cache.
  pub fn search_path_strings(&self) -> Vec<String> {
    self
      .search_path
      .iter()
      .map(|p| p.to_string_lossy().into_owned())
      .collect()
  }

  /// Where the build file lives, derived from settings alone.
  pub fn build_file(&self, settings: &Settings) -> Result<PathBuf> {
    let root = dunce::canonicalize(&self.directory)
      .with_context(|| format!("Project directory not found: {}", self.directory.display()))?;
    let build_dir = root.join(settings.get_or(OPT_BUILD_DIRECTORY, DEFAULT_BUILD_DIR));
    Ok(build_dir.join(settings.get_or(OPT_BUILD_FILE, DEFAULT_BUILD_FILE)))
  }
}
