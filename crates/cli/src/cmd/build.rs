//! Implementation of the `loom build` command.
//!
//! The build file's cache header decides whether the build scripts need to
//! run again before ninja is invoked.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

use loom_lib::cache::{CacheSummary, RtsMode};

use super::Invocation;
use super::configure::configure;
use crate::output::{print_info, print_success};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
  UpToDate,
  RunNinja,
  Reconfigure,
}

impl Decision {
  fn describe(self) -> &'static str {
    match self {
      Decision::UpToDate => "nothing to do",
      Decision::RunNinja => "configuration is current, running ninja",
      Decision::Reconfigure => "configuration is stale, reconfiguring",
    }
  }
}

fn decide(cache: Option<&CacheSummary>, invocation: &Invocation, targets: &[String]) -> Decision {
  let Some(cache) = cache else {
    return Decision::Reconfigure;
  };
  if !cache.is_fresh(&invocation.options, &invocation.search_path_strings()) {
    return Decision::Reconfigure;
  }
  if targets.iter().any(|name| cache.resolve_target(name).is_none()) {
    debug!("requested target missing from cache");
    return Decision::Reconfigure;
  }
  // Targets that run nothing are empty phonies in the build file, so ninja
  // handles a mix of them and runnable targets as well.
  match cache.get_rts_mode(targets) {
    RtsMode::None => Decision::UpToDate,
    RtsMode::Plain | RtsMode::Mixed => Decision::RunNinja,
  }
}

pub fn cmd_build(invocation: &Invocation, targets: &[String], no_execute: bool) -> Result<()> {
  let settings = invocation.settings()?;
  let build_file = invocation.build_file(&settings)?;

  let cache = match CacheSummary::load(&build_file) {
    Ok(cache) => cache,
    Err(e) => {
      warn!(error = %e, "ignoring unreadable cache");
      None
    }
  };
  let decision = decide(cache.as_ref(), invocation, targets);
  print_info(decision.describe());
  if no_execute || decision == Decision::UpToDate {
    return Ok(());
  }

  let (build_file, names) = match decision {
    Decision::Reconfigure => {
      let report = configure(invocation, targets)?;
      (report.build_file, report.selected)
    }
    _ => {
      let cache = cache.context("Missing build cache")?;
      let names = targets
        .iter()
        .filter_map(|name| cache.resolve_target(name))
        .map(str::to_string)
        .collect();
      (build_file, names)
    }
  };

  run_ninja(&invocation.directory, &build_file, &names)?;
  print_success("Build finished");
  Ok(())
}

fn run_ninja(directory: &Path, build_file: &Path, targets: &[String]) -> Result<()> {
  debug!(build_file = %build_file.display(), ?targets, "running ninja");
  let status = Command::new("ninja")
    .arg("-f")
    .arg(build_file)
    .args(targets)
    .current_dir(directory)
    .status()
    .context("Failed to run ninja")?;
  if !status.success() {
    bail!("ninja failed with {}", status);
  }
  Ok(())
}
