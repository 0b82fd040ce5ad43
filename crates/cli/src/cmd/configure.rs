//! Implementation of the `loom configure` command.

use anyhow::{Context, Result};

use loom_lib::eval::evaluate;
use loom_lib::execute::ExecuteReport;

use super::Invocation;
use crate::output::{print_stat, print_success};

pub fn cmd_configure(invocation: &Invocation, targets: &[String]) -> Result<()> {
  let report = configure(invocation, targets)?;
  print_success(&format!("Wrote {}", report.build_file.display()));
  print_stat("Actions", &report.actions.to_string());
  print_stat("Default", &report.default_targets.to_string());
  if !report.selected.is_empty() {
    print_stat("Selected", &report.selected.join(", "));
  }
  Ok(())
}

/// Evaluate the build scripts and write the build file.
pub(crate) fn configure(invocation: &Invocation, targets: &[String]) -> Result<ExecuteReport> {
  let settings = invocation.settings()?;
  let (mut ctx, _) = evaluate(
    settings,
    invocation.options.clone(),
    &invocation.directory,
    &invocation.search_path,
  )
  // Lua errors are not Send + Sync; keep only their message.
  .map_err(|e| anyhow::anyhow!("{}", e))
  .with_context(|| format!("Failed to evaluate build scripts in {}", invocation.directory.display()))?;

  let settings_path = invocation.settings_path();
  ctx
    .track_file(&settings_path)
    .with_context(|| format!("Failed to read settings: {}", settings_path.display()))?;
  ctx.execute(targets).context("Failed to export build graph")
}
