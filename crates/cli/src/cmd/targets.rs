//! Implementation of the `loom targets` command.

use anyhow::{Context, Result, bail};
use serde::Serialize;

use loom_lib::cache::{CacheSummary, RtsMode};

use super::Invocation;
use crate::output::{OutputFormat, print_json};

#[derive(Serialize)]
struct TargetRow<'a> {
  name: &'a str,
  mode: RtsMode,
  explicit: bool,
}

pub fn cmd_targets(invocation: &Invocation, output: OutputFormat) -> Result<()> {
  let settings = invocation.settings()?;
  let build_file = invocation.build_file(&settings)?;
  let Some(cache) = CacheSummary::load(&build_file)
    .with_context(|| format!("Failed to read build file: {}", build_file.display()))?
  else {
    bail!("No build file at {}, run `loom configure` first", build_file.display());
  };

  let rows: Vec<TargetRow> = cache
    .targets
    .iter()
    .map(|(name, entry)| TargetRow {
      name,
      mode: entry.rts,
      explicit: entry.explicit,
    })
    .collect();

  if output.is_json() {
    return print_json(&rows);
  }

  for row in rows {
    let mode = match row.mode {
      RtsMode::None => "none",
      RtsMode::Plain => "plain",
      RtsMode::Mixed => "mixed",
    };
    let explicit = if row.explicit { " (explicit)" } else { "" };
    println!("{} [{}]{}", row.name, mode, explicit);
  }
  Ok(())
}
