//! Translate, export and write the build file for an evaluated context.

use std::path::PathBuf;

use tracing::info;

use crate::cache::CacheSummary;
use crate::consts::{DEFAULT_BUILD_FILE, OPT_BUILD_FILE};
use crate::export::{ExportError, export_graph, write_build_file};
use crate::graph::{Context, GraphError};
use crate::translate::TranslateError;

#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
  #[error(transparent)]
  Translate(#[from] TranslateError),

  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Export(#[from] ExportError),
}

/// What [`Context::execute`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteReport {
  pub build_file: PathBuf,
  pub actions: usize,
  pub default_targets: usize,
  /// Qualified paths of the targets named on the command line.
  pub selected: Vec<String>,
}

impl Context {
  /// Translate every target, check that each of `names` refers to an existing
  /// target, and write the build file with the cache summary embedded.
  ///
  /// Nothing is written when translation, name lookup or export fails.
  pub fn execute<S: AsRef<str>>(&mut self, names: &[S]) -> Result<ExecuteReport, ExecuteError> {
    self.translate()?;

    let mut selected = Vec::with_capacity(names.len());
    for name in names {
      let id = self.find_target(name.as_ref())?;
      selected.push(self.target_path(id)?);
    }

    let summary = CacheSummary::from_context(self)?;
    let contents = export_graph(self, &summary)?;

    let file_name = self.settings().get_or(OPT_BUILD_FILE, DEFAULT_BUILD_FILE).to_string();
    let build_file = self.root_build_directory()?.join(file_name);
    write_build_file(&build_file, &contents)?;

    let actions = self.actions().count();
    let default_targets = self.actions().filter(|a| !a.explicit()).count();
    info!(path = %build_file.display(), actions, "wrote build file");
    Ok(ExecuteReport {
      build_file,
      actions,
      default_targets,
      selected,
    })
  }
}
