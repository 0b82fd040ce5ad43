use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::extension::Extensions;
use super::{ProjectId, TargetId};

/// A directory-bound collection of tasks, usually populated by a build script.
///
/// Parent and children are stored as handles into the owning
/// [`Context`](super::Context); use the context to follow them.
#[derive(Debug)]
pub struct Project {
  pub(crate) id: ProjectId,
  pub(crate) parent: Option<ProjectId>,
  pub(crate) directory: PathBuf,
  pub(crate) name: Option<String>,
  pub(crate) build_directory: Option<PathBuf>,
  pub(crate) tasks: BTreeMap<String, TargetId>,
  pub(crate) subprojects: BTreeMap<PathBuf, ProjectId>,
  pub(crate) extensions: Extensions,
}

impl Project {
  pub(crate) fn new(id: ProjectId, parent: Option<ProjectId>, directory: PathBuf) -> Self {
    Self {
      id,
      parent,
      directory,
      name: None,
      build_directory: None,
      tasks: BTreeMap::new(),
      subprojects: BTreeMap::new(),
      extensions: Extensions::default(),
    }
  }

  pub fn id(&self) -> ProjectId {
    self.id
  }

  pub fn parent(&self) -> Option<ProjectId> {
    self.parent
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  /// Explicit name, or one derived from the directory's base name.
  pub fn name(&self) -> String {
    match &self.name {
      Some(name) => name.clone(),
      None => directory_name(&self.directory),
    }
  }

  pub fn explicit_build_directory(&self) -> Option<&Path> {
    self.build_directory.as_deref()
  }

  pub fn task_names(&self) -> impl Iterator<Item = &str> {
    self.tasks.keys().map(String::as_str)
  }

  pub fn task(&self, name: &str) -> Option<TargetId> {
    self.tasks.get(name).copied()
  }

  pub fn tasks(&self) -> impl Iterator<Item = TargetId> + '_ {
    self.tasks.values().copied()
  }

  pub fn subprojects(&self) -> impl Iterator<Item = ProjectId> + '_ {
    self.subprojects.values().copied()
  }

  pub fn extensions(&self) -> &Extensions {
    &self.extensions
  }

  /// Resolve `sub_path` against the project directory.
  pub fn file(&self, sub_path: &str) -> PathBuf {
    self.directory.join(sub_path)
  }
}

/// Base name of `directory` as a valid project name: every character outside
/// `[A-Za-z0-9_-]` becomes `_`.
pub(crate) fn directory_name(directory: &Path) -> String {
  let Some(base) = directory.file_name() else {
    return "root".to_string();
  };
  base
    .to_string_lossy()
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
    .collect()
}
