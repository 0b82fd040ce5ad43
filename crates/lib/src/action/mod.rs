//! Concrete build actions produced by translation.
//!
//! An [`Action`] is one rule in the exported build file: a list of commands
//! plus everything the executor needs to schedule it. The files it reads and
//! writes live in one or more [`BuildSet`]s; a handler that compiles many
//! sources with the same flags adds one build set per source and still
//! reports a single action.
//!
//! Actions can only be added while their target is being translated, which
//! guarantees that every dependency target already has its final actions.

mod buildset;

pub use buildset::BuildSet;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::graph::{ActionId, Context, GraphError, TargetId};
use crate::translate::{TranslateError, TranslateState};

/// Dependency-file discovery mode of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepsMode {
  #[default]
  None,
  /// Makefile-style depfile written by gcc/clang (`-MD -MF`).
  Gcc,
  /// `/showIncludes` output of the MSVC compiler.
  Msvc,
}

impl DepsMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      DepsMode::None => "none",
      DepsMode::Gcc => "gcc",
      DepsMode::Msvc => "msvc",
    }
  }
}

impl FromStr for DepsMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "" | "none" => Ok(DepsMode::None),
      "gcc" => Ok(DepsMode::Gcc),
      "msvc" => Ok(DepsMode::Msvc),
      other => Err(format!("invalid deps mode {:?}: expected none, gcc or msvc", other)),
    }
  }
}

impl fmt::Display for DepsMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Optional settings for [`Context::add_action`].
#[derive(Debug, Clone, Default)]
pub struct ActionOptions {
  /// Environment variables set for every command of the action.
  pub environ: BTreeMap<String, String>,
  /// Explicit predecessor actions.
  pub deps: Vec<ActionId>,
  /// Depend on every action of every dependency target.
  pub input: bool,
  /// Exclude the action from the default build set.
  pub explicit: bool,
  /// Inputs and outputs of each build set correspond one to one.
  pub syncio: bool,
  pub pool: Option<String>,
  /// Raw dependency-file mode; checked by the exporter.
  pub deps_mode: Option<String>,
  pub depfile: Option<String>,
  /// Prefix of the `/showIncludes` lines for `msvc` mode on localized compilers.
  pub msvc_deps_prefix: Option<String>,
  pub description: Option<String>,
}

/// A rule in the exported graph, owned by one target.
#[derive(Debug, Clone)]
pub struct Action {
  pub(crate) id: ActionId,
  pub(crate) target: TargetId,
  pub(crate) name: String,
  pub(crate) qualified_name: String,
  pub(crate) commands: Vec<Vec<String>>,
  pub(crate) options: ActionOptions,
  pub(crate) buildsets: Vec<BuildSet>,
}

impl Action {
  pub fn id(&self) -> ActionId {
    self.id
  }

  pub fn target(&self) -> TargetId {
    self.target
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// `project:target:action`.
  pub fn qualified_name(&self) -> &str {
    &self.qualified_name
  }

  pub fn commands(&self) -> &[Vec<String>] {
    &self.commands
  }

  pub fn environ(&self) -> &BTreeMap<String, String> {
    &self.options.environ
  }

  pub fn deps(&self) -> &[ActionId] {
    &self.options.deps
  }

  pub fn explicit(&self) -> bool {
    self.options.explicit
  }

  pub fn foreach(&self) -> bool {
    self.options.syncio
  }

  pub fn pool(&self) -> Option<&str> {
    self.options.pool.as_deref()
  }

  pub fn deps_mode(&self) -> Option<&str> {
    self.options.deps_mode.as_deref()
  }

  pub fn depfile(&self) -> Option<&str> {
    self.options.depfile.as_deref()
  }

  pub fn msvc_deps_prefix(&self) -> Option<&str> {
    self.options.msvc_deps_prefix.as_deref()
  }

  pub fn description(&self) -> Option<&str> {
    self.options.description.as_deref()
  }

  pub fn buildsets(&self) -> &[BuildSet] {
    &self.buildsets
  }

  /// Start a new, empty build set and return it for filling.
  pub fn add_buildset(&mut self) -> &mut BuildSet {
    self.buildsets.push(BuildSet::new());
    let last = self.buildsets.len() - 1;
    &mut self.buildsets[last]
  }
}

impl Context {
  /// Add an action to `target`, which must currently be translating.
  pub fn add_action(
    &mut self,
    target: TargetId,
    name: &str,
    commands: Vec<Vec<String>>,
    mut options: ActionOptions,
  ) -> Result<ActionId, TranslateError> {
    let t = self.target_ref(target)?;
    if t.state != TranslateState::Translating {
      return Err(TranslateError::NotTranslating(self.target_path(target)?));
    }
    for &existing in &t.actions {
      if self.action_ref(existing)?.name == name {
        return Err(
          GraphError::DuplicateAction {
            target: self.target_path(target)?,
            name: name.to_string(),
          }
          .into(),
        );
      }
    }
    for &dep in &options.deps {
      self.action_ref(dep)?;
    }

    if options.input {
      for dep in t.dependencies.iter().map(|d| d.target) {
        for &action in &self.target_ref(dep)?.actions {
          if !options.deps.contains(&action) {
            options.deps.push(action);
          }
        }
      }
    }

    let qualified_name = format!("{}:{}", self.target_path(target)?, name);
    let id = ActionId(self.actions.len());
    debug!(action = %qualified_name, commands = commands.len(), "adding action");
    self.actions.push(Action {
      id,
      target,
      name: name.to_string(),
      qualified_name,
      commands,
      options,
      buildsets: Vec::new(),
    });
    self.target_mut(target)?.actions.push(id);
    Ok(id)
  }

  /// Start a new build set on `action`.
  pub fn add_buildset(&mut self, action: ActionId) -> Result<&mut BuildSet, GraphError> {
    Ok(self.action_mut(action)?.add_buildset())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::settings::Settings;
  use tempfile::TempDir;

  fn translating(ctx: &mut Context, target: TargetId) {
    ctx.target_mut(target).unwrap().state = TranslateState::Translating;
  }

  #[test]
  fn deps_mode_parses_known_values() {
    assert_eq!("gcc".parse::<DepsMode>().unwrap(), DepsMode::Gcc);
    assert_eq!("".parse::<DepsMode>().unwrap(), DepsMode::None);
    assert!("clang".parse::<DepsMode>().is_err());
  }

  #[test]
  fn action_requires_translating_target() {
    let temp = TempDir::new().unwrap();
    let mut ctx = Context::new(Settings::default());
    let root = ctx.project(temp.path()).unwrap();
    let t = ctx.task(root, "gen", None).unwrap();

    let err = ctx.add_action(t, "run", vec![], ActionOptions::default()).unwrap_err();
    assert!(matches!(err, TranslateError::NotTranslating(_)));
  }

  #[test]
  fn qualified_name_and_uniqueness() {
    let temp = TempDir::new().unwrap();
    let mut ctx = Context::new(Settings::default());
    let root = ctx.project(temp.path()).unwrap();
    ctx.set_project_name(root, "app").unwrap();
    let t = ctx.task(root, "gen", None).unwrap();
    translating(&mut ctx, t);

    let id = ctx
      .add_action(t, "run", vec![vec!["true".into()]], ActionOptions::default())
      .unwrap();
    assert_eq!(ctx.action_ref(id).unwrap().qualified_name(), "app:gen:run");

    let err = ctx.add_action(t, "run", vec![], ActionOptions::default()).unwrap_err();
    assert!(matches!(err, TranslateError::Graph(GraphError::DuplicateAction { .. })));
  }

  #[test]
  fn input_flag_depends_on_dependency_actions() {
    let temp = TempDir::new().unwrap();
    let mut ctx = Context::new(Settings::default());
    let root = ctx.project(temp.path()).unwrap();
    let lib = ctx.task(root, "lib", None).unwrap();
    let app = ctx.task(root, "app", None).unwrap();
    ctx.add_dependency(app, lib, BTreeMap::new()).unwrap();

    translating(&mut ctx, lib);
    let compile = ctx.add_action(lib, "compile", vec![], ActionOptions::default()).unwrap();
    let archive = ctx.add_action(lib, "archive", vec![], ActionOptions::default()).unwrap();
    ctx.target_mut(lib).unwrap().state = TranslateState::Translated;

    translating(&mut ctx, app);
    let link = ctx
      .add_action(
        app,
        "link",
        vec![],
        ActionOptions {
          input: true,
          ..Default::default()
        },
      )
      .unwrap();
    assert_eq!(ctx.action_ref(link).unwrap().deps(), &[compile, archive]);

    let set = ctx.add_buildset(link).unwrap();
    set.add("in", ["lib.a"]);
    assert_eq!(ctx.action_ref(link).unwrap().buildsets().len(), 1);
  }
}
