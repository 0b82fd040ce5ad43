//! Target kinds and the plugin loader.
//!
//! A plugin is a [`TargetKind`]: it registers its property keys once, can
//! attach itself to a project, fills in defaults when a target of its kind is
//! created, and turns such targets into actions during translation.

mod command;

pub use command::CommandKind;

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::graph::{Context, Extension, GraphError, ProjectId, TargetId};
use crate::property::{PropertyError, PropertySchema};
use crate::translate::TranslateError;

/// Mutable access to both schemas of a context during registration.
pub struct SchemaRegistry<'a> {
  pub targets: &'a mut PropertySchema,
  pub dependencies: &'a mut PropertySchema,
}

pub trait TargetKind {
  /// Name used for `task(name, kind)` and `apply(plugin)`.
  fn name(&self) -> &str;

  /// Register the target and dependency properties of this kind. Runs once
  /// per context.
  fn register(&self, schemas: &mut SchemaRegistry<'_>) -> Result<(), PropertyError>;

  /// Attach the plugin to a project. The default records a
  /// [`Extension::Plugin`] marker under the plugin's name.
  fn apply(&self, ctx: &mut Context, project: ProjectId) -> Result<(), GraphError> {
    ctx.add_project_extension(project, self.name(), Extension::Plugin(self.name().to_string()))
  }

  /// Called once when a target of this kind is created.
  fn mounted(&self, _ctx: &mut Context, _target: TargetId) -> Result<(), GraphError> {
    Ok(())
  }

  /// Produce the actions of `target`. All of its dependencies are translated.
  fn translate(&self, ctx: &mut Context, target: TargetId) -> Result<(), TranslateError>;
}

/// Resolves plugin names to target kinds.
pub trait PluginLoader {
  fn load(&self, name: &str) -> Option<Rc<dyn TargetKind>>;
}

/// Loader for the kinds that ship with loom.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinLoader;

impl PluginLoader for BuiltinLoader {
  fn load(&self, name: &str) -> Option<Rc<dyn TargetKind>> {
    match name {
      CommandKind::NAME => Some(Rc::new(CommandKind)),
      _ => None,
    }
  }
}

/// Plugins loaded into one context, by name.
#[derive(Default)]
pub struct PluginRegistry {
  plugins: BTreeMap<String, Rc<dyn TargetKind>>,
}

impl PluginRegistry {
  pub fn get(&self, name: &str) -> Option<Rc<dyn TargetKind>> {
    self.plugins.get(name).cloned()
  }

  pub fn insert(&mut self, kind: Rc<dyn TargetKind>) {
    self.plugins.insert(kind.name().to_string(), kind);
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.plugins.keys().map(String::as_str)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::settings::Settings;
  use std::cell::Cell;
  use tempfile::TempDir;

  struct Counting {
    registered: Rc<Cell<u32>>,
  }

  impl TargetKind for Counting {
    fn name(&self) -> &str {
      "counting"
    }

    fn register(&self, schemas: &mut SchemaRegistry<'_>) -> Result<(), PropertyError> {
      self.registered.set(self.registered.get() + 1);
      schemas
        .targets
        .add("counting.value", crate::property::PropertyType::Integer, Some(0i64.into()))
    }

    fn translate(&self, _ctx: &mut Context, _target: TargetId) -> Result<(), TranslateError> {
      Ok(())
    }
  }

  struct CountingLoader {
    registered: Rc<Cell<u32>>,
  }

  impl PluginLoader for CountingLoader {
    fn load(&self, name: &str) -> Option<Rc<dyn TargetKind>> {
      (name == "counting").then(|| {
        Rc::new(Counting {
          registered: self.registered.clone(),
        }) as Rc<dyn TargetKind>
      })
    }
  }

  #[test]
  fn plugin_schema_registers_once() {
    let temp = TempDir::new().unwrap();
    let registered = Rc::new(Cell::new(0));
    let mut ctx = Context::with_loader(
      Settings::default(),
      Rc::new(CountingLoader {
        registered: registered.clone(),
      }),
    );
    let root = ctx.project(temp.path()).unwrap();

    ctx.apply_plugin(root, "counting").unwrap();
    ctx.task(root, "a", Some("counting")).unwrap();
    ctx.task(root, "b", Some("counting")).unwrap();

    assert_eq!(registered.get(), 1);
    assert!(ctx.target_schema().def("counting.value").is_ok());
    assert_eq!(
      ctx.project_extension(root, "counting").unwrap(),
      &Extension::Plugin("counting".to_string())
    );
  }

  #[test]
  fn unknown_kind_fails() {
    let temp = TempDir::new().unwrap();
    let mut ctx = Context::new(Settings::default());
    let root = ctx.project(temp.path()).unwrap();

    let err = ctx.task(root, "a", Some("cxx")).unwrap_err();
    assert!(matches!(err, GraphError::UnknownPlugin(ref name) if name == "cxx"));
    assert!(ctx.tasks(root).unwrap().is_empty());
  }

  #[test]
  fn builtin_loader_knows_command() {
    assert!(BuiltinLoader.load("command").is_some());
    assert!(BuiltinLoader.load("java").is_none());
  }
}
