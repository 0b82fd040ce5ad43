use std::collections::BTreeMap;

use crate::property::PropertyValue;

use super::{ProjectId, TargetId};

/// A named capability attached to a project or target by a plugin or script.
#[derive(Debug, Clone, PartialEq)]
pub enum Extension {
  /// Plain data (a string, list, map, ...).
  Value(PropertyValue),
  /// A reference to another project.
  Project(ProjectId),
  /// A reference to a target.
  Target(TargetId),
  /// Marker left by [`crate::plugin::TargetKind::apply`] naming the plugin.
  Plugin(String),
}

/// Typed extension registry. Lookups return `None` for unknown keys; the
/// owning [`crate::graph::Context`] turns that into a named error.
#[derive(Debug, Default, Clone)]
pub struct Extensions {
  entries: BTreeMap<String, Extension>,
}

impl Extensions {
  /// Attach `extension` under `key`, returning the value it replaced.
  pub fn insert(&mut self, key: &str, extension: Extension) -> Option<Extension> {
    self.entries.insert(key.to_string(), extension)
  }

  pub fn find(&self, key: &str) -> Option<&Extension> {
    self.entries.get(key)
  }
}
