use std::collections::BTreeMap;

use crate::property::{PropertyBag, PropertyValue};
use crate::translate::TranslateState;

use super::extension::Extensions;
use super::{ActionId, ProjectId, TargetId};

/// An edge to another target, with properties from the dependency schema.
#[derive(Debug, Clone)]
pub struct Dependency {
  pub target: TargetId,
  pub props: PropertyBag,
}

/// A buildable unit owned by exactly one project.
#[derive(Debug)]
pub struct Target {
  pub(crate) id: TargetId,
  pub(crate) project: ProjectId,
  pub(crate) name: String,
  pub(crate) kind: Option<String>,
  pub(crate) props: PropertyBag,
  pub(crate) exported: PropertyBag,
  pub(crate) dependencies: Vec<Dependency>,
  pub(crate) actions: Vec<ActionId>,
  pub(crate) state: TranslateState,
  pub(crate) outputs: BTreeMap<String, PropertyValue>,
  pub(crate) extensions: Extensions,
}

impl Target {
  pub(crate) fn new(id: TargetId, project: ProjectId, name: &str, kind: Option<String>) -> Self {
    Self {
      id,
      project,
      name: name.to_string(),
      kind,
      props: PropertyBag::new(),
      exported: PropertyBag::new(),
      dependencies: Vec::new(),
      actions: Vec::new(),
      state: TranslateState::Untranslated,
      outputs: BTreeMap::new(),
      extensions: Extensions::default(),
    }
  }

  pub fn id(&self) -> TargetId {
    self.id
  }

  pub fn project(&self) -> ProjectId {
    self.project
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Name of the plugin kind that translates this target, if any.
  pub fn kind(&self) -> Option<&str> {
    self.kind.as_deref()
  }

  pub fn props(&self) -> &PropertyBag {
    &self.props
  }

  pub fn exported(&self) -> &PropertyBag {
    &self.exported
  }

  pub fn dependencies(&self) -> &[Dependency] {
    &self.dependencies
  }

  pub fn actions(&self) -> &[ActionId] {
    &self.actions
  }

  pub fn state(&self) -> TranslateState {
    self.state
  }

  pub fn extensions(&self) -> &Extensions {
    &self.extensions
  }
}
