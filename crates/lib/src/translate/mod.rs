//! Translation of declarative targets into actions.
//!
//! Every target moves through [`TranslateState`] exactly once:
//!
//! ```text
//! Untranslated --(all dependencies Translated)--> Translating --> Translated
//! ```
//!
//! [`Context::translate`] orders targets with a topological sort of the
//! dependency graph and runs each target kind's `translate` hook. A cycle is
//! reported before any target is touched.

use std::collections::HashMap;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, info};

use crate::graph::{Context, GraphError, TargetId};
use crate::property::{PropertyError, PropertyValue};

/// Per-target translation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranslateState {
  #[default]
  Untranslated,
  Translating,
  Translated,
}

/// Errors raised while translating targets into actions.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
  #[error("dependency cycle between targets: {}", .0.join(", "))]
  Cycle(Vec<String>),

  #[error("target {0} has not been translated yet")]
  NotTranslated(String),

  #[error("target {0} is not being translated")]
  NotTranslating(String),

  #[error("target {target} has no output named {key:?}")]
  NoSuchOutput { target: String, key: String },

  #[error("invalid value for {key} on {target}: {message}")]
  InvalidValue {
    target: String,
    key: String,
    message: String,
  },

  #[error(transparent)]
  Graph(#[from] GraphError),
}

impl From<PropertyError> for TranslateError {
  fn from(e: PropertyError) -> Self {
    TranslateError::Graph(e.into())
  }
}

impl Context {
  /// Translate every untranslated target in dependency order.
  ///
  /// Targets translated by an earlier call are skipped. Any error aborts the
  /// whole pass.
  pub fn translate(&mut self) -> Result<(), TranslateError> {
    let order = self.translation_order()?;
    let mut translated = 0usize;

    for id in order {
      if self.target_ref(id)?.state != TranslateState::Untranslated {
        continue;
      }
      self.target_mut(id)?.state = TranslateState::Translating;

      let kind = self.target_ref(id)?.kind.clone();
      if let Some(kind) = kind {
        let plugin = self.plugin(&kind).ok_or(GraphError::UnknownPlugin(kind))?;
        debug!(target = %self.target_path(id)?, kind = plugin.name(), "translating");
        plugin.translate(self, id)?;
      }

      self.target_mut(id)?.state = TranslateState::Translated;
      translated += 1;
    }

    info!(targets = translated, actions = self.actions.len(), "translation complete");
    Ok(())
  }

  /// Targets in an order where every dependency precedes its dependents.
  fn translation_order(&self) -> Result<Vec<TargetId>, TranslateError> {
    let mut graph: DiGraph<TargetId, ()> = DiGraph::new();
    let mut nodes: HashMap<TargetId, NodeIndex> = HashMap::new();

    for target in &self.targets {
      nodes.insert(target.id, graph.add_node(target.id));
    }
    for target in &self.targets {
      for dep in &target.dependencies {
        let from = *nodes.get(&dep.target).ok_or(GraphError::DanglingTarget(dep.target))?;
        graph.add_edge(from, nodes[&target.id], ());
      }
    }

    match toposort(&graph, None) {
      Ok(sorted) => Ok(sorted.into_iter().map(|idx| graph[idx]).collect()),
      Err(_) => {
        let mut members = Vec::new();
        for scc in tarjan_scc(&graph) {
          let cyclic = scc.len() > 1 || graph.contains_edge(scc[0], scc[0]);
          if cyclic {
            for idx in scc {
              members.push(self.target_path(graph[idx])?);
            }
          }
        }
        members.sort();
        Err(TranslateError::Cycle(members))
      }
    }
  }

  pub fn translate_state(&self, target: TargetId) -> Result<TranslateState, GraphError> {
    Ok(self.target_ref(target)?.state)
  }

  /// Record a value derived during translation, such as a library's final
  /// output path. Only the translating target may record outputs.
  pub fn set_output(&mut self, target: TargetId, key: &str, value: PropertyValue) -> Result<(), TranslateError> {
    if self.target_ref(target)?.state != TranslateState::Translating {
      return Err(TranslateError::NotTranslating(self.target_path(target)?));
    }
    self.target_mut(target)?.outputs.insert(key.to_string(), value);
    Ok(())
  }

  /// A derived value of a translated target.
  pub fn output(&self, target: TargetId, key: &str) -> Result<&PropertyValue, TranslateError> {
    let t = self.target_ref(target)?;
    if t.state != TranslateState::Translated {
      return Err(TranslateError::NotTranslated(self.target_path(target)?));
    }
    t.outputs.get(key).ok_or_else(|| TranslateError::NoSuchOutput {
      target: t.name.clone(),
      key: key.to_string(),
    })
  }

  /// Like [`Context::output`], but a missing key yields `None`.
  pub fn find_output(&self, target: TargetId, key: &str) -> Result<Option<&PropertyValue>, TranslateError> {
    match self.output(target, key) {
      Ok(value) => Ok(Some(value)),
      Err(TranslateError::NoSuchOutput { .. }) => Ok(None),
      Err(e) => Err(e),
    }
  }
}
