//! Export of the action graph to a ninja build file.
//!
//! Every statement is planned and checked before anything is rendered, and
//! [`write_build_file`] replaces the file on disk only afterwards, so an
//! invalid graph never leaves a partial build file behind.

pub mod ninja;
pub mod shell;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::hash::Hash;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::action::{Action, DepsMode};
use crate::cache::{CacheError, CacheSummary};
use crate::consts::NINJA_REQUIRED_VERSION;
use crate::graph::{Context, GraphError, Target};
use crate::platform::os::Os;
use crate::platform::target_os;
use ninja::{Edge, Rule, Writer};
use shell::{CommandProbe, PathProbe};

static IDENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.]+$").expect("valid regex"));

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
  #[error("{name:?} is not a valid rule name (from action {action})")]
  InvalidIdentifier { action: String, name: String },

  #[error("actions {first} and {second} both map to rule name {name:?}")]
  RuleCollision {
    first: String,
    second: String,
    name: String,
  },

  #[error("{output:?} is produced by both {first} and {second}")]
  OutputCollision {
    output: String,
    first: String,
    second: String,
  },

  #[error("action {action} uses invalid pool name {pool:?}")]
  InvalidPool { action: String, pool: String },

  #[error("action {action}: {message}")]
  InvalidDepsMode { action: String, message: String },

  #[error("action {action}: {key} must not contain line breaks")]
  LineBreak { action: String, key: String },

  #[error("foreach action {action} has {inputs} inputs but {outputs} outputs")]
  ForeachMismatch {
    action: String,
    inputs: usize,
    outputs: usize,
  },

  #[error("{0}")]
  Platform(String),

  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Cache(#[from] CacheError),

  #[error("failed to write {path}: {source}")]
  Write { path: PathBuf, source: io::Error },
}

/// Rule name for a qualified action name: `:` becomes `.`, `-` becomes `_`.
pub fn rule_name(qualified_name: &str) -> String {
  qualified_name.replace(':', ".").replace('-', "_")
}

pub fn is_valid_ident(name: &str) -> bool {
  IDENT_RE.is_match(name)
}

/// One `build` statement with owned file lists.
#[derive(Debug, Clone, Default)]
struct Statement {
  rule: String,
  outputs: Vec<String>,
  inputs: Vec<String>,
  implicit: Vec<String>,
  order_only: Vec<String>,
}

impl Statement {
  fn new(rule: &str, output: &str) -> Self {
    Self {
      rule: rule.to_string(),
      outputs: vec![output.to_string()],
      ..Default::default()
    }
  }

  fn edge(&self) -> Edge<'_> {
    Edge {
      outputs: strs(&self.outputs),
      inputs: strs(&self.inputs),
      implicit: strs(&self.implicit),
      order_only: strs(&self.order_only),
    }
  }
}

/// Rule and statements of one action.
struct ActionPlan<'a> {
  action: &'a Action,
  rule: String,
  command: String,
  deps: Option<&'static str>,
  statements: Vec<Statement>,
}

/// Render the build file for a translated context, probing the current
/// `PATH` to decide which commands need a shell.
pub fn export_graph(ctx: &Context, summary: &CacheSummary) -> Result<String, ExportError> {
  let os = target_os(ctx.settings()).map_err(ExportError::Platform)?;
  export_graph_with(ctx, summary, os, &PathProbe::from_env(os))
}

pub fn export_graph_with(
  ctx: &Context,
  summary: &CacheSummary,
  os: Os,
  probe: &dyn CommandProbe,
) -> Result<String, ExportError> {
  let mut actions: Vec<&Action> = ctx.actions().collect();
  actions.sort_by(|a, b| a.qualified_name().cmp(b.qualified_name()));

  validate(&actions)?;

  let mut plans = Vec::with_capacity(actions.len());
  for &action in &actions {
    plans.push(plan_action(ctx, action, os, probe)?);
  }
  let mut aliases = Vec::new();
  for target in ctx.targets() {
    aliases.push(plan_alias(ctx, target)?);
  }
  check_outputs(&plans, &aliases)?;

  let mut w = Writer::new();
  w.raw(&summary.render()?);
  w.comment("generated by loom, do not edit");
  w.newline();
  w.variable("ninja_required_version", NINJA_REQUIRED_VERSION, 0);
  let builddir = ctx.root_build_directory()?;
  w.variable("builddir", &builddir.to_string_lossy(), 0);
  w.newline();

  let mut defaults = Vec::new();
  for plan in &plans {
    let action = plan.action;
    w.rule(
      &plan.rule,
      &Rule {
        command: &plan.command,
        description: action.description(),
        pool: action.pool(),
        deps: plan.deps,
        depfile: action.depfile(),
        msvc_deps_prefix: action.msvc_deps_prefix(),
      },
    );
    for statement in &plan.statements {
      w.build(&statement.rule, &statement.edge());
    }
    w.newline();
    debug!(action = action.qualified_name(), edges = plan.statements.len(), "exported action");
    if !action.explicit() {
      defaults.push(action.qualified_name());
    }
  }

  // One alias per target, so dependents can name whole targets.
  for alias in &aliases {
    w.build(&alias.rule, &alias.edge());
  }

  if !defaults.is_empty() {
    w.newline();
    w.default_targets(&defaults);
  }

  info!(actions = actions.len(), defaults = defaults.len(), "exported build graph");
  Ok(w.finish())
}

fn validate(actions: &[&Action]) -> Result<(), ExportError> {
  let mut rules: HashMap<String, &str> = HashMap::new();
  for action in actions {
    let name = rule_name(action.qualified_name());
    if !is_valid_ident(&name) {
      return Err(ExportError::InvalidIdentifier {
        action: action.qualified_name().to_string(),
        name,
      });
    }
    if let Some(first) = rules.insert(name.clone(), action.qualified_name()) {
      return Err(ExportError::RuleCollision {
        first: first.to_string(),
        second: action.qualified_name().to_string(),
        name,
      });
    }
    if let Some(pool) = action.pool()
      && !is_valid_ident(pool)
    {
      return Err(ExportError::InvalidPool {
        action: action.qualified_name().to_string(),
        pool: pool.to_string(),
      });
    }
    if let Some(mode) = action.deps_mode()
      && let Err(message) = mode.parse::<DepsMode>()
    {
      return Err(ExportError::InvalidDepsMode {
        action: action.qualified_name().to_string(),
        message,
      });
    }
    if action.foreach() {
      for set in action.buildsets() {
        let (inputs, outputs) = (set.inputs().len(), set.outputs().len());
        if inputs != outputs {
          return Err(ExportError::ForeachMismatch {
            action: action.qualified_name().to_string(),
            inputs,
            outputs,
          });
        }
      }
    }
  }
  Ok(())
}

/// Rule variables end at the line break, so none of them may contain one.
fn check_line_breaks(qid: &str, variables: &[(&str, Option<&str>)]) -> Result<(), ExportError> {
  for (key, value) in variables {
    if let Some(value) = value
      && value.contains(['\n', '\r'])
    {
      return Err(ExportError::LineBreak {
        action: qid.to_string(),
        key: key.to_string(),
      });
    }
  }
  Ok(())
}

fn plan_action<'a>(
  ctx: &Context,
  action: &'a Action,
  os: Os,
  probe: &dyn CommandProbe,
) -> Result<ActionPlan<'a>, ExportError> {
  let qid = action.qualified_name();
  let rule = rule_name(qid);
  let command = shell::command_line(action.commands(), action.environ(), os, probe);
  check_line_breaks(
    qid,
    &[
      ("command", Some(command.as_str())),
      ("description", action.description()),
      ("depfile", action.depfile()),
      ("msvc_deps_prefix", action.msvc_deps_prefix()),
    ],
  )?;
  let deps = match action.deps_mode().map(str::parse::<DepsMode>) {
    Some(Ok(DepsMode::None)) | None => None,
    Some(Ok(mode)) => Some(mode.as_str()),
    Some(Err(message)) => {
      return Err(ExportError::InvalidDepsMode {
        action: qid.to_string(),
        message,
      });
    }
  };

  // Shared by every edge of the action.
  let mut shared: Vec<String> = Vec::new();
  for &dep in action.deps() {
    shared.push(ctx.action_ref(dep)?.qualified_name().to_string());
  }
  let target = ctx.target_ref(action.target())?;
  for dep in target.dependencies() {
    shared.push(ctx.target_path(dep.target)?);
  }

  let mut statements = Vec::new();
  let mut all_outputs: Vec<String> = Vec::new();
  // Build sets without outputs share a single edge named after the action.
  let mut unnamed: Option<Statement> = None;
  for set in action.buildsets() {
    let outputs = owned(set.outputs());
    let mut implicit = owned(set.implicit());
    implicit.extend(shared.iter().cloned());
    let implicit = dedup(implicit);
    let order_only = owned(set.order_only());

    if action.foreach() {
      for (input, output) in set.inputs().into_iter().zip(&outputs) {
        statements.push(Statement {
          rule: rule.clone(),
          outputs: vec![output.clone()],
          inputs: vec![input.to_string()],
          implicit: implicit.clone(),
          order_only: order_only.clone(),
        });
      }
    } else if outputs.is_empty() {
      let edge = unnamed.get_or_insert_with(|| Statement::new(&rule, qid));
      edge.inputs.extend(owned(set.inputs()));
      edge.implicit.extend(implicit);
      edge.order_only.extend(order_only);
    } else {
      statements.push(Statement {
        rule: rule.clone(),
        outputs: outputs.clone(),
        inputs: owned(set.inputs()),
        implicit,
        order_only,
      });
    }
    all_outputs.extend(outputs);
  }
  if action.buildsets().is_empty() {
    let mut edge = Statement::new(&rule, qid);
    edge.implicit = dedup(shared.clone());
    unnamed = Some(edge);
  }

  match unnamed {
    Some(mut edge) => {
      // Asking for the action id builds the named outputs too.
      edge.implicit.extend(all_outputs);
      edge.inputs = dedup(edge.inputs);
      edge.implicit = dedup(edge.implicit);
      edge.order_only = dedup(edge.order_only);
      statements.push(edge);
    }
    None if all_outputs.iter().any(|o| o == qid) => {}
    None => {
      let mut alias = Statement::new("phony", qid);
      if all_outputs.is_empty() {
        // A foreach action over nothing still waits for its dependencies.
        alias.implicit = dedup(shared);
      } else {
        alias.inputs = all_outputs;
      }
      statements.push(alias);
    }
  }

  Ok(ActionPlan {
    action,
    rule,
    command,
    deps,
    statements,
  })
}

/// Phony `project:target` over the target's own actions and the aliases of
/// its dependency targets.
fn plan_alias(ctx: &Context, target: &Target) -> Result<Statement, ExportError> {
  let mut alias = Statement::new("phony", &ctx.target_path(target.id())?);
  for &action in target.actions() {
    alias.inputs.push(ctx.action_ref(action)?.qualified_name().to_string());
  }
  alias.inputs.sort();
  for dep in target.dependencies() {
    alias.inputs.push(ctx.target_path(dep.target)?);
  }
  alias.inputs = dedup(alias.inputs);
  Ok(alias)
}

/// Every output name may be produced by exactly one statement.
fn check_outputs(plans: &[ActionPlan<'_>], aliases: &[Statement]) -> Result<(), ExportError> {
  let mut producers: HashMap<&str, String> = HashMap::new();
  let owned_by_actions = plans.iter().flat_map(|plan| {
    let owner = format!("action {}", plan.action.qualified_name());
    plan.statements.iter().map(move |s| (s, owner.clone()))
  });
  let owned_by_targets = aliases.iter().map(|s| (s, format!("target {}", s.outputs[0])));

  for (statement, owner) in owned_by_actions.chain(owned_by_targets) {
    for output in &statement.outputs {
      if let Some(first) = producers.insert(output.as_str(), owner.clone()) {
        return Err(ExportError::OutputCollision {
          output: output.clone(),
          first,
          second: owner,
        });
      }
    }
  }
  Ok(())
}

fn strs(items: &[String]) -> Vec<&str> {
  items.iter().map(String::as_str).collect()
}

fn owned(items: Vec<&str>) -> Vec<String> {
  items.into_iter().map(str::to_string).collect()
}

fn dedup<T: Eq + Hash + Clone>(items: Vec<T>) -> Vec<T> {
  let mut seen = HashSet::new();
  items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

/// Replace `path` with `contents` atomically: write a sibling temp file, then
/// rename it over the target.
pub fn write_build_file(path: &Path, contents: &str) -> Result<(), ExportError> {
  let write_err = |source| ExportError::Write {
    path: path.to_path_buf(),
    source,
  };
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(write_err)?;
  }
  let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  temp_name.push(".tmp");
  let temp_path = path.with_file_name(temp_name);

  fs::write(&temp_path, contents).map_err(write_err)?;
  fs::rename(&temp_path, path).map_err(write_err)?;
  debug!(path = %path.display(), bytes = contents.len(), "wrote build file");
  Ok(())
}
