//! The built-in `command` target kind: run arbitrary commands over a list of
//! input files to produce output files.
//!
//! ```lua
//! local gen = project:task("gen", "command")
//! gen:set("command.commands", { { "protoc", "--cpp_out=out", "$in" } })
//! gen:set("command.inputs", { "api.proto" })
//! gen:set("command.outputs", { "api.pb.cc" })
//! ```
//!
//! Relative inputs resolve against the project directory, relative outputs
//! against `command.output_dir`. Outputs of `command` dependencies become
//! inputs of the dependent target, unless the edge sets
//! `command.consume = false`, which turns them into order-only dependencies.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::{SchemaRegistry, TargetKind};
use crate::action::{ActionOptions, DepsMode};
use crate::graph::{Context, GraphError, TargetId};
use crate::property::{PropertyError, PropertyType, PropertyValue};
use crate::translate::TranslateError;

/// Output key under which translated targets publish their output files.
pub const OUTPUTS: &str = "outputs";

#[derive(Debug, Default, Clone, Copy)]
pub struct CommandKind;

impl CommandKind {
  pub const NAME: &'static str = "command";
}

#[derive(Debug, Deserialize)]
struct CommandProps {
  #[serde(default)]
  commands: Vec<Vec<String>>,
  #[serde(default)]
  inputs: Vec<String>,
  #[serde(default)]
  outputs: Vec<String>,
  output_dir: Option<String>,
  #[serde(default)]
  environ: BTreeMap<String, String>,
  #[serde(default)]
  foreach: bool,
  #[serde(default)]
  explicit: bool,
  pool: Option<String>,
  deps_mode: Option<String>,
  depfile: Option<String>,
  msvc_deps_prefix: Option<String>,
  description: Option<String>,
  #[serde(default)]
  order_only: Vec<String>,
}

impl TargetKind for CommandKind {
  fn name(&self) -> &str {
    Self::NAME
  }

  fn register(&self, schemas: &mut SchemaRegistry<'_>) -> Result<(), PropertyError> {
    let paths = || PropertyType::list_of(PropertyType::Path);
    let t = &mut *schemas.targets;
    t.add(
      "command.commands",
      PropertyType::list_of(PropertyType::list_of(PropertyType::String)),
      None,
    )?;
    t.add("command.inputs", paths(), None)?;
    t.add("command.outputs", paths(), None)?;
    t.add("command.output_dir", PropertyType::Path, None)?;
    t.add("command.environ", PropertyType::map_of(PropertyType::String), None)?;
    t.add("command.foreach", PropertyType::Bool, Some(false.into()))?;
    t.add("command.explicit", PropertyType::Bool, Some(false.into()))?;
    t.add("command.pool", PropertyType::String, None)?;
    t.add("command.deps_mode", PropertyType::String, Some("none".into()))?;
    t.add("command.depfile", PropertyType::Path, None)?;
    t.add("command.msvc_deps_prefix", PropertyType::String, None)?;
    t.add("command.description", PropertyType::String, None)?;
    t.add("command.implicit_deps", paths(), None)?;
    t.add("command.order_only", paths(), None)?;

    schemas
      .dependencies
      .add("command.consume", PropertyType::Bool, Some(true.into()))?;
    Ok(())
  }

  fn mounted(&self, ctx: &mut Context, target: TargetId) -> Result<(), GraphError> {
    if ctx.get_prop(target, "command.output_dir")?.is_none() {
      let t = ctx.target_ref(target)?;
      let dir = ctx.build_directory(t.project())?.join(t.name());
      ctx.set_prop(target, "command.output_dir", path_value(&dir))?;
    }
    Ok(())
  }

  fn translate(&self, ctx: &mut Context, target: TargetId) -> Result<(), TranslateError> {
    let props: CommandProps = ctx.get_props_as(target, "command")?;
    if props.commands.is_empty() {
      debug!(target = %ctx.target_path(target)?, "no commands, nothing to translate");
      return Ok(());
    }

    if let Some(mode) = &props.deps_mode
      && let Err(message) = mode.parse::<DepsMode>()
    {
      return Err(TranslateError::InvalidValue {
        target: ctx.target_path(target)?,
        key: "command.deps_mode".to_string(),
        message,
      });
    }

    let t = ctx.target_ref(target)?;
    let directory = ctx.project_ref(t.project())?.directory().to_path_buf();
    let output_dir = match &props.output_dir {
      Some(dir) => directory.join(dir),
      None => ctx.build_directory(t.project())?.join(t.name()),
    };

    let mut inputs = resolve_all(&directory, &props.inputs);
    let outputs = resolve_all(&output_dir, &props.outputs);
    let mut order_only = resolve_all(&directory, &props.order_only);
    let mut implicit: Vec<String> = ctx
      .get_prop_join(target, "command.implicit_deps")?
      .iter()
      .filter_map(PropertyValue::as_str)
      .map(|p| resolve(&directory, p))
      .collect();

    let mut consumed = Vec::new();
    for (index, dep) in ctx.dependencies(target)?.into_iter().enumerate() {
      let Some(files) = ctx.find_output(dep, OUTPUTS)? else {
        continue;
      };
      let files = files.to_strings();
      let consume = ctx
        .dep_prop(target, index, "command.consume")?
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
      if consume {
        consumed.extend(files);
      } else {
        order_only.extend(files);
      }
    }
    // Each foreach edge has exactly one input; dependency outputs go to every
    // edge as implicit inputs instead.
    if props.foreach {
      implicit.extend(consumed);
    } else {
      inputs.extend(consumed);
    }

    let options = ActionOptions {
      environ: props.environ,
      deps: Vec::new(),
      input: true,
      explicit: props.explicit,
      syncio: props.foreach,
      pool: props.pool,
      deps_mode: props.deps_mode,
      depfile: props.depfile.map(|f| resolve(&output_dir, &f)),
      msvc_deps_prefix: props.msvc_deps_prefix,
      description: props.description,
    };
    let action = ctx.add_action(target, "run", props.commands, options)?;
    ctx
      .add_buildset(action)?
      .add("in", inputs)
      .add("out", outputs.iter().cloned())
      .add("implicit", implicit)
      .add("order_only", order_only);

    ctx.set_output(target, OUTPUTS, PropertyValue::string_list(outputs))?;
    Ok(())
  }
}

fn path_value(path: &Path) -> PropertyValue {
  PropertyValue::String(path.to_string_lossy().into_owned())
}

fn resolve(base: &Path, path: &str) -> String {
  let path = PathBuf::from(path);
  if path.is_absolute() {
    path.to_string_lossy().into_owned()
  } else {
    base.join(path).to_string_lossy().into_owned()
  }
}

fn resolve_all(base: &Path, paths: &[String]) -> Vec<String> {
  paths.iter().map(|p| resolve(base, p)).collect()
}
