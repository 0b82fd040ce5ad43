//! Build script evaluation.
//!
//! [`evaluate`] runs the root project's `build.loom.lua` (and, through
//! `project:subproject`, every subproject script it pulls in) and hands back
//! the populated [`Context`]. Nothing is translated or exported here.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mlua::prelude::*;
use tracing::{debug, info};

use crate::consts::BUILD_SCRIPT;
use crate::graph::{Context, GraphError, ProjectId};
use crate::lua::{loaders, project, runtime};
use crate::settings::Settings;

/// Errors that can occur during script evaluation.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
  #[error("lua error: {0}")]
  Lua(#[from] LuaError),

  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error("no {} found in {}", BUILD_SCRIPT, .0.display())]
  NoBuildScript(PathBuf),

  #[error("build context is still referenced after evaluation")]
  ContextInUse,
}

/// Evaluate the build scripts rooted at `directory`.
///
/// `options` are the raw `KEY=VALUE` overrides the settings were built from;
/// they are recorded so the cache can tell whether a later invocation asks
/// for a different configuration, as are the hashes of every Lua file that
/// was loaded. `search_path` directories are prepended to Lua's
/// `package.path`.
pub fn evaluate(
  settings: Settings,
  options: Vec<String>,
  directory: &Path,
  search_path: &[PathBuf],
) -> Result<(Context, ProjectId), EvalError> {
  let mut ctx = Context::new(settings);
  ctx.set_options(options);
  ctx.set_search_path(search_path.iter().map(|p| p.to_string_lossy().into_owned()).collect());

  let root = ctx.project(directory)?;
  let script = ctx.project_ref(root)?.file(BUILD_SCRIPT);
  if !script.is_file() {
    return Err(EvalError::NoBuildScript(ctx.project_ref(root)?.directory().to_path_buf()));
  }

  let ctx = Rc::new(RefCell::new(ctx));

  // The runtime holds clones of the context; drop it before unwrapping.
  {
    let lua = runtime::create_runtime(ctx.clone(), search_path)?;
    project::run_build_script(&lua, &ctx, root)?;
    let mut ctx = ctx.borrow_mut();
    for (path, digest) in loaders::loaded_files(&lua)? {
      ctx.record_script(&path, digest);
    }
  }

  let ctx = Rc::try_unwrap(ctx).map_err(|_| EvalError::ContextInUse)?.into_inner();
  info!(
    projects = ctx.projects().count(),
    targets = ctx.targets().count(),
    scripts = ctx.scripts().len(),
    "evaluated build scripts"
  );
  debug!(root = %ctx.project_ref(root)?.directory().display(), "root project");
  Ok((ctx, root))
}
