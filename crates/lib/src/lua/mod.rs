//! Lua build scripts.
//!
//! Each project directory may contain a `build.loom.lua` script. It runs with
//! a `project` binding for the project it configures and the `loom` global
//! table. Scripts only populate the entity graph; translation and export
//! happen after every script has finished.
//!
//! # Submodules
//!
//! - [`convert`] - Lua values to property values and back
//! - [`globals`] - the `loom` table
//! - [`loaders`] - script loading with `__file`/`__dir` bindings
//! - [`project`] / [`task`] - userdata wrapping graph handles
//! - [`runtime`] - Lua VM setup

use std::cell::RefCell;
use std::rc::Rc;

use crate::graph::Context;

pub mod convert;
pub mod globals;
pub mod loaders;
pub mod project;
pub mod runtime;
pub mod task;

/// The context shared between Rust and every script of one evaluation.
pub type SharedContext = Rc<RefCell<Context>>;

#[cfg(test)]
mod tests {
  use mlua::prelude::*;
  use tempfile::TempDir;

  use super::*;
  use crate::graph::ProjectId;
  use crate::settings::Settings;

  fn runtime_with_project(temp: &TempDir) -> LuaResult<(Lua, SharedContext, ProjectId)> {
    let ctx: SharedContext = Rc::new(RefCell::new(Context::new(Settings::default())));
    let root = ctx.borrow_mut().project(temp.path()).map_err(LuaError::external)?;
    let lua = runtime::create_runtime(ctx.clone(), &[])?;
    lua
      .globals()
      .set("project", project::LuaProject::new(ctx.clone(), root))?;
    Ok((lua, ctx, root))
  }

  #[test]
  fn task_fields_and_properties() -> LuaResult<()> {
    let temp = TempDir::new().unwrap();
    let (lua, _ctx, _) = runtime_with_project(&temp)?;

    lua
      .load(
        r#"
          project.name = "app"
          local gen = project:task("gen", "command")
          assert(gen.name == "gen")
          assert(gen.path == "app:gen")
          assert(gen.kind == "command")
          assert(gen.project.name == "app")
          assert(tostring(gen) == "Task(app:gen)")
          assert(tostring(project) == "Project(app)")

          gen:set("command.inputs", { "a.txt", "b.txt" })
          assert(#gen:get("command.inputs") == 2)
          assert(gen:get("command.foreach") == false)
          assert(gen:get("command.pool") == nil)
        "#,
      )
      .exec()
  }

  #[test]
  fn join_and_edge_properties() -> LuaResult<()> {
    let temp = TempDir::new().unwrap();
    let (lua, ctx, _) = runtime_with_project(&temp)?;

    lua
      .load(
        r#"
          local headers = project:task("headers", "command")
          headers:export("command.implicit_deps", { "config.h" })
          local objs = project:task("objs", "command")
          objs:set("command.implicit_deps", { "local.h" })
          objs:depends(headers, { ["command.consume"] = false })

          local joined = objs:join("command.implicit_deps")
          assert(joined[1] == "config.h" and joined[2] == "local.h")
          assert(#project:tasks() == 2)
        "#,
      )
      .exec()?;

    let ctx = ctx.borrow();
    let objs = ctx.find_target("objs").map_err(LuaError::external)?;
    let consume = ctx.dep_prop(objs, 0, "command.consume").map_err(LuaError::external)?;
    assert_eq!(consume, Some(false.into()));
    Ok(())
  }

  #[test]
  fn schema_errors_reach_the_script() -> LuaResult<()> {
    let temp = TempDir::new().unwrap();
    let (lua, _ctx, _) = runtime_with_project(&temp)?;

    let err = lua
      .load(r#"project:task("gen", "command"):set("command.foreach", "yes")"#)
      .exec()
      .unwrap_err();
    assert!(err.to_string().contains("command.foreach"), "{}", err);

    let err = lua.load(r#"project:task("x", "rust")"#).exec().unwrap_err();
    assert!(err.to_string().contains("unknown target kind"), "{}", err);
    Ok(())
  }

  #[test]
  fn apply_records_plugin_extension() -> LuaResult<()> {
    let temp = TempDir::new().unwrap();
    let (lua, _ctx, _) = runtime_with_project(&temp)?;

    let marker: String = lua
      .load(
        r#"
          project:apply("command")
          return project.command
        "#,
      )
      .eval()?;
    assert_eq!(marker, "command");
    Ok(())
  }

  #[test]
  fn glob_lists_project_files() -> LuaResult<()> {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("src")).unwrap();
    std::fs::write(temp.path().join("src").join("main.c"), "").unwrap();
    std::fs::write(temp.path().join("src").join("util.c"), "").unwrap();
    let (lua, _ctx, _) = runtime_with_project(&temp)?;

    lua
      .load(
        r#"
          local sources = project:glob("src/*.c")
          assert(#sources == 2)
          assert(sources[1] == project:file("src/main.c"), sources[1])
          assert(sources[2] == project:file("src/util.c"), sources[2])
          assert(#project:glob("include/*.h") == 0)
        "#,
      )
      .exec()
  }
}
