//! The `project` userdata handed to every build script.

use std::path::PathBuf;

use mlua::prelude::*;
use tracing::debug;

use super::SharedContext;
use super::convert::{to_lua, to_property};
use super::loaders::load_file_with_env;
use super::task::LuaTask;
use crate::consts::BUILD_SCRIPT;
use crate::graph::{Extension, GraphError, ProjectId};

/// Script-side handle to a project.
#[derive(Clone)]
pub struct LuaProject {
  pub(crate) ctx: SharedContext,
  pub(crate) id: ProjectId,
}

impl LuaProject {
  pub fn new(ctx: SharedContext, id: ProjectId) -> Self {
    Self { ctx, id }
  }

  fn extension_value(&self, lua: &Lua, key: &str) -> LuaResult<LuaValue> {
    let extension = self
      .ctx
      .borrow()
      .project_extension(self.id, key)
      .cloned()
      .map_err(LuaError::external)?;
    extension_to_lua(lua, &self.ctx, extension)
  }
}

pub(crate) fn extension_to_lua(lua: &Lua, ctx: &SharedContext, extension: Extension) -> LuaResult<LuaValue> {
  match extension {
    Extension::Value(value) => to_lua(lua, &value),
    Extension::Project(id) => LuaProject::new(ctx.clone(), id).into_lua(lua),
    Extension::Target(id) => LuaTask::new(ctx.clone(), id).into_lua(lua),
    Extension::Plugin(name) => name.into_lua(lua),
  }
}

pub(crate) fn extension_from_lua(value: LuaValue) -> LuaResult<Extension> {
  if let LuaValue::UserData(ud) = &value {
    if let Ok(project) = ud.borrow::<LuaProject>() {
      return Ok(Extension::Project(project.id));
    }
    if let Ok(task) = ud.borrow::<LuaTask>() {
      return Ok(Extension::Target(task.id));
    }
  }
  Ok(Extension::Value(to_property(value)?))
}

/// Run the build script of `project`, if its directory has one.
///
/// The context must not be borrowed by the caller: scripts call back into it.
pub fn run_build_script(lua: &Lua, ctx: &SharedContext, project: ProjectId) -> LuaResult<bool> {
  let script = {
    let ctx = ctx.borrow();
    ctx.project_ref(project).map_err(LuaError::external)?.file(BUILD_SCRIPT)
  };
  if !script.is_file() {
    debug!(script = %script.display(), "no build script");
    return Ok(false);
  }

  debug!(script = %script.display(), "running build script");
  let handle = LuaProject::new(ctx.clone(), project).into_lua(lua)?;
  load_file_with_env(lua, &script, &[("project", handle)])?;
  Ok(true)
}

impl LuaUserData for LuaProject {
  fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
    fields.add_field_method_get("name", |_, this| {
      this.ctx.borrow().project_name(this.id).map_err(LuaError::external)
    });
    fields.add_field_method_set("name", |_, this, name: String| {
      this
        .ctx
        .borrow_mut()
        .set_project_name(this.id, &name)
        .map_err(LuaError::external)
    });
    fields.add_field_method_get("path", |_, this| {
      this.ctx.borrow().project_path(this.id).map_err(LuaError::external)
    });
    fields.add_field_method_get("directory", |_, this| {
      let ctx = this.ctx.borrow();
      let project = ctx.project_ref(this.id).map_err(LuaError::external)?;
      Ok(project.directory().to_string_lossy().into_owned())
    });
    fields.add_field_method_get("build_directory", |_, this| {
      let dir = this.ctx.borrow().build_directory(this.id).map_err(LuaError::external)?;
      Ok(dir.to_string_lossy().into_owned())
    });
    fields.add_field_method_set("build_directory", |_, this, dir: String| {
      this
        .ctx
        .borrow_mut()
        .set_build_directory(this.id, PathBuf::from(dir))
        .map_err(LuaError::external)
    });
    fields.add_field_method_get("parent", |_, this| {
      let parent = this.ctx.borrow().parent(this.id).map_err(LuaError::external)?;
      Ok(parent.map(|id| LuaProject::new(this.ctx.clone(), id)))
    });
  }

  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    methods.add_method("task", |_, this, (name, kind): (String, Option<String>)| {
      let id = this
        .ctx
        .borrow_mut()
        .task(this.id, &name, kind.as_deref())
        .map_err(LuaError::external)?;
      Ok(LuaTask::new(this.ctx.clone(), id))
    });

    methods.add_method("subproject", |lua, this, relative: String| {
      let (id, created) = this
        .ctx
        .borrow_mut()
        .subproject_entry(this.id, &relative)
        .map_err(LuaError::external)?;
      if created {
        run_build_script(lua, &this.ctx, id)?;
      }
      Ok(LuaProject::new(this.ctx.clone(), id))
    });

    methods.add_method("get_subproject", |_, this, name: String| {
      let id = this
        .ctx
        .borrow()
        .get_subproject_by_name(this.id, &name)
        .map_err(LuaError::external)?;
      Ok(LuaProject::new(this.ctx.clone(), id))
    });

    methods.add_method("apply", |_, this, plugin: String| {
      this
        .ctx
        .borrow_mut()
        .apply_plugin(this.id, &plugin)
        .map_err(LuaError::external)
    });

    methods.add_method("file", |_, this, relative: String| {
      let ctx = this.ctx.borrow();
      let project = ctx.project_ref(this.id).map_err(LuaError::external)?;
      Ok(project.file(&relative).to_string_lossy().into_owned())
    });

    methods.add_method("glob", |lua, this, pattern: String| {
      let files = this.ctx.borrow().glob(this.id, &pattern).map_err(LuaError::external)?;
      lua.create_sequence_from(files.into_iter().map(|f| f.to_string_lossy().into_owned()))
    });

    methods.add_method("tasks", |lua, this, ()| {
      let ids = this.ctx.borrow().tasks(this.id).map_err(LuaError::external)?;
      lua.create_sequence_from(ids.into_iter().map(|id| LuaTask::new(this.ctx.clone(), id)))
    });

    methods.add_method("extension", |lua, this, key: String| this.extension_value(lua, &key));

    methods.add_method("add_extension", |_, this, (key, value): (String, LuaValue)| {
      let extension = extension_from_lua(value)?;
      this
        .ctx
        .borrow_mut()
        .add_project_extension(this.id, &key, extension)
        .map_err(LuaError::external)
    });

    // Unknown fields fall back to extensions, failing loudly when absent.
    methods.add_meta_method(LuaMetaMethod::Index, |lua, this, key: String| {
      this.extension_value(lua, &key)
    });

    methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| {
      let path = this
        .ctx
        .borrow()
        .project_path(this.id)
        .unwrap_or_else(|e: GraphError| e.to_string());
      Ok(format!("Project({})", path))
    });
  }
}
