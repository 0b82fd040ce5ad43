//! The task userdata returned by `project:task(...)`.

use std::collections::BTreeMap;

use mlua::prelude::*;

use super::SharedContext;
use super::convert::{to_lua, to_property};
use super::project::{LuaProject, extension_from_lua, extension_to_lua};
use crate::graph::TargetId;
use crate::property::PropertyValue;

#[derive(Clone)]
pub struct LuaTask {
  pub(crate) ctx: SharedContext,
  pub(crate) id: TargetId,
}

impl LuaTask {
  pub fn new(ctx: SharedContext, id: TargetId) -> Self {
    Self { ctx, id }
  }
}

fn optional_to_lua(lua: &Lua, value: Option<PropertyValue>) -> LuaResult<LuaValue> {
  match value {
    Some(value) => to_lua(lua, &value),
    None => Ok(LuaValue::Nil),
  }
}

impl LuaUserData for LuaTask {
  fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
    fields.add_field_method_get("name", |_, this| {
      let ctx = this.ctx.borrow();
      Ok(ctx.target_ref(this.id).map_err(LuaError::external)?.name().to_string())
    });
    fields.add_field_method_get("path", |_, this| {
      this.ctx.borrow().target_path(this.id).map_err(LuaError::external)
    });
    fields.add_field_method_get("kind", |_, this| {
      let ctx = this.ctx.borrow();
      Ok(ctx.target_ref(this.id).map_err(LuaError::external)?.kind().map(str::to_string))
    });
    fields.add_field_method_get("project", |_, this| {
      let project = this.ctx.borrow().target_ref(this.id).map_err(LuaError::external)?.project();
      Ok(LuaProject::new(this.ctx.clone(), project))
    });
  }

  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    methods.add_method("set", |_, this, (key, value): (String, LuaValue)| {
      let value = to_property(value)?;
      this
        .ctx
        .borrow_mut()
        .set_prop(this.id, &key, value)
        .map_err(LuaError::external)
    });

    methods.add_method("export", |_, this, (key, value): (String, LuaValue)| {
      let value = to_property(value)?;
      this
        .ctx
        .borrow_mut()
        .export_prop(this.id, &key, value)
        .map_err(LuaError::external)
    });

    methods.add_method("get", |lua, this, key: String| {
      let value = this.ctx.borrow().get_prop(this.id, &key).map_err(LuaError::external)?;
      optional_to_lua(lua, value)
    });

    methods.add_method("join", |lua, this, key: String| {
      let values = this
        .ctx
        .borrow()
        .get_prop_join(this.id, &key)
        .map_err(LuaError::external)?;
      to_lua(lua, &PropertyValue::List(values))
    });

    methods.add_method(
      "depends",
      |_, this, (dependency, props): (LuaUserDataRef<LuaTask>, Option<LuaTable>)| {
        let mut edge = BTreeMap::new();
        if let Some(props) = props {
          for pair in props.pairs::<String, LuaValue>() {
            let (key, value) = pair?;
            edge.insert(key, to_property(value)?);
          }
        }
        this
          .ctx
          .borrow_mut()
          .add_dependency(this.id, dependency.id, edge)
          .map_err(LuaError::external)
      },
    );

    methods.add_method("extension", |lua, this, key: String| {
      let extension = this
        .ctx
        .borrow()
        .target_extension(this.id, &key)
        .cloned()
        .map_err(LuaError::external)?;
      extension_to_lua(lua, &this.ctx, extension)
    });

    methods.add_method("add_extension", |_, this, (key, value): (String, LuaValue)| {
      let extension = extension_from_lua(value)?;
      this
        .ctx
        .borrow_mut()
        .add_target_extension(this.id, &key, extension)
        .map_err(LuaError::external)
    });

    methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| {
      let path = this
        .ctx
        .borrow()
        .target_path(this.id)
        .unwrap_or_else(|e| e.to_string());
      Ok(format!("Task({})", path))
    });
  }
}
