//! The `loom` global table.
//!
//! - `loom.option(key, default)` - read a setting, `default` when unset
//! - `loom.option_bool(key, default)` - read a boolean setting
//! - `loom.option_list(key)` - read a comma-separated setting as a list
//! - `loom.os` - target OS of the exported commands (`linux`, `darwin`, `windows`)
//! - `loom.platform` - host platform triple (e.g. `x86_64-linux`)
//! - `loom.arch` - host CPU architecture
//! - `loom.pointer_width` - 32 or 64
//! - `loom.version` - version of loom itself

use mlua::prelude::*;

use super::SharedContext;
use crate::platform::{Platform, target_os};

pub fn register_globals(lua: &Lua, ctx: SharedContext) -> LuaResult<()> {
  let loom = lua.create_table()?;

  let os = target_os(ctx.borrow().settings()).map_err(LuaError::external)?;
  let platform = Platform::current().ok_or_else(|| LuaError::external("unsupported host platform"))?;
  loom.set("os", os.as_str())?;
  loom.set("platform", platform.triple())?;
  loom.set("arch", platform.arch.as_str())?;
  loom.set("pointer_width", platform.arch.pointer_width())?;
  loom.set("version", env!("CARGO_PKG_VERSION"))?;

  let options = ctx.clone();
  loom.set(
    "option",
    lua.create_function(move |_, (key, default): (String, Option<String>)| {
      Ok(options.borrow().settings().get(&key).map(str::to_string).or(default))
    })?,
  )?;

  let options = ctx.clone();
  loom.set(
    "option_bool",
    lua.create_function(move |_, (key, default): (String, Option<bool>)| {
      let settings = options.borrow();
      match settings.settings().get(&key) {
        None => Ok(default.unwrap_or(false)),
        Some(raw) => settings
          .settings()
          .get_bool(&key)
          .ok_or_else(|| LuaError::external(format!("option {} is not a boolean: {:?}", key, raw))),
      }
    })?,
  )?;

  let options = ctx;
  loom.set(
    "option_list",
    lua.create_function(move |_, key: String| Ok(options.borrow().settings().get_list(&key)))?,
  )?;

  lua.globals().set("loom", loom)?;
  Ok(())
}
