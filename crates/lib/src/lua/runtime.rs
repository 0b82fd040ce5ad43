use std::path::PathBuf;

use mlua::prelude::*;

use super::{SharedContext, globals, loaders};

/// Create a Lua runtime for build scripts: the `loom` global, `__dir`-aware
/// loaders, and `search_path` directories on `package.path`.
pub fn create_runtime(ctx: SharedContext, search_path: &[PathBuf]) -> LuaResult<Lua> {
  let lua = Lua::new();
  loaders::install_loaders(&lua)?;
  loaders::prepend_package_path(&lua, search_path)?;
  globals::register_globals(&lua, ctx)?;
  Ok(lua)
}
