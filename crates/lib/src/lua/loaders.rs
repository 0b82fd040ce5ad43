//! Build script loading with per-file `__dir`, `__file` and `project`
//! bindings.
//!
//! Every build script runs in its own environment table that falls back to
//! `_G`. The environment carries the script's identity (`__file`, `__dir`)
//! and the project it configures. Modules loaded with `require` or `dofile`
//! get `__dir` as well, so relative paths inside helper modules resolve
//! against the module's own directory.
//!
//! Every file loaded this way is hashed, so the configuration cache can tell
//! when a helper module changes, not only the build scripts.

use std::fs;
use std::path::{Path, PathBuf};

use mlua::prelude::*;

use crate::util::hash::hash_bytes;

/// Registry key holding the `__dir` of the file currently being loaded.
const CURRENT_DIR_KEY: &str = "__loom_current_dir";
/// Registry key of the table mapping loaded file paths to their SHA-256.
const LOADED_FILES_KEY: &str = "__loom_loaded_files";

/// Load and run `path` with `__dir`, `__file` and any `extra` bindings in
/// its environment.
pub fn load_file_with_env(lua: &Lua, path: &Path, extra: &[(&str, LuaValue)]) -> LuaResult<LuaValue> {
  let canonical_path = dunce::canonicalize(path)
    .map_err(|e| LuaError::external(format!("cannot resolve '{}': {}", path.display(), e)))?;

  let content = fs::read_to_string(&canonical_path)
    .map_err(|e| LuaError::external(format!("cannot read '{}': {}", canonical_path.display(), e)))?;
  record_loaded_file(lua, &canonical_path, &content)?;

  let dir = canonical_path
    .parent()
    .unwrap_or(Path::new("."))
    .to_string_lossy()
    .into_owned();

  let prev_dir: Option<String> = lua.named_registry_value(CURRENT_DIR_KEY)?;
  lua.set_named_registry_value(CURRENT_DIR_KEY, dir.clone())?;

  let env = lua.create_table()?;
  env.set("__dir", dir)?;
  env.set("__file", canonical_path.to_string_lossy().into_owned())?;
  for (key, value) in extra {
    env.set(*key, value.clone())?;
  }

  let mt = lua.create_table()?;
  mt.set("__index", lua.globals())?;
  mt.set("__newindex", lua.globals())?;
  env.set_metatable(Some(mt))?;

  let result = lua
    .load(&content)
    .set_name(format!("@{}", canonical_path.display()))
    .set_environment(env)
    .eval::<LuaValue>();

  // Restore even on error; a failure here must not mask the script's error.
  let _ = lua.set_named_registry_value(CURRENT_DIR_KEY, prev_dir);

  result
}

pub fn load_file_with_dir(lua: &Lua, path: &Path) -> LuaResult<LuaValue> {
  load_file_with_env(lua, path, &[])
}

fn record_loaded_file(lua: &Lua, path: &Path, content: &str) -> LuaResult<()> {
  let files = match lua.named_registry_value::<Option<LuaTable>>(LOADED_FILES_KEY)? {
    Some(files) => files,
    None => {
      let files = lua.create_table()?;
      lua.set_named_registry_value(LOADED_FILES_KEY, files.clone())?;
      files
    }
  };
  files.set(path.to_string_lossy().into_owned(), hash_bytes(content.as_bytes()))
}

/// Every file loaded so far with its SHA-256, sorted by path.
pub fn loaded_files(lua: &Lua) -> LuaResult<Vec<(PathBuf, String)>> {
  let Some(files) = lua.named_registry_value::<Option<LuaTable>>(LOADED_FILES_KEY)? else {
    return Ok(Vec::new());
  };
  let mut loaded = Vec::new();
  for pair in files.pairs::<String, String>() {
    let (path, digest) = pair?;
    loaded.push((PathBuf::from(path), digest));
  }
  loaded.sort();
  Ok(loaded)
}

/// Resolve `path_str` against the `__dir` of the running file, if any.
fn resolve_path(lua: &Lua, path_str: &str) -> LuaResult<PathBuf> {
  let path = Path::new(path_str);
  if path.is_absolute() {
    return Ok(path.to_path_buf());
  }

  let current_dir: Option<String> = lua.named_registry_value(CURRENT_DIR_KEY)?;
  if let Some(current_dir) = current_dir {
    let resolved = Path::new(&current_dir).join(path);
    if resolved.exists() {
      return Ok(resolved);
    }
  }
  Ok(path.to_path_buf())
}

/// `package.searchers[2]` replacement: finds modules with
/// `package.searchpath` and loads them through [`load_file_with_dir`].
fn create_lua_searcher(lua: &Lua) -> LuaResult<LuaFunction> {
  lua.create_function(|lua, modname: String| {
    let package: LuaTable = lua.globals().get("package")?;
    let path: String = package.get("path")?;
    let searchpath: LuaFunction = package.get("searchpath")?;
    let result: LuaMultiValue = searchpath.call((modname.clone(), path))?;

    match result.into_iter().next() {
      Some(LuaValue::String(filepath)) => {
        let filepath = filepath.to_str()?.to_string();
        let module_path = filepath.clone();
        let loader = lua.create_function(move |lua, _: LuaMultiValue| load_file_with_dir(lua, Path::new(&module_path)))?;
        Ok((LuaValue::Function(loader), filepath))
      }
      _ => Ok((LuaValue::Nil, format!("\n\tno file for module '{}'", modname))),
    }
  })
}

fn create_dofile(lua: &Lua) -> LuaResult<LuaFunction> {
  lua.create_function(|lua, path: Option<String>| match path {
    Some(path_str) => {
      let resolved = resolve_path(lua, &path_str)?;
      load_file_with_dir(lua, &resolved)
    }
    None => Err(LuaError::external("dofile() without path not supported")),
  })
}

/// Route `require` and `dofile` through the `__dir`-injecting loader.
pub fn install_loaders(lua: &Lua) -> LuaResult<()> {
  let package: LuaTable = lua.globals().get("package")?;
  let searchers: LuaTable = package.get("searchers")?;
  searchers.set(2, create_lua_searcher(lua)?)?;
  lua.globals().set("dofile", create_dofile(lua)?)?;
  Ok(())
}

/// Prepend `dirs` (as `dir/?.lua` and `dir/?/init.lua`) to `package.path`.
pub fn prepend_package_path(lua: &Lua, dirs: &[PathBuf]) -> LuaResult<()> {
  if dirs.is_empty() {
    return Ok(());
  }
  let mut entries = Vec::new();
  for dir in dirs {
    let dir = dir.to_string_lossy().replace('\\', "/");
    entries.push(format!("{}/?.lua", dir));
    entries.push(format!("{}/?/init.lua", dir));
  }

  let package: LuaTable = lua.globals().get("package")?;
  let current: String = package.get("path")?;
  package.set("path", format!("{};{}", entries.join(";"), current))?;
  Ok(())
}
