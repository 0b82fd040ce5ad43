//! Test helpers for building project trees on disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::consts::BUILD_SCRIPT;

/// Write `content` as the build script of `dir`, creating the directory.
pub fn write_build_script(dir: &Path, content: &str) -> PathBuf {
  fs::create_dir_all(dir).unwrap();
  let path = dir.join(BUILD_SCRIPT);
  fs::write(&path, content).unwrap();
  path
}

/// A one-command argv list as a Lua table literal, e.g. `{ { "touch", "$out" } }`.
pub fn lua_commands(args: &[&str]) -> String {
  let quoted: Vec<String> = args.iter().map(|a| format!("{:?}", a)).collect();
  format!("{{ {{ {} }} }}", quoted.join(", "))
}
