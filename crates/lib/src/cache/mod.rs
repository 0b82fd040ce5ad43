//! Configuration cache embedded in the exported build file.
//!
//! The first lines of a build file written by loom are comments that record
//! what produced it:
//!
//! ```text
//! # loom-options: ["loom.platform=linux"]
//! # loom-path: ["lib"]
//! # loom-targets: {"app:build":{"rts":"Plain","explicit":false}}
//! # loom-scripts: {"/src/app/build.loom.lua":"9f86d0..."}
//! ```
//!
//! A later invocation reads these lines back, without running any build
//! script, to decide whether it can hand the request straight to ninja.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::graph::{Context, GraphError, TargetId};
use crate::util::hash::fingerprint;

const OPTIONS_MARKER: &str = "# loom-options: ";
const PATH_MARKER: &str = "# loom-path: ";
const TARGETS_MARKER: &str = "# loom-targets: ";
const SCRIPTS_MARKER: &str = "# loom-scripts: ";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
  #[error("failed to read {path}: {source}")]
  Read { path: PathBuf, source: io::Error },

  #[error("invalid cache line {marker:?}: {source}")]
  Json {
    marker: &'static str,
    source: serde_json::Error,
  },

  #[error("cache header is incomplete: missing {0:?}")]
  Missing(&'static str),
}

/// What running a target requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RtsMode {
  /// Nothing to run.
  #[default]
  None,
  /// Only commands of the exported build file.
  Plain,
  /// Targets disagree; the scripts must run again.
  Mixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCacheEntry {
  #[serde(alias = "rts-mode")]
  pub rts: RtsMode,
  pub explicit: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSummary {
  pub options: Vec<String>,
  pub path: Vec<String>,
  pub targets: BTreeMap<String, TargetCacheEntry>,
  pub scripts: BTreeMap<String, String>,
}

impl CacheSummary {
  /// Summarize a translated context.
  ///
  /// A target is `Plain` when building it runs any action, its own or one of
  /// a transitive dependency.
  pub fn from_context(ctx: &Context) -> Result<Self, GraphError> {
    let mut targets = BTreeMap::new();
    for target in ctx.targets() {
      let mut explicit = !target.actions().is_empty();
      for &action in target.actions() {
        explicit &= ctx.action_ref(action)?.explicit();
      }
      let rts = if runs_actions(ctx, target.id())? {
        RtsMode::Plain
      } else {
        RtsMode::None
      };
      targets.insert(ctx.target_path(target.id())?, TargetCacheEntry { rts, explicit });
    }

    Ok(Self {
      options: ctx.options().to_vec(),
      path: ctx.search_path().to_vec(),
      targets,
      scripts: ctx.scripts().clone(),
    })
  }

  /// Render the summary as comment lines, each ending in a newline.
  pub fn render(&self) -> Result<String, CacheError> {
    let mut out = String::new();
    push_line(&mut out, OPTIONS_MARKER, &self.options)?;
    push_line(&mut out, PATH_MARKER, &self.path)?;
    push_line(&mut out, TARGETS_MARKER, &self.targets)?;
    push_line(&mut out, SCRIPTS_MARKER, &self.scripts)?;
    Ok(out)
  }

  /// Read a summary from the leading comment block of `text`.
  ///
  /// Returns `Ok(None)` when the text carries no cache header at all.
  pub fn parse(text: &str) -> Result<Option<Self>, CacheError> {
    let mut options = None;
    let mut path = None;
    let mut targets = None;
    let mut scripts = None;

    for line in text.lines() {
      if !line.starts_with('#') {
        break;
      }
      if let Some(json) = line.strip_prefix(OPTIONS_MARKER) {
        options = Some(parse_json(OPTIONS_MARKER, json)?);
      } else if let Some(json) = line.strip_prefix(PATH_MARKER) {
        path = Some(parse_json(PATH_MARKER, json)?);
      } else if let Some(json) = line.strip_prefix(TARGETS_MARKER) {
        targets = Some(parse_json(TARGETS_MARKER, json)?);
      } else if let Some(json) = line.strip_prefix(SCRIPTS_MARKER) {
        scripts = Some(parse_json(SCRIPTS_MARKER, json)?);
      }
    }

    if options.is_none() && path.is_none() && targets.is_none() {
      return Ok(None);
    }
    Ok(Some(Self {
      options: options.ok_or(CacheError::Missing(OPTIONS_MARKER.trim()))?,
      path: path.ok_or(CacheError::Missing(PATH_MARKER.trim()))?,
      targets: targets.ok_or(CacheError::Missing(TARGETS_MARKER.trim()))?,
      scripts: scripts.unwrap_or_default(),
    }))
  }

  /// Read the summary of an existing build file. A missing file is `Ok(None)`.
  pub fn load(path: &Path) -> Result<Option<Self>, CacheError> {
    match fs::read_to_string(path) {
      Ok(text) => Self::parse(&text),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no build file, no cache");
        Ok(None)
      }
      Err(source) => Err(CacheError::Read {
        path: path.to_path_buf(),
        source,
      }),
    }
  }

  /// Aggregate the run mode of the requested targets.
  ///
  /// With no names, every non-explicit target counts. A name is either a
  /// qualified target name or a task of the root project.
  pub fn get_rts_mode<S: AsRef<str>>(&self, names: &[S]) -> RtsMode {
    let matching: Vec<&TargetCacheEntry> = if names.is_empty() {
      self.targets.values().filter(|entry| !entry.explicit).collect()
    } else {
      self
        .targets
        .iter()
        .filter(|(key, _)| names.iter().any(|name| name_matches(key, name.as_ref())))
        .map(|(_, entry)| entry)
        .collect()
    };

    let mut mode: Option<RtsMode> = None;
    for entry in matching {
      mode = match mode {
        None => Some(entry.rts),
        Some(current) if current == entry.rts => Some(current),
        Some(_) => Some(RtsMode::Mixed),
      };
    }
    mode.unwrap_or(RtsMode::None)
  }

  /// The cached target a command-line name refers to, if any.
  pub fn resolve_target(&self, name: &str) -> Option<&str> {
    self
      .targets
      .keys()
      .find(|key| name_matches(key, name))
      .map(String::as_str)
  }

  /// Whether this summary still describes a configuration with the given
  /// options and search path, and no recorded input file changed on disk.
  pub fn is_fresh<S: AsRef<str>>(&self, options: &[S], path: &[S]) -> bool {
    let same = |cached: &[String], given: &[S]| {
      cached.len() == given.len() && cached.iter().zip(given).all(|(a, b)| a == b.as_ref())
    };
    if !same(&self.options, options) || !same(&self.path, path) {
      debug!("options or search path changed");
      return false;
    }

    for (script, digest) in &self.scripts {
      match fingerprint(Path::new(script)) {
        Ok(current) if &current == digest => {}
        Ok(_) => {
          debug!(script = %script, "input file changed");
          return false;
        }
        Err(e) => {
          debug!(script = %script, error = %e, "input file unreadable");
          return false;
        }
      }
    }
    true
  }
}

fn runs_actions(ctx: &Context, target: TargetId) -> Result<bool, GraphError> {
  let mut seen = HashSet::new();
  let mut pending = vec![target];
  while let Some(id) = pending.pop() {
    if !seen.insert(id) {
      continue;
    }
    if !ctx.target_ref(id)?.actions().is_empty() {
      return Ok(true);
    }
    pending.extend(ctx.dependencies(id)?);
  }
  Ok(false)
}

fn name_matches(key: &str, name: &str) -> bool {
  if key == name {
    return true;
  }
  // A bare task name refers to the root project, whose keys have one colon.
  !name.contains(':') && matches!(key.split_once(':'), Some((root, task)) if !root.is_empty() && task == name)
}

fn push_line<T: Serialize>(out: &mut String, marker: &'static str, value: &T) -> Result<(), CacheError> {
  let json = serde_json::to_string(value).map_err(|source| CacheError::Json { marker, source })?;
  out.push_str(marker);
  out.push_str(&json);
  out.push('\n');
  Ok(())
}

fn parse_json<T: DeserializeOwned>(marker: &'static str, json: &str) -> Result<T, CacheError> {
  serde_json::from_str(json).map_err(|source| CacheError::Json { marker, source })
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn entry(rts: RtsMode, explicit: bool) -> TargetCacheEntry {
    TargetCacheEntry { rts, explicit }
  }

  fn summary(targets: &[(&str, RtsMode, bool)]) -> CacheSummary {
    CacheSummary {
      targets: targets
        .iter()
        .map(|(name, rts, explicit)| (name.to_string(), entry(*rts, *explicit)))
        .collect(),
      ..Default::default()
    }
  }

  mod rts_mode {
    use super::*;

    #[test]
    fn agreeing_targets_share_mode() {
      let cache = summary(&[("p:t1", RtsMode::Plain, false), ("p:t2", RtsMode::Plain, false)]);
      assert_eq!(cache.get_rts_mode::<&str>(&[]), RtsMode::Plain);
    }

    #[test]
    fn disagreement_is_mixed() {
      let cache = summary(&[
        ("p:t1", RtsMode::Plain, false),
        ("p:t2", RtsMode::Plain, false),
        ("p:t3", RtsMode::None, false),
      ]);
      assert_eq!(cache.get_rts_mode::<&str>(&[]), RtsMode::Mixed);
      assert_eq!(cache.get_rts_mode(&["t3"]), RtsMode::None);
      assert_eq!(cache.get_rts_mode(&["p:t1", "p:t2"]), RtsMode::Plain);
    }

    #[test]
    fn explicit_targets_only_count_when_named() {
      let cache = summary(&[("p:t1", RtsMode::None, false), ("p:docs", RtsMode::Plain, true)]);
      assert_eq!(cache.get_rts_mode::<&str>(&[]), RtsMode::None);
      assert_eq!(cache.get_rts_mode(&["docs"]), RtsMode::Plain);
    }

    #[test]
    fn unknown_names_need_nothing() {
      let cache = summary(&[("p:t1", RtsMode::Plain, false)]);
      assert_eq!(cache.get_rts_mode(&["missing"]), RtsMode::None);
      assert_eq!(CacheSummary::default().get_rts_mode::<&str>(&[]), RtsMode::None);
    }

    #[test]
    fn bare_names_only_match_root_tasks() {
      let cache = summary(&[("p:sub:t1", RtsMode::Plain, false)]);
      assert_eq!(cache.get_rts_mode(&["t1"]), RtsMode::None);
      assert_eq!(cache.get_rts_mode(&["sub:t1"]), RtsMode::None);
      assert_eq!(cache.get_rts_mode(&["p:sub:t1"]), RtsMode::Plain);
    }

    #[test]
    fn resolve_qualifies_root_tasks() {
      let cache = summary(&[("p:t1", RtsMode::Plain, false), ("p:sub:t2", RtsMode::None, false)]);
      assert_eq!(cache.resolve_target("t1"), Some("p:t1"));
      assert_eq!(cache.resolve_target("p:sub:t2"), Some("p:sub:t2"));
      assert_eq!(cache.resolve_target("t2"), None);
    }
  }

  mod from_context {
    use super::*;
    use crate::action::ActionOptions;
    use crate::settings::Settings;
    use crate::translate::TranslateState;

    #[test]
    fn dependencies_with_actions_make_a_target_plain() {
      let temp = TempDir::new().unwrap();
      let mut ctx = Context::new(Settings::default());
      let root = ctx.project(temp.path()).unwrap();
      ctx.set_project_name(root, "app").unwrap();
      let generator = ctx.task(root, "gen", None).unwrap();
      let group = ctx.task(root, "group", None).unwrap();
      let outer = ctx.task(root, "outer", None).unwrap();
      ctx.task(root, "idle", None).unwrap();
      ctx.add_dependency(group, generator, BTreeMap::new()).unwrap();
      ctx.add_dependency(outer, group, BTreeMap::new()).unwrap();
      ctx.target_mut(generator).unwrap().state = TranslateState::Translating;
      ctx
        .add_action(generator, "run", vec![vec!["gen".into()]], ActionOptions::default())
        .unwrap();

      let cache = CacheSummary::from_context(&ctx).unwrap();
      assert_eq!(cache.targets["app:gen"], entry(RtsMode::Plain, false));
      assert_eq!(cache.targets["app:group"], entry(RtsMode::Plain, false));
      assert_eq!(cache.targets["app:outer"], entry(RtsMode::Plain, false));
      assert_eq!(cache.targets["app:idle"], entry(RtsMode::None, false));
      assert_eq!(cache.get_rts_mode(&["group"]), RtsMode::Plain);
    }
  }

  mod header {
    use super::*;

    #[test]
    fn round_trip_through_build_file() {
      let temp = TempDir::new().unwrap();
      let cache = CacheSummary {
        options: vec!["-Ox=1".to_string()],
        path: vec!["lib".to_string()],
        targets: [("app:build".to_string(), entry(RtsMode::Plain, false))].into(),
        scripts: BTreeMap::new(),
      };

      let file = temp.path().join("build.ninja");
      let text = format!("{}\nninja_required_version = 1.5\n", cache.render().unwrap());
      fs::write(&file, text).unwrap();

      assert_eq!(CacheSummary::load(&file).unwrap(), Some(cache));
    }

    #[test]
    fn reads_documented_field_names() {
      let text = concat!(
        "# loom-options: [\"-Ox=1\"]\n",
        "# loom-path: [\"lib\"]\n",
        "# loom-targets: {\"app:build\": {\"rts\": \"Plain\", \"explicit\": false}}\n",
      );
      let cache = CacheSummary::parse(text).unwrap().unwrap();
      assert_eq!(cache.targets["app:build"], entry(RtsMode::Plain, false));
      assert!(cache.scripts.is_empty());
    }

    #[test]
    fn header_stops_at_first_statement() {
      let text = "# generated\nbuilddir = out\n# loom-options: []\n";
      assert_eq!(CacheSummary::parse(text).unwrap(), None);
    }

    #[test]
    fn partial_header_is_an_error() {
      let text = "# loom-options: []\n# loom-path: []\n";
      assert!(matches!(CacheSummary::parse(text), Err(CacheError::Missing(_))));
    }

    #[test]
    fn malformed_json_is_an_error() {
      let text = "# loom-options: [\n";
      assert!(matches!(CacheSummary::parse(text), Err(CacheError::Json { .. })));
    }

    #[test]
    fn missing_file_has_no_cache() {
      let temp = TempDir::new().unwrap();
      assert_eq!(CacheSummary::load(&temp.path().join("build.ninja")).unwrap(), None);
    }
  }

  mod freshness {
    use super::*;
    use crate::util::hash::hash_file;

    #[test]
    fn changed_script_is_stale() {
      let temp = TempDir::new().unwrap();
      let script = temp.path().join("build.loom.lua");
      fs::write(&script, "-- v1").unwrap();

      let mut cache = CacheSummary {
        options: vec!["a=1".to_string()],
        ..Default::default()
      };
      cache
        .scripts
        .insert(script.to_string_lossy().into_owned(), hash_file(&script).unwrap());

      let no_path: [&str; 0] = [];
      assert!(cache.is_fresh(&["a=1"], &no_path));
      assert!(!cache.is_fresh(&["a=2"], &no_path));

      fs::write(&script, "-- v2").unwrap();
      assert!(!cache.is_fresh(&["a=1"], &no_path));
    }

    #[test]
    fn created_file_is_stale() {
      let temp = TempDir::new().unwrap();
      let settings = temp.path().join(".loom-settings.toml");
      let mut cache = CacheSummary::default();
      cache
        .scripts
        .insert(settings.to_string_lossy().into_owned(), String::new());

      let none: [&str; 0] = [];
      assert!(cache.is_fresh(&none, &none));
      fs::write(&settings, "[loom]\nbuild_directory = \"out\"\n").unwrap();
      assert!(!cache.is_fresh(&none, &none));
    }
  }
}
