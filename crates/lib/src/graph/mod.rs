//! The entity graph: context, projects, targets.
//!
//! A [`Context`] exclusively owns every project, target and action of one
//! build invocation. Entities refer to each other through copyable handles
//! ([`ProjectId`], [`TargetId`], [`ActionId`]) that index into the context's
//! arenas. A handle that does not resolve is reported as a `Dangling*` error
//! rather than treated as absent.
//!
//! # Lifecycle
//!
//! Projects are created on first reference. A new project is registered
//! before the context runs its [`ProjectInitializer`]s, so an initializer that
//! refers back to the project (directly or through a circular subproject
//! chain) observes the same instance, even though it is not fully configured
//! yet.

mod extension;
mod project;
mod target;

pub use extension::{Extension, Extensions};
pub use project::Project;
pub use target::{Dependency, Target};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::action::Action;
use crate::consts::{DEFAULT_BUILD_DIR, OPT_BUILD_DIRECTORY};
use crate::plugin::{BuiltinLoader, PluginLoader, PluginRegistry, SchemaRegistry, TargetKind};
use crate::property::{PropertyBag, PropertyError, PropertySchema, PropertyValue};
use crate::settings::Settings;
use crate::util::hash::fingerprint;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"));

/// Handle to a [`Project`] owned by a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(pub(crate) usize);

/// Handle to a [`Target`] owned by a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub(crate) usize);

/// Handle to an [`Action`] owned by a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub(crate) usize);

impl fmt::Display for ProjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "project#{}", self.0)
  }
}

impl fmt::Display for TargetId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "target#{}", self.0)
  }
}

impl fmt::Display for ActionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "action#{}", self.0)
  }
}

/// Configuration and lookup errors of the entity graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
  #[error("invalid {what} name: {name:?}")]
  InvalidName { what: &'static str, name: String },

  #[error("task name already used in project {project}: {name:?}")]
  DuplicateTask { project: String, name: String },

  #[error("action name already used in target {target}: {name:?}")]
  DuplicateAction { target: String, name: String },

  #[error("unknown target kind or plugin: {0:?}")]
  UnknownPlugin(String),

  #[error("{owner} has no attribute or extension named {key:?}")]
  NoSuchExtension { owner: String, key: String },

  #[error("project {0} does not exist")]
  NoSuchProject(String),

  #[error("target {0} does not exist")]
  NoSuchTarget(String),

  #[error("lost reference to {0}")]
  DanglingProject(ProjectId),

  #[error("lost reference to {0}")]
  DanglingTarget(TargetId),

  #[error("lost reference to {0}")]
  DanglingAction(ActionId),

  #[error("no root project has been created")]
  NoRootProject,

  #[error(transparent)]
  Property(#[from] PropertyError),

  #[error("invalid glob pattern {pattern:?}: {message}")]
  Glob { pattern: String, message: String },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Hook run once for every newly created project.
pub trait ProjectInitializer {
  fn initialize(&self, ctx: &mut Context, project: ProjectId) -> Result<(), GraphError>;
}

impl<F> ProjectInitializer for F
where
  F: Fn(&mut Context, ProjectId) -> Result<(), GraphError>,
{
  fn initialize(&self, ctx: &mut Context, project: ProjectId) -> Result<(), GraphError> {
    self(ctx, project)
  }
}

/// Check a project or task name against `[A-Za-z0-9_-]+`.
pub fn validate_name(what: &'static str, name: &str) -> Result<(), GraphError> {
  if NAME_RE.is_match(name) {
    Ok(())
  } else {
    Err(GraphError::InvalidName {
      what,
      name: name.to_string(),
    })
  }
}

/// Process-scoped root of one build invocation.
pub struct Context {
  settings: Settings,
  pub(crate) target_schema: PropertySchema,
  pub(crate) dependency_schema: PropertySchema,
  loader: Rc<dyn PluginLoader>,
  plugins: PluginRegistry,
  initializers: Vec<Rc<dyn ProjectInitializer>>,
  pub(crate) projects: Vec<Project>,
  pub(crate) targets: Vec<Target>,
  pub(crate) actions: Vec<Action>,
  project_dirs: HashMap<PathBuf, ProjectId>,
  root: Option<ProjectId>,
  options: Vec<String>,
  search_path: Vec<String>,
  scripts: BTreeMap<String, String>,
}

impl fmt::Debug for Context {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Context")
      .field("projects", &self.projects.len())
      .field("targets", &self.targets.len())
      .field("actions", &self.actions.len())
      .field("plugins", &self.plugins.names().collect::<Vec<_>>())
      .finish()
  }
}

impl Context {
  /// Create a context that loads plugins from the built-in table.
  pub fn new(settings: Settings) -> Self {
    Self::with_loader(settings, Rc::new(BuiltinLoader))
  }

  pub fn with_loader(settings: Settings, loader: Rc<dyn PluginLoader>) -> Self {
    Self {
      settings,
      target_schema: PropertySchema::new(),
      dependency_schema: PropertySchema::new(),
      loader,
      plugins: PluginRegistry::default(),
      initializers: Vec::new(),
      projects: Vec::new(),
      targets: Vec::new(),
      actions: Vec::new(),
      project_dirs: HashMap::new(),
      root: None,
      options: Vec::new(),
      search_path: Vec::new(),
      scripts: BTreeMap::new(),
    }
  }

  pub fn settings(&self) -> &Settings {
    &self.settings
  }

  pub fn settings_mut(&mut self) -> &mut Settings {
    &mut self.settings
  }

  pub fn target_schema(&self) -> &PropertySchema {
    &self.target_schema
  }

  pub fn dependency_schema(&self) -> &PropertySchema {
    &self.dependency_schema
  }

  /// Raw option overrides recorded in the cache summary.
  pub fn set_options(&mut self, options: Vec<String>) {
    self.options = options;
  }

  pub fn options(&self) -> &[String] {
    &self.options
  }

  /// Script search path recorded in the cache summary.
  pub fn set_search_path(&mut self, path: Vec<String>) {
    self.search_path = path;
  }

  pub fn search_path(&self) -> &[String] {
    &self.search_path
  }

  /// Remember a file the configuration was read from and the hash of its
  /// contents.
  pub fn record_script(&mut self, path: &Path, sha256: String) {
    self.scripts.insert(path.to_string_lossy().into_owned(), sha256);
  }

  /// Fingerprint an input file that is not a script, such as the settings
  /// file. A missing file is recorded with an empty hash.
  pub fn track_file(&mut self, path: &Path) -> Result<(), GraphError> {
    let path = if path.is_absolute() {
      path.to_path_buf()
    } else {
      std::env::current_dir()?.join(path)
    };
    let digest = fingerprint(&path)?;
    debug!(path = %path.display(), "tracking input file");
    self.record_script(&path, digest);
    Ok(())
  }

  pub fn scripts(&self) -> &BTreeMap<String, String> {
    &self.scripts
  }

  pub fn add_initializer(&mut self, initializer: Rc<dyn ProjectInitializer>) {
    self.initializers.push(initializer);
  }

  // -------------------------------------------------------------------------
  // Plugins
  // -------------------------------------------------------------------------

  /// Register a plugin directly, bypassing the loader.
  pub fn register_plugin(&mut self, kind: Rc<dyn TargetKind>) -> Result<(), GraphError> {
    if self.plugins.get(kind.name()).is_some() {
      return Ok(());
    }
    let mut schemas = SchemaRegistry {
      targets: &mut self.target_schema,
      dependencies: &mut self.dependency_schema,
    };
    kind.register(&mut schemas)?;
    debug!(plugin = kind.name(), "registered plugin");
    self.plugins.insert(kind);
    Ok(())
  }

  /// Return a loaded plugin, loading and registering it on first use.
  pub fn load_plugin(&mut self, name: &str) -> Result<Rc<dyn TargetKind>, GraphError> {
    if let Some(kind) = self.plugins.get(name) {
      return Ok(kind);
    }
    let kind = self
      .loader
      .load(name)
      .ok_or_else(|| GraphError::UnknownPlugin(name.to_string()))?;
    self.register_plugin(kind.clone())?;
    Ok(kind)
  }

  /// Load a plugin and let it attach itself to `project`.
  pub fn apply_plugin(&mut self, project: ProjectId, name: &str) -> Result<(), GraphError> {
    self.project_ref(project)?;
    let kind = self.load_plugin(name)?;
    kind.apply(self, project)
  }

  pub fn plugin(&self, name: &str) -> Option<Rc<dyn TargetKind>> {
    self.plugins.get(name)
  }

  // -------------------------------------------------------------------------
  // Projects
  // -------------------------------------------------------------------------

  /// Return the project rooted at `directory`, creating it on first use.
  ///
  /// The first project created this way becomes the root project.
  pub fn project(&mut self, directory: &Path) -> Result<ProjectId, GraphError> {
    let directory = canonical_dir(directory)?;
    if let Some(&id) = self.project_dirs.get(&directory) {
      return Ok(id);
    }
    let id = self.create_project(None, directory)?;
    if self.root.is_none() {
      self.root = Some(id);
    }
    Ok(id)
  }

  /// Reference a subproject by a path relative to `parent`'s directory.
  pub fn subproject(&mut self, parent: ProjectId, relative: &str) -> Result<ProjectId, GraphError> {
    self.subproject_entry(parent, relative).map(|(id, _)| id)
  }

  /// Like [`Context::subproject`], also reporting whether the project was
  /// created by this call.
  pub fn subproject_entry(&mut self, parent: ProjectId, relative: &str) -> Result<(ProjectId, bool), GraphError> {
    let directory = canonical_dir(&self.project_ref(parent)?.directory.join(relative))?;
    if let Some(&id) = self.project_dirs.get(&directory) {
      self.project_mut(parent)?.subprojects.entry(directory).or_insert(id);
      return Ok((id, false));
    }
    let id = self.create_project(Some(parent), directory.clone())?;
    self.project_mut(parent)?.subprojects.insert(directory, id);
    Ok((id, true))
  }

  fn create_project(&mut self, parent: Option<ProjectId>, directory: PathBuf) -> Result<ProjectId, GraphError> {
    let id = ProjectId(self.projects.len());
    let project = Project::new(id, parent, directory.clone());
    debug!(project = %id, name = %project.name(), directory = %directory.display(), "creating project");
    self.projects.push(project);
    self.project_dirs.insert(directory, id);

    let initializers = self.initializers.clone();
    for initializer in initializers {
      initializer.initialize(self, id)?;
    }
    Ok(id)
  }

  pub fn root_project(&self) -> Result<ProjectId, GraphError> {
    self.root.ok_or(GraphError::NoRootProject)
  }

  pub fn project_ref(&self, id: ProjectId) -> Result<&Project, GraphError> {
    self.projects.get(id.0).ok_or(GraphError::DanglingProject(id))
  }

  pub(crate) fn project_mut(&mut self, id: ProjectId) -> Result<&mut Project, GraphError> {
    self.projects.get_mut(id.0).ok_or(GraphError::DanglingProject(id))
  }

  pub fn projects(&self) -> impl Iterator<Item = &Project> {
    self.projects.iter()
  }

  pub fn parent(&self, project: ProjectId) -> Result<Option<ProjectId>, GraphError> {
    let parent = self.project_ref(project)?.parent;
    if let Some(parent) = parent {
      self.project_ref(parent)?;
    }
    Ok(parent)
  }

  pub fn project_name(&self, project: ProjectId) -> Result<String, GraphError> {
    Ok(self.project_ref(project)?.name())
  }

  pub fn set_project_name(&mut self, project: ProjectId, name: &str) -> Result<(), GraphError> {
    validate_name("project", name)?;
    self.project_mut(project)?.name = Some(name.to_string());
    Ok(())
  }

  /// Colon-joined names from the root down to `project`.
  pub fn project_path(&self, project: ProjectId) -> Result<String, GraphError> {
    let mut names = Vec::new();
    let mut current = Some(project);
    while let Some(id) = current {
      let p = self.project_ref(id)?;
      names.push(p.name());
      current = p.parent;
    }
    names.reverse();
    Ok(names.join(":"))
  }

  pub fn set_build_directory(&mut self, project: ProjectId, directory: PathBuf) -> Result<(), GraphError> {
    let base = self.project_ref(project)?.directory.clone();
    self.project_mut(project)?.build_directory = Some(base.join(directory));
    Ok(())
  }

  /// The explicit build directory of `project`, else the context default.
  pub fn build_directory(&self, project: ProjectId) -> Result<PathBuf, GraphError> {
    match &self.project_ref(project)?.build_directory {
      Some(dir) => Ok(dir.clone()),
      None => self.default_build_directory(project),
    }
  }

  /// `<root build directory>/<project path below the root>`.
  pub fn default_build_directory(&self, project: ProjectId) -> Result<PathBuf, GraphError> {
    let mut dir = self.root_build_directory()?;
    let path = self.project_path(project)?;
    for segment in path.split(':').skip(1) {
      dir.push(segment);
    }
    Ok(dir)
  }

  /// Build directory of the root project; the exported build file lives here.
  pub fn root_build_directory(&self) -> Result<PathBuf, GraphError> {
    let root = self.root_project()?;
    let root_dir = &self.project_ref(root)?.directory;
    if let Some(dir) = &self.project_ref(root)?.build_directory {
      return Ok(dir.clone());
    }
    Ok(root_dir.join(self.settings.get_or(OPT_BUILD_DIRECTORY, DEFAULT_BUILD_DIR)))
  }

  pub fn subprojects(&self, project: ProjectId) -> Result<Vec<ProjectId>, GraphError> {
    Ok(self.project_ref(project)?.subprojects().collect())
  }

  /// Files matching `pattern` relative to the project directory, sorted.
  /// Entries that cannot be read are skipped.
  pub fn glob(&self, project: ProjectId, pattern: &str) -> Result<Vec<PathBuf>, GraphError> {
    let full = if Path::new(pattern).is_absolute() {
      pattern.to_string()
    } else {
      let base = glob::Pattern::escape(&self.project_ref(project)?.directory.to_string_lossy());
      format!("{}/{}", base, pattern)
    };
    let entries = glob::glob(&full).map_err(|e| GraphError::Glob {
      pattern: pattern.to_string(),
      message: e.msg.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
      match entry {
        Ok(path) => files.push(path),
        Err(e) => warn!(path = %e.path().display(), error = %e.error(), "skipping unreadable glob match"),
      }
    }
    files.sort();
    Ok(files)
  }

  pub fn get_subproject_by_name(&self, project: ProjectId, name: &str) -> Result<ProjectId, GraphError> {
    let p = self.project_ref(project)?;
    for id in p.subprojects() {
      if self.project_ref(id)?.name() == name {
        return Ok(id);
      }
    }
    Err(GraphError::NoSuchProject(format!("{}:{}", self.project_path(project)?, name)))
  }

  pub fn add_project_extension(&mut self, project: ProjectId, key: &str, extension: Extension) -> Result<(), GraphError> {
    self.project_mut(project)?.extensions.insert(key, extension);
    Ok(())
  }

  pub fn project_extension(&self, project: ProjectId, key: &str) -> Result<&Extension, GraphError> {
    let p = self.project_ref(project)?;
    p.extensions.find(key).ok_or_else(|| GraphError::NoSuchExtension {
      owner: format!("Project({:?})", p.name()),
      key: key.to_string(),
    })
  }

  // -------------------------------------------------------------------------
  // Targets
  // -------------------------------------------------------------------------

  /// Create a task in `project`. With a `kind`, the plugin of that name is
  /// loaded if needed and its `mounted` hook runs before this returns.
  pub fn task(&mut self, project: ProjectId, name: &str, kind: Option<&str>) -> Result<TargetId, GraphError> {
    validate_name("task", name)?;
    let p = self.project_ref(project)?;
    if p.tasks.contains_key(name) {
      return Err(GraphError::DuplicateTask {
        project: self.project_path(project)?,
        name: name.to_string(),
      });
    }

    let plugin = match kind {
      Some(kind) => Some(self.load_plugin(kind)?),
      None => None,
    };

    let id = TargetId(self.targets.len());
    self
      .targets
      .push(Target::new(id, project, name, kind.map(str::to_string)));
    self.project_mut(project)?.tasks.insert(name.to_string(), id);
    debug!(target = name, kind = ?kind, "created task");

    if let Some(plugin) = plugin {
      plugin.mounted(self, id)?;
    }
    Ok(id)
  }

  pub fn target_ref(&self, id: TargetId) -> Result<&Target, GraphError> {
    self.targets.get(id.0).ok_or(GraphError::DanglingTarget(id))
  }

  pub(crate) fn target_mut(&mut self, id: TargetId) -> Result<&mut Target, GraphError> {
    self.targets.get_mut(id.0).ok_or(GraphError::DanglingTarget(id))
  }

  pub fn targets(&self) -> impl Iterator<Item = &Target> {
    self.targets.iter()
  }

  pub fn tasks(&self, project: ProjectId) -> Result<Vec<TargetId>, GraphError> {
    Ok(self.project_ref(project)?.tasks().collect())
  }

  /// `project:path:task`.
  pub fn target_path(&self, target: TargetId) -> Result<String, GraphError> {
    let t = self.target_ref(target)?;
    Ok(format!("{}:{}", self.project_path(t.project)?, t.name))
  }

  /// Find a target by qualified name, or by bare task name in the root project.
  pub fn find_target(&self, name: &str) -> Result<TargetId, GraphError> {
    for target in &self.targets {
      if self.target_path(target.id)? == name {
        return Ok(target.id);
      }
    }
    if !name.contains(':')
      && let Some(root) = self.root
      && let Some(id) = self.project_ref(root)?.task(name)
    {
      return Ok(id);
    }
    Err(GraphError::NoSuchTarget(name.to_string()))
  }

  pub fn set_prop(&mut self, target: TargetId, key: &str, value: PropertyValue) -> Result<(), GraphError> {
    let t = self.targets.get_mut(target.0).ok_or(GraphError::DanglingTarget(target))?;
    t.props.set(&self.target_schema, key, value)?;
    Ok(())
  }

  /// Set a value that dependents see through [`Context::get_prop_join`].
  pub fn export_prop(&mut self, target: TargetId, key: &str, value: PropertyValue) -> Result<(), GraphError> {
    let t = self.targets.get_mut(target.0).ok_or(GraphError::DanglingTarget(target))?;
    t.exported.set(&self.target_schema, key, value)?;
    Ok(())
  }

  /// Declare that `target` depends on `dependency`. Edge properties are
  /// checked against the dependency schema.
  pub fn add_dependency(
    &mut self,
    target: TargetId,
    dependency: TargetId,
    props: BTreeMap<String, PropertyValue>,
  ) -> Result<(), GraphError> {
    self.target_ref(dependency)?;
    let mut bag = PropertyBag::new();
    for (key, value) in props {
      bag.set(&self.dependency_schema, &key, value)?;
    }
    self.target_mut(target)?.dependencies.push(Dependency {
      target: dependency,
      props: bag,
    });
    Ok(())
  }

  /// Direct dependencies of `target`, in declaration order.
  pub fn dependencies(&self, target: TargetId) -> Result<Vec<TargetId>, GraphError> {
    Ok(self.target_ref(target)?.dependencies.iter().map(|d| d.target).collect())
  }

  pub fn add_target_extension(&mut self, target: TargetId, key: &str, extension: Extension) -> Result<(), GraphError> {
    self.target_mut(target)?.extensions.insert(key, extension);
    Ok(())
  }

  pub fn target_extension(&self, target: TargetId, key: &str) -> Result<&Extension, GraphError> {
    let t = self.target_ref(target)?;
    t.extensions.find(key).ok_or_else(|| GraphError::NoSuchExtension {
      owner: format!("Target({:?})", t.name),
      key: key.to_string(),
    })
  }

  // -------------------------------------------------------------------------
  // Actions
  // -------------------------------------------------------------------------

  pub fn action_ref(&self, id: ActionId) -> Result<&Action, GraphError> {
    self.actions.get(id.0).ok_or(GraphError::DanglingAction(id))
  }

  pub(crate) fn action_mut(&mut self, id: ActionId) -> Result<&mut Action, GraphError> {
    self.actions.get_mut(id.0).ok_or(GraphError::DanglingAction(id))
  }

  pub fn actions(&self) -> impl Iterator<Item = &Action> {
    self.actions.iter()
  }
}

/// Absolute, symlink-free form of `path`. Directories that do not exist yet
/// are normalized lexically.
fn canonical_dir(path: &Path) -> Result<PathBuf, GraphError> {
  match dunce::canonicalize(path) {
    Ok(p) => Ok(p),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      let absolute = if path.is_absolute() {
        path.to_path_buf()
      } else {
        std::env::current_dir()?.join(path)
      };
      Ok(normalize_lexically(&absolute))
    }
    Err(e) => Err(e.into()),
  }
}

fn normalize_lexically(path: &Path) -> PathBuf {
  let mut normalized = PathBuf::new();
  for component in path.components() {
    match component {
      Component::ParentDir => {
        normalized.pop();
      }
      Component::CurDir => {}
      other => normalized.push(other.as_os_str()),
    }
  }
  normalized
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;
  use tempfile::TempDir;

  fn context_in(temp: &TempDir) -> (Context, ProjectId) {
    let mut ctx = Context::new(Settings::default());
    let root = ctx.project(temp.path()).unwrap();
    ctx.set_project_name(root, "app").unwrap();
    (ctx, root)
  }

  #[test]
  fn names_follow_identifier_rules() {
    for good in ["a", "lib-core", "x_86", "A0-_z"] {
      assert!(validate_name("task", good).is_ok(), "{} should be accepted", good);
    }
    for bad in ["", "a b", "a:b", "a.b", "ä", "x#y", "a/b"] {
      assert!(validate_name("task", bad).is_err(), "{} should be rejected", bad);
    }
  }

  #[test]
  fn duplicate_task_fails() {
    let temp = TempDir::new().unwrap();
    let (mut ctx, root) = context_in(&temp);
    ctx.task(root, "build", None).unwrap();

    let err = ctx.task(root, "build", None).unwrap_err();
    assert!(matches!(err, GraphError::DuplicateTask { ref name, .. } if name == "build"));
  }

  #[test]
  fn invalid_task_name_fails() {
    let temp = TempDir::new().unwrap();
    let (mut ctx, root) = context_in(&temp);
    assert!(matches!(
      ctx.task(root, "no spaces", None),
      Err(GraphError::InvalidName { what: "task", .. })
    ));
  }

  #[test]
  fn subproject_is_memoized_by_canonical_directory() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("libs/core")).unwrap();

    let mut ctx = Context::new(Settings::default());
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    ctx.add_initializer(Rc::new(move |_: &mut Context, _: ProjectId| -> Result<(), GraphError> {
      counter.set(counter.get() + 1);
      Ok(())
    }));

    let root = ctx.project(temp.path()).unwrap();
    let a = ctx.subproject(root, "libs/core").unwrap();
    let b = ctx.subproject(root, "libs/../libs/./core").unwrap();

    assert_eq!(a, b);
    // root + one subproject
    assert_eq!(calls.get(), 2);
    assert_eq!(ctx.subprojects(root).unwrap(), vec![a]);
  }

  #[test]
  fn initializer_sees_registered_project() {
    let temp = TempDir::new().unwrap();
    let mut ctx = Context::new(Settings::default());
    ctx.add_initializer(Rc::new(|ctx: &mut Context, project: ProjectId| -> Result<(), GraphError> {
      // A circular reference back to the same directory resolves to the
      // project that is currently being initialized.
      let parent = ctx.parent(project)?;
      if let Some(parent) = parent {
        let again = ctx.subproject(parent, "child")?;
        assert_eq!(again, project);
      }
      Ok(())
    }));

    let root = ctx.project(temp.path()).unwrap();
    let child = ctx.subproject(root, "child").unwrap();
    assert_eq!(ctx.parent(child).unwrap(), Some(root));
  }

  #[test]
  fn project_path_joins_ancestors() {
    let temp = TempDir::new().unwrap();
    let (mut ctx, root) = context_in(&temp);
    let libs = ctx.subproject(root, "libs").unwrap();
    let core = ctx.subproject(libs, "core").unwrap();

    assert_eq!(ctx.project_path(core).unwrap(), "app:libs:core");
    let task = ctx.task(core, "compile", None).unwrap();
    assert_eq!(ctx.target_path(task).unwrap(), "app:libs:core:compile");
    assert_eq!(ctx.find_target("app:libs:core:compile").unwrap(), task);
  }

  #[test]
  fn build_directory_defaults_below_root() {
    let temp = TempDir::new().unwrap();
    let (mut ctx, root) = context_in(&temp);
    let core = ctx.subproject(root, "libs/core").unwrap();

    let root_dir = ctx.project_ref(root).unwrap().directory().to_path_buf();
    assert_eq!(ctx.build_directory(root).unwrap(), root_dir.join("build"));
    assert_eq!(ctx.build_directory(core).unwrap(), root_dir.join("build").join("core"));

    ctx.set_build_directory(core, PathBuf::from("out")).unwrap();
    assert_eq!(
      ctx.build_directory(core).unwrap(),
      ctx.project_ref(core).unwrap().directory().join("out")
    );
  }

  #[test]
  fn unknown_extension_is_an_error() {
    let temp = TempDir::new().unwrap();
    let (mut ctx, root) = context_in(&temp);
    ctx
      .add_project_extension(root, "version", Extension::Value("1.0".into()))
      .unwrap();

    assert_eq!(
      ctx.project_extension(root, "version").unwrap(),
      &Extension::Value("1.0".into())
    );
    let err = ctx.project_extension(root, "cxx").unwrap_err();
    assert_eq!(err.to_string(), "Project(\"app\") has no attribute or extension named \"cxx\"");
  }

  #[test]
  fn dangling_handles_are_reported() {
    let ctx = Context::new(Settings::default());
    assert!(matches!(
      ctx.project_ref(ProjectId(7)),
      Err(GraphError::DanglingProject(ProjectId(7)))
    ));
    assert!(matches!(ctx.target_ref(TargetId(0)), Err(GraphError::DanglingTarget(_))));
    assert!(matches!(ctx.root_project(), Err(GraphError::NoRootProject)));
  }

  #[test]
  fn get_subproject_by_name_reports_missing() {
    let temp = TempDir::new().unwrap();
    let (mut ctx, root) = context_in(&temp);
    let libs = ctx.subproject(root, "libs").unwrap();
    assert_eq!(ctx.get_subproject_by_name(root, "libs").unwrap(), libs);

    let err = ctx.get_subproject_by_name(root, "tools").unwrap_err();
    assert_eq!(err.to_string(), "project app:tools does not exist");
  }

  #[test]
  fn directory_names_are_sanitized() {
    let temp = TempDir::new().unwrap();
    let (mut ctx, root) = context_in(&temp);
    std::fs::create_dir(temp.path().join("my project")).unwrap();
    let sub = ctx.subproject(root, "my project").unwrap();

    assert_eq!(ctx.project_name(sub).unwrap(), "my_project");
    assert_eq!(ctx.get_subproject_by_name(root, "my_project").unwrap(), sub);
    let ok = ctx.task(sub, "ok", None).unwrap();
    assert_eq!(ctx.target_path(ok).unwrap(), "app:my_project:ok");
    assert_eq!(ctx.find_target("app:my_project:ok").unwrap(), ok);
  }

  #[test]
  fn tracked_files_join_the_scripts() {
    let temp = TempDir::new().unwrap();
    let (mut ctx, _) = context_in(&temp);
    let present = temp.path().join("settings.toml");
    std::fs::write(&present, "").unwrap();
    let absent = temp.path().join("missing.toml");

    ctx.track_file(&present).unwrap();
    ctx.track_file(&absent).unwrap();
    let scripts = ctx.scripts();
    assert_eq!(scripts[&*present.to_string_lossy()].len(), 64);
    assert_eq!(scripts[&*absent.to_string_lossy()], "");
  }

  #[test]
  fn glob_is_relative_to_the_project() {
    let temp = TempDir::new().unwrap();
    let (mut ctx, root) = context_in(&temp);
    let src = temp.path().join("src");
    std::fs::create_dir_all(src.join("nested")).unwrap();
    for file in ["b.c", "a.c", "notes.txt", "nested/c.c"] {
      std::fs::write(src.join(file), "").unwrap();
    }
    let dir = ctx.project_ref(root).unwrap().directory().to_path_buf();

    assert_eq!(
      ctx.glob(root, "src/*.c").unwrap(),
      vec![dir.join("src").join("a.c"), dir.join("src").join("b.c")]
    );
    assert_eq!(ctx.glob(root, "src/**/*.c").unwrap().len(), 3);
    assert!(ctx.glob(root, "missing/*.c").unwrap().is_empty());
    assert!(matches!(ctx.glob(root, "src/***"), Err(GraphError::Glob { .. })));
  }
}
