//! Shell quoting and command wrapping for exported rules.
//!
//! A rule runs a single command line. When an action has several commands,
//! an environment overlay, or a first program that is not an executable on
//! `PATH` (a shell builtin such as `echo` on Windows), the line is wrapped in
//! the target platform's shell.

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::platform::os::Os;

static QUOTED_VARIABLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'(\$\w+)'").expect("valid regex"));

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
  #[error("PATH is not set")]
  NoPath,

  #[error("cannot inspect {path}: {source}")]
  Io { path: PathBuf, source: std::io::Error },
}

/// Decides whether a program can be run without a shell.
pub trait CommandProbe {
  fn is_executable(&self, program: &str) -> Result<bool, ProbeError>;
}

/// Looks programs up on a `PATH`-style search list.
#[derive(Debug, Clone)]
pub struct PathProbe {
  os: Os,
  path: Option<OsString>,
  extensions: Vec<String>,
}

impl PathProbe {
  /// Probe using the current process environment.
  pub fn from_env(os: Os) -> Self {
    let extensions = if os.is_windows() {
      env::var("PATHEXT")
        .unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string())
        .split(';')
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
    } else {
      Vec::new()
    };
    Self {
      os,
      path: env::var_os("PATH"),
      extensions,
    }
  }

  pub fn with_path(os: Os, path: Option<OsString>) -> Self {
    let extensions = if os.is_windows() {
      vec![".EXE".to_string(), ".BAT".to_string(), ".CMD".to_string()]
    } else {
      Vec::new()
    };
    Self { os, path, extensions }
  }

  fn candidates(&self, base: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![base.to_path_buf()];
    if self.os.is_windows() && base.extension().is_none() {
      for ext in &self.extensions {
        let mut name = base.as_os_str().to_owned();
        name.push(ext);
        candidates.push(PathBuf::from(name));
      }
    }
    candidates
  }

  fn is_file(path: &Path) -> Result<bool, ProbeError> {
    match path.metadata() {
      Ok(meta) => Ok(meta.is_file()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
      Err(source) => Err(ProbeError::Io {
        path: path.to_path_buf(),
        source,
      }),
    }
  }
}

impl CommandProbe for PathProbe {
  fn is_executable(&self, program: &str) -> Result<bool, ProbeError> {
    let program_path = Path::new(program);
    if program_path.components().count() > 1 || program_path.is_absolute() {
      for candidate in self.candidates(program_path) {
        if Self::is_file(&candidate)? {
          return Ok(true);
        }
      }
      return Ok(false);
    }

    let search = self.path.as_ref().ok_or(ProbeError::NoPath)?;
    for dir in env::split_paths(search) {
      for candidate in self.candidates(&dir.join(program)) {
        if Self::is_file(&candidate)? {
          return Ok(true);
        }
      }
    }
    Ok(false)
  }
}

/// Quote one argument for a POSIX shell.
pub fn quote_posix(arg: &str) -> String {
  let safe = !arg.is_empty()
    && arg
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || "_-+=@%,./:".contains(c));
  if safe {
    arg.to_string()
  } else {
    format!("'{}'", arg.replace('\'', r#"'"'"'"#))
  }
}

/// Quote one argument following the Windows command line parsing rules.
pub fn quote_windows(arg: &str) -> String {
  if !arg.is_empty() && !arg.contains([' ', '\t', '"']) {
    return arg.to_string();
  }
  let mut quoted = String::from("\"");
  let mut backslashes = 0usize;
  for c in arg.chars() {
    match c {
      '\\' => backslashes += 1,
      '"' => {
        quoted.push_str(&"\\".repeat(backslashes * 2 + 1));
        quoted.push('"');
        backslashes = 0;
      }
      c => {
        quoted.push_str(&"\\".repeat(backslashes));
        quoted.push(c);
        backslashes = 0;
      }
    }
  }
  quoted.push_str(&"\\".repeat(backslashes * 2));
  quoted.push('"');
  quoted
}

pub fn quote(arg: &str, os: Os) -> String {
  if os.is_windows() { quote_windows(arg) } else { quote_posix(arg) }
}

/// Join `args` into a command line and restore `$var` references that
/// quoting wrapped in single quotes.
pub fn join(args: &[String], os: Os) -> String {
  let line = args.iter().map(|a| quote(a, os)).collect::<Vec<_>>().join(" ");
  unquote_variables(&line)
}

pub fn unquote_variables(line: &str) -> String {
  QUOTED_VARIABLE.replace_all(line, "$1").into_owned()
}

/// Render the commands of an action as a single command line for `os`.
pub fn command_line(
  commands: &[Vec<String>],
  environ: &BTreeMap<String, String>,
  os: Os,
  probe: &dyn CommandProbe,
) -> String {
  let commands: Vec<&Vec<String>> = commands.iter().filter(|c| !c.is_empty()).collect();
  let Some(first) = commands.first() else {
    return String::new();
  };

  let mut needs_shell = commands.len() > 1 || !environ.is_empty();
  if !needs_shell {
    let program = &first[0];
    needs_shell = match probe.is_executable(program) {
      Ok(found) => !found,
      Err(e) => {
        warn!(program = %program, error = %e, "could not check whether program is executable, assuming it is");
        false
      }
    };
  }

  let lines: Vec<String> = commands.iter().map(|c| join(c, os)).collect();
  if !needs_shell {
    return lines.join(" && ");
  }
  debug!(commands = lines.len(), os = %os, "wrapping command in shell");

  let mut script = String::new();
  for (key, value) in environ {
    if os.is_windows() {
      script.push_str(&format!("set {}={}&& ", key, value));
    } else {
      script.push_str(&format!("export {}={} && ", key, quote_posix(value)));
    }
  }
  script.push_str(&lines.join(" && "));

  let prefix = os.shell_prefix().join(" ");
  if os.is_windows() {
    format!("{} {}", prefix, script)
  } else {
    format!("{} {}", prefix, quote_posix(&script))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tracing_test::traced_test;

  struct Fixed(Result<bool, ()>);

  impl CommandProbe for Fixed {
    fn is_executable(&self, _program: &str) -> Result<bool, ProbeError> {
      self.0.map_err(|_| ProbeError::NoPath)
    }
  }

  fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn posix_quoting() {
    assert_eq!(quote_posix("plain/path.c"), "plain/path.c");
    assert_eq!(quote_posix("a b"), "'a b'");
    assert_eq!(quote_posix("it's"), r#"'it'"'"'s'"#);
    assert_eq!(quote_posix(""), "''");
  }

  #[test]
  fn windows_quoting() {
    assert_eq!(quote_windows(r"C:\src\a.c"), r"C:\src\a.c");
    assert_eq!(quote_windows(r"C:\Program Files\x"), r#""C:\Program Files\x""#);
    assert_eq!(quote_windows(r#"say "hi""#), r#""say \"hi\"""#);
    assert_eq!(quote_windows(r"dir\ "), r#""dir\ ""#);
    assert_eq!(quote_windows(r"trailing\"), r"trailing\");
    assert_eq!(quote_windows(r"with space\"), r#""with space\\""#);
  }

  #[test]
  fn variables_are_unquoted() {
    let line = join(&argv(&["cc", "-c", "$in", "-o", "$out", "$not-a-var"]), Os::Linux);
    assert_eq!(line, "cc -c $in -o $out '$not-a-var'");
  }

  #[test]
  fn executable_program_runs_directly() {
    let line = command_line(&[argv(&["cc", "$in"])], &BTreeMap::new(), Os::Linux, &Fixed(Ok(true)));
    assert_eq!(line, "cc $in");
  }

  #[test]
  fn builtin_is_wrapped() {
    let line = command_line(&[argv(&["echo", "hi"])], &BTreeMap::new(), Os::Windows, &Fixed(Ok(false)));
    assert_eq!(line, "cmd /c echo hi");
  }

  #[test]
  fn multiple_commands_and_environment_use_a_shell() {
    let mut env = BTreeMap::new();
    env.insert("CFLAGS".to_string(), "-O2 -g".to_string());
    let line = command_line(
      &[argv(&["mkdir", "-p", "out"]), argv(&["cc", "$in"])],
      &env,
      Os::Linux,
      &Fixed(Ok(true)),
    );
    assert_eq!(
      line,
      r#"/bin/sh -c 'export CFLAGS='"'"'-O2 -g'"'"' && mkdir -p out && cc $in'"#
    );
  }

  #[traced_test]
  #[test]
  fn probe_failure_warns_and_assumes_executable() {
    let line = command_line(&[argv(&["gen"])], &BTreeMap::new(), Os::Linux, &Fixed(Err(())));
    assert_eq!(line, "gen");
    assert!(logs_contain("could not check whether program is executable"));
  }

  #[test]
  fn path_probe_finds_files() {
    let temp = tempfile::TempDir::new().unwrap();
    std::fs::write(temp.path().join("tool"), "").unwrap();
    let probe = PathProbe::with_path(Os::Linux, Some(temp.path().as_os_str().to_owned()));

    assert!(probe.is_executable("tool").unwrap());
    assert!(!probe.is_executable("missing").unwrap());
    assert!(matches!(
      PathProbe::with_path(Os::Linux, None).is_executable("tool"),
      Err(ProbeError::NoPath)
    ));
  }

  #[test]
  fn path_probe_tries_windows_extensions() {
    let temp = tempfile::TempDir::new().unwrap();
    std::fs::write(temp.path().join("tool.EXE"), "").unwrap();
    let probe = PathProbe::with_path(Os::Windows, Some(temp.path().as_os_str().to_owned()));

    assert!(probe.is_executable("tool").unwrap());
  }
}
