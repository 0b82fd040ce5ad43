//! Minimal writer for the ninja build file syntax.

/// Per-rule settings written under `rule NAME`.
#[derive(Debug, Default, Clone)]
pub struct Rule<'a> {
  pub command: &'a str,
  pub description: Option<&'a str>,
  pub pool: Option<&'a str>,
  pub deps: Option<&'a str>,
  pub depfile: Option<&'a str>,
  pub msvc_deps_prefix: Option<&'a str>,
}

/// File lists of one `build` statement.
#[derive(Debug, Default, Clone)]
pub struct Edge<'a> {
  pub outputs: Vec<&'a str>,
  pub inputs: Vec<&'a str>,
  pub implicit: Vec<&'a str>,
  pub order_only: Vec<&'a str>,
}

/// Accumulates ninja statements in memory.
#[derive(Debug, Default)]
pub struct Writer {
  out: String,
}

impl Writer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn newline(&mut self) {
    self.out.push('\n');
  }

  pub fn comment(&mut self, text: &str) {
    for line in text.lines() {
      self.out.push_str("# ");
      self.out.push_str(line);
      self.out.push('\n');
    }
  }

  /// Append pre-formatted lines verbatim.
  pub fn raw(&mut self, text: &str) {
    self.out.push_str(text);
    if !text.ends_with('\n') {
      self.out.push('\n');
    }
  }

  pub fn variable(&mut self, key: &str, value: &str, indent: usize) {
    for _ in 0..indent {
      self.out.push_str("  ");
    }
    self.out.push_str(key);
    self.out.push_str(" = ");
    self.out.push_str(value);
    self.out.push('\n');
  }

  pub fn rule(&mut self, name: &str, rule: &Rule<'_>) {
    self.out.push_str("rule ");
    self.out.push_str(name);
    self.out.push('\n');
    self.variable("command", rule.command, 1);
    if let Some(description) = rule.description {
      self.variable("description", description, 1);
    }
    if let Some(pool) = rule.pool {
      self.variable("pool", pool, 1);
    }
    if let Some(deps) = rule.deps {
      self.variable("deps", deps, 1);
    }
    if let Some(depfile) = rule.depfile {
      self.variable("depfile", depfile, 1);
    }
    if let Some(prefix) = rule.msvc_deps_prefix {
      self.variable("msvc_deps_prefix", prefix, 1);
    }
  }

  pub fn build(&mut self, rule: &str, edge: &Edge<'_>) {
    self.out.push_str("build");
    for output in &edge.outputs {
      self.out.push(' ');
      self.out.push_str(&escape_path(output));
    }
    self.out.push_str(": ");
    self.out.push_str(rule);
    for input in &edge.inputs {
      self.out.push(' ');
      self.out.push_str(&escape_path(input));
    }
    if !edge.implicit.is_empty() {
      self.out.push_str(" |");
      for dep in &edge.implicit {
        self.out.push(' ');
        self.out.push_str(&escape_path(dep));
      }
    }
    if !edge.order_only.is_empty() {
      self.out.push_str(" ||");
      for dep in &edge.order_only {
        self.out.push(' ');
        self.out.push_str(&escape_path(dep));
      }
    }
    self.out.push('\n');
  }

  pub fn default_targets(&mut self, targets: &[&str]) {
    self.out.push_str("default");
    for target in targets {
      self.out.push(' ');
      self.out.push_str(&escape_path(target));
    }
    self.out.push('\n');
  }

  pub fn finish(self) -> String {
    self.out
  }
}

/// Escape a path for use in a `build` or `default` line.
pub fn escape_path(path: &str) -> String {
  let mut escaped = String::with_capacity(path.len());
  for c in path.chars() {
    match c {
      '$' => escaped.push_str("$$"),
      ' ' => escaped.push_str("$ "),
      ':' => escaped.push_str("$:"),
      '\n' => escaped.push_str("$\n"),
      c => escaped.push(c),
    }
  }
  escaped
}
