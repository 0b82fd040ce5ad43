use std::collections::BTreeMap;

/// Tagged file bag of an [`Action`](super::Action).
///
/// Tags are free-form. A query for `src` also returns files stored under
/// sub-tags like `src.c` or `src.cpp`, in tag order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildSet {
  files: BTreeMap<String, Vec<String>>,
}

impl BuildSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append `files` under `tag`.
  pub fn add<I, S>(&mut self, tag: &str, files: I) -> &mut Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self
      .files
      .entry(tag.to_string())
      .or_default()
      .extend(files.into_iter().map(Into::into));
    self
  }

  /// Files under `tag` and all of its `tag.*` sub-tags.
  pub fn get(&self, tag: &str) -> Vec<&str> {
    self
      .files
      .iter()
      .filter(|(key, _)| *key == tag || (key.starts_with(tag) && key[tag.len()..].starts_with('.')))
      .flat_map(|(_, files)| files.iter().map(String::as_str))
      .collect()
  }

  pub fn tags(&self) -> impl Iterator<Item = &str> {
    self.files.keys().map(String::as_str)
  }

  pub fn is_empty(&self) -> bool {
    self.files.values().all(Vec::is_empty)
  }

  /// `in`, or `src` when no `in` files are present.
  pub fn inputs(&self) -> Vec<&str> {
    let files = self.get("in");
    if files.is_empty() { self.get("src") } else { files }
  }

  /// `out`, or `obj` followed by `product` when no `out` files are present.
  pub fn outputs(&self) -> Vec<&str> {
    let files = self.get("out");
    if !files.is_empty() {
      return files;
    }
    let mut files = self.get("obj");
    files.extend(self.get("product"));
    files
  }

  pub fn implicit(&self) -> Vec<&str> {
    self.get("implicit")
  }

  pub fn order_only(&self) -> Vec<&str> {
    self.get("order_only")
  }
}
