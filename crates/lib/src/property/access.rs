use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use super::schema::has_prefix;
use super::{PropertyError, PropertyValue};
use crate::graph::{Context, GraphError, TargetId};

impl Context {
  /// Own value of `key` on `target`, else the schema default.
  pub fn get_prop(&self, target: TargetId, key: &str) -> Result<Option<PropertyValue>, GraphError> {
    let t = self.target_ref(target)?;
    Ok(t.props.resolve(&self.target_schema, key)?)
  }

  /// Like [`Context::get_prop`], with the value flattened into a list.
  pub fn get_prop_list(&self, target: TargetId, key: &str) -> Result<Vec<PropertyValue>, GraphError> {
    Ok(self.get_prop(target, key)?.map(PropertyValue::flatten).unwrap_or_default())
  }

  pub fn get_prop_str(&self, target: TargetId, key: &str) -> Result<Option<String>, GraphError> {
    Ok(self.get_prop(target, key)?.as_ref().and_then(|v| v.as_str()).map(str::to_string))
  }

  pub fn get_prop_bool(&self, target: TargetId, key: &str) -> Result<bool, GraphError> {
    Ok(self.get_prop(target, key)?.and_then(|v| v.as_bool()).unwrap_or(false))
  }

  /// Values of `key` gathered along direct dependencies.
  ///
  /// The result holds every dependency's exported value in declaration order,
  /// then the target's own value (or default), then its own exported value.
  /// Lists are flattened; duplicates are kept.
  pub fn get_prop_join(&self, target: TargetId, key: &str) -> Result<Vec<PropertyValue>, GraphError> {
    self.target_schema.def(key)?;
    let t = self.target_ref(target)?;

    let mut joined = Vec::new();
    for dep in &t.dependencies {
      let dep_target = self.target_ref(dep.target)?;
      if let Some(value) = dep_target.exported.get(key) {
        self.target_schema.check(key, value)?;
        joined.extend(value.clone().flatten());
      }
    }
    if let Some(value) = t.props.resolve(&self.target_schema, key)? {
      joined.extend(value.flatten());
    }
    if let Some(value) = t.exported.get(key) {
      joined.extend(value.clone().flatten());
    }
    Ok(joined)
  }

  /// All properties under `prefix` that have a value or a default.
  pub fn get_props(&self, target: TargetId, prefix: &str) -> Result<BTreeMap<String, PropertyValue>, GraphError> {
    let t = self.target_ref(target)?;
    let mut props = BTreeMap::new();
    for def in self.target_schema.defs_with_prefix(prefix) {
      if let Some(value) = t.props.resolve(&self.target_schema, &def.key)? {
        props.insert(def.key.clone(), value);
      }
    }
    Ok(props)
  }

  /// Properties under `prefix` deserialized into `T`, keyed by the part of the
  /// name after the prefix (`cxx.srcs` becomes the field `srcs`).
  pub fn get_props_as<T: DeserializeOwned>(&self, target: TargetId, prefix: &str) -> Result<T, GraphError> {
    let prefix = prefix.trim_end_matches('.');
    let mut object = serde_json::Map::new();
    for (key, value) in self.get_props(target, prefix)? {
      if !has_prefix(&key, prefix) || key.len() == prefix.len() {
        continue;
      }
      let field = key[prefix.len() + 1..].to_string();
      let json = serde_json::to_value(&value).map_err(|e| deserialize_error(prefix, e))?;
      object.insert(field, json);
    }
    serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| GraphError::from(deserialize_error(prefix, e)))
  }

  /// Property `key` of the `index`-th dependency edge of `target`, else the
  /// dependency schema default.
  pub fn dep_prop(&self, target: TargetId, index: usize, key: &str) -> Result<Option<PropertyValue>, GraphError> {
    let t = self.target_ref(target)?;
    let dep = t.dependencies.get(index).ok_or_else(|| {
      GraphError::NoSuchTarget(format!("dependency #{} of {}", index, t.name))
    })?;
    Ok(dep.props.resolve(&self.dependency_schema, key)?)
  }
}

fn deserialize_error(prefix: &str, e: serde_json::Error) -> PropertyError {
  PropertyError::Deserialize {
    prefix: prefix.to_string(),
    message: e.to_string(),
  }
}
