use std::collections::BTreeMap;

use super::types::{PropertyType, PropertyValue};

/// Schema errors: raised at the point a property is defined, set or read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PropertyError {
  #[error("unknown property: {key}")]
  UnknownProperty { key: String },

  #[error("property {key} expects {expected}, got {found}")]
  TypeMismatch {
    key: String,
    expected: PropertyType,
    found: &'static str,
  },

  #[error("property {key} is already defined as {existing}, cannot redefine as {requested}")]
  Redefined {
    key: String,
    existing: PropertyType,
    requested: PropertyType,
  },

  #[error("property key {0:?} must be namespace-qualified (e.g. \"cxx.srcs\")")]
  InvalidKey(String),

  #[error("cannot read properties under {prefix:?}: {message}")]
  Deserialize { prefix: String, message: String },
}

/// A registered property: its type and optional default.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDef {
  pub key: String,
  pub ty: PropertyType,
  pub default: Option<PropertyValue>,
}

/// Named, typed property descriptors.
///
/// A context keeps two of these: one for target properties and one for
/// dependency properties.
#[derive(Debug, Default, Clone)]
pub struct PropertySchema {
  defs: BTreeMap<String, PropertyDef>,
}

impl PropertySchema {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a property.
  ///
  /// Registering the same key again with the same type is a no-op (the first
  /// default wins). A different type is an error.
  pub fn add(&mut self, key: &str, ty: PropertyType, default: Option<PropertyValue>) -> Result<(), PropertyError> {
    let Some((namespace, name)) = key.split_once('.') else {
      return Err(PropertyError::InvalidKey(key.to_string()));
    };
    if namespace.is_empty() || name.is_empty() {
      return Err(PropertyError::InvalidKey(key.to_string()));
    }

    if let Some(existing) = self.defs.get(key) {
      if existing.ty != ty {
        return Err(PropertyError::Redefined {
          key: key.to_string(),
          existing: existing.ty.clone(),
          requested: ty,
        });
      }
      return Ok(());
    }

    if let Some(ref value) = default
      && !ty.accepts(value)
    {
      return Err(PropertyError::TypeMismatch {
        key: key.to_string(),
        expected: ty,
        found: value.type_name(),
      });
    }

    self.defs.insert(
      key.to_string(),
      PropertyDef {
        key: key.to_string(),
        ty,
        default,
      },
    );
    Ok(())
  }

  pub fn def(&self, key: &str) -> Result<&PropertyDef, PropertyError> {
    self.defs.get(key).ok_or_else(|| PropertyError::UnknownProperty { key: key.to_string() })
  }

  /// Definitions whose key starts with `prefix.` (or equals `prefix`).
  pub fn defs_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a PropertyDef> + 'a {
    self
      .defs
      .values()
      .filter(move |def| has_prefix(&def.key, prefix))
  }

  /// Check `value` against the definition of `key`.
  pub fn check(&self, key: &str, value: &PropertyValue) -> Result<(), PropertyError> {
    let def = self.def(key)?;
    if def.ty.accepts(value) {
      Ok(())
    } else {
      Err(PropertyError::TypeMismatch {
        key: key.to_string(),
        expected: def.ty.clone(),
        found: value.type_name(),
      })
    }
  }
}

pub(crate) fn has_prefix(key: &str, prefix: &str) -> bool {
  let prefix = prefix.trim_end_matches('.');
  key == prefix || (key.starts_with(prefix) && key[prefix.len()..].starts_with('.'))
}

/// Property values of one target or dependency edge.
///
/// Values are validated against the owning schema when set.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PropertyBag {
  values: BTreeMap<String, PropertyValue>,
}

impl PropertyBag {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set(&mut self, schema: &PropertySchema, key: &str, value: PropertyValue) -> Result<(), PropertyError> {
    schema.check(key, &value)?;
    self.values.insert(key.to_string(), value);
    Ok(())
  }

  pub(crate) fn get(&self, key: &str) -> Option<&PropertyValue> {
    self.values.get(key)
  }

  /// Own value, else the schema default. `None` when neither exists.
  ///
  /// The stored value is checked against the schema again, so a bag that was
  /// filled against another schema cannot leak a mistyped value.
  pub fn resolve(&self, schema: &PropertySchema, key: &str) -> Result<Option<PropertyValue>, PropertyError> {
    let def = schema.def(key)?;
    match self.values.get(key) {
      Some(value) => {
        schema.check(key, value)?;
        Ok(Some(value.clone()))
      }
      None => Ok(def.default.clone()),
    }
  }
}
