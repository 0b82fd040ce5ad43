use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared type of a property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
  String,
  Bool,
  Integer,
  /// A filesystem path. Stored as a string.
  Path,
  List(Box<PropertyType>),
  Map(Box<PropertyType>),
  Any,
}

impl PropertyType {
  pub fn list_of(inner: PropertyType) -> Self {
    PropertyType::List(Box::new(inner))
  }

  pub fn map_of(inner: PropertyType) -> Self {
    PropertyType::Map(Box::new(inner))
  }

  /// Check whether `value` conforms to this type, recursively.
  pub fn accepts(&self, value: &PropertyValue) -> bool {
    match (self, value) {
      (PropertyType::Any, _) => true,
      (PropertyType::String | PropertyType::Path, PropertyValue::String(_)) => true,
      (PropertyType::Bool, PropertyValue::Bool(_)) => true,
      (PropertyType::Integer, PropertyValue::Integer(_)) => true,
      (PropertyType::List(inner), PropertyValue::List(items)) => items.iter().all(|v| inner.accepts(v)),
      (PropertyType::Map(inner), PropertyValue::Map(map)) => map.values().all(|v| inner.accepts(v)),
      _ => false,
    }
  }
}

impl fmt::Display for PropertyType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PropertyType::String => write!(f, "string"),
      PropertyType::Bool => write!(f, "bool"),
      PropertyType::Integer => write!(f, "integer"),
      PropertyType::Path => write!(f, "path"),
      PropertyType::List(inner) => write!(f, "list<{}>", inner),
      PropertyType::Map(inner) => write!(f, "map<{}>", inner),
      PropertyType::Any => write!(f, "any"),
    }
  }
}

/// A property value as stored on a target, a dependency edge or an extension.
///
/// Serializes untagged, so a value converts to plain JSON (`["a", "b"]`,
/// `{"k": true}`) and back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
  Bool(bool),
  Integer(i64),
  String(String),
  List(Vec<PropertyValue>),
  Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
  /// Short name of the value's shape, used in type errors.
  pub fn type_name(&self) -> &'static str {
    match self {
      PropertyValue::Bool(_) => "bool",
      PropertyValue::Integer(_) => "integer",
      PropertyValue::String(_) => "string",
      PropertyValue::List(_) => "list",
      PropertyValue::Map(_) => "map",
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      PropertyValue::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      PropertyValue::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_integer(&self) -> Option<i64> {
    match self {
      PropertyValue::Integer(i) => Some(*i),
      _ => None,
    }
  }

  pub fn as_list(&self) -> Option<&[PropertyValue]> {
    match self {
      PropertyValue::List(items) => Some(items),
      _ => None,
    }
  }

  pub fn as_map(&self) -> Option<&BTreeMap<String, PropertyValue>> {
    match self {
      PropertyValue::Map(map) => Some(map),
      _ => None,
    }
  }

  /// A list yields its items, anything else yields itself.
  pub fn flatten(self) -> Vec<PropertyValue> {
    match self {
      PropertyValue::List(items) => items,
      other => vec![other],
    }
  }

  /// Strings of a list value (or of a single string). Non-strings are skipped.
  pub fn to_strings(&self) -> Vec<String> {
    match self {
      PropertyValue::String(s) => vec![s.clone()],
      PropertyValue::List(items) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
      _ => Vec::new(),
    }
  }

  pub fn string_list<I, S>(items: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    PropertyValue::List(items.into_iter().map(|s| PropertyValue::String(s.into())).collect())
  }
}

impl From<&str> for PropertyValue {
  fn from(s: &str) -> Self {
    PropertyValue::String(s.to_string())
  }
}

impl From<String> for PropertyValue {
  fn from(s: String) -> Self {
    PropertyValue::String(s)
  }
}

impl From<bool> for PropertyValue {
  fn from(b: bool) -> Self {
    PropertyValue::Bool(b)
  }
}

impl From<i64> for PropertyValue {
  fn from(i: i64) -> Self {
    PropertyValue::Integer(i)
  }
}

impl fmt::Display for PropertyValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PropertyValue::String(s) => write!(f, "{:?}", s),
      other => match serde_json::to_string(other) {
        Ok(json) => write!(f, "{}", json),
        Err(_) => write!(f, "<{}>", other.type_name()),
      },
    }
  }
}
