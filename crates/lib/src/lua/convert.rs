//! Conversion between Lua values and property values.
//!
//! Sequences (tables with a non-zero length) become lists, other tables
//! become string-keyed maps, and an empty table becomes an empty list.

use std::collections::BTreeMap;

use mlua::prelude::*;

use crate::property::PropertyValue;

pub fn to_property(value: LuaValue) -> LuaResult<PropertyValue> {
  match value {
    LuaValue::Boolean(b) => Ok(PropertyValue::Bool(b)),
    LuaValue::Integer(i) => Ok(PropertyValue::Integer(i)),
    LuaValue::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Ok(PropertyValue::Integer(n as i64)),
    LuaValue::Number(n) => Err(LuaError::external(format!(
      "properties cannot hold fractional numbers ({})",
      n
    ))),
    LuaValue::String(s) => Ok(PropertyValue::String(s.to_str()?.to_string())),
    LuaValue::Table(table) => {
      if table.raw_len() > 0 {
        let mut items = Vec::new();
        for value in table.sequence_values::<LuaValue>() {
          items.push(to_property(value?)?);
        }
        return Ok(PropertyValue::List(items));
      }

      let mut map = BTreeMap::new();
      for pair in table.pairs::<LuaValue, LuaValue>() {
        let (key, value) = pair?;
        let LuaValue::String(key) = key else {
          return Err(LuaError::external("property maps need string keys"));
        };
        map.insert(key.to_str()?.to_string(), to_property(value)?);
      }
      if map.is_empty() {
        Ok(PropertyValue::List(Vec::new()))
      } else {
        Ok(PropertyValue::Map(map))
      }
    }
    other => Err(LuaError::external(format!(
      "a {} cannot be stored as a property",
      other.type_name()
    ))),
  }
}

pub fn to_lua(lua: &Lua, value: &PropertyValue) -> LuaResult<LuaValue> {
  match value {
    PropertyValue::Bool(b) => Ok(LuaValue::Boolean(*b)),
    PropertyValue::Integer(i) => Ok(LuaValue::Integer(*i)),
    PropertyValue::String(s) => Ok(LuaValue::String(lua.create_string(s)?)),
    PropertyValue::List(items) => {
      let table = lua.create_table()?;
      for item in items {
        table.raw_push(to_lua(lua, item)?)?;
      }
      Ok(LuaValue::Table(table))
    }
    PropertyValue::Map(map) => {
      let table = lua.create_table()?;
      for (key, item) in map {
        table.raw_set(key.as_str(), to_lua(lua, item)?)?;
      }
      Ok(LuaValue::Table(table))
    }
  }
}
