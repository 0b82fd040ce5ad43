//! Typed properties on targets and dependency edges.
//!
//! Plugins register keys with a [`PropertySchema`]; scripts and translators
//! read and write values through the [`Context`](crate::graph::Context)
//! accessors defined in this module.

mod access;
mod schema;
mod types;

pub use schema::{PropertyBag, PropertyDef, PropertyError, PropertySchema};
pub use types::{PropertyType, PropertyValue};
