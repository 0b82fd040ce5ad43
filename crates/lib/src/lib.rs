//! loom-lib: the core of the loom meta build system.
//!
//! Build scripts describe projects and their targets. loom translates that
//! description into concrete command actions and exports them as a ninja
//! build file:
//! - [`graph`]: projects, targets and their extensions, owned by a [`graph::Context`]
//! - [`property`]: typed target properties and inheritance along dependencies
//! - [`plugin`]: target kinds, including the built-in `command` kind
//! - [`translate`]: dependency-ordered translation of targets into actions
//! - [`action`]: actions and the tagged file sets they operate on
//! - [`export`]: the ninja writer and command wrapping
//! - [`cache`]: the configuration summary embedded in the build file
//! - [`lua`] and [`eval`]: the `build.loom.lua` script layer

pub mod action;
pub mod cache;
pub mod consts;
pub mod eval;
pub mod execute;
pub mod export;
pub mod graph;
pub mod lua;
pub mod platform;
pub mod plugin;
pub mod property;
pub mod settings;
pub mod translate;
pub mod util;
