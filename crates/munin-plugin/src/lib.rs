//! # munin-plugin
//!
//! Plugin data model for the munin-node daemon.
//!
//! A [`Plugin`] is a named metrics source with [`GraphAttributes`] and an
//! ordered list of [`Field`]s. A [`PluginProvider`] owns the plugins served by
//! a node. Both receive [`SessionCallback`] notifications around every
//! collector session.
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use munin_plugin::{
//!     category, config_lines, BasicPlugin, Field, FieldAttributes, FieldName, FnField,
//!     GraphAttributes, GraphStyle,
//! };
//!
//! let load = FieldAttributes::new(FieldName::new("load").unwrap(), "load")
//!     .unwrap()
//!     .with_graph_style(GraphStyle::Line);
//! let field: Arc<dyn Field> = Arc::new(FnField::new(load, || Some(0.42)));
//! let plugin = BasicPlugin::new(
//!     "load",
//!     GraphAttributes::new("Load average").with_category(category::SYSTEM),
//!     vec![field],
//! )
//! .unwrap();
//!
//! assert_eq!(config_lines(&plugin).last().map(String::as_str), Some("."));
//! ```
//!
//! ## Config Blocks
//!
//! [`config_lines`] renders the `config <plugin>` response: `graph_*` lines,
//! then one attribute block per field, then a terminating `.`. Fields used as
//! the negative side of another field are always declared first and marked
//! `graph no`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod field;
pub mod graph;
pub mod plugin;
pub mod render;
pub mod types;

// Re-export main types
pub use error::{PluginError, PluginResult};
pub use field::{fetch_formatted, Field, FieldAttributes, FnField, ValueFuture};
pub use graph::{category, GraphAttributes, GraphPeriod};
pub use plugin::{
    BasicPlugin, CallbackFuture, Plugin, PluginProvider, SessionCallback, StaticPluginProvider,
};
pub use render::{config_lines, END_OF_BLOCK};
pub use types::{
    format_number, format_value, validate_label, FieldName, GraphStyle, ValueRange, UNKNOWN_VALUE,
};
