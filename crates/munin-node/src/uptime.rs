//! Built-in `uptime` plugin reporting how long the node has been running.

use std::sync::Arc;
use std::time::Instant;

use munin_plugin::{
    category, BasicPlugin, Field, FieldAttributes, FieldName, FnField, GraphAttributes,
    GraphStyle, PluginResult,
};

/// Service name of the plugin.
pub const UPTIME_PLUGIN_NAME: &str = "uptime";

/// Name of the plugin's single field.
pub const UPTIME_FIELD_NAME: &str = "uptime";

/// Creates the `uptime` plugin measuring minutes since `started`.
///
/// # Errors
///
/// Returns `PluginError::InvalidLabel` if `hostname` is not a valid label.
pub fn uptime_plugin(hostname: &str, started: Instant) -> PluginResult<BasicPlugin> {
    let graph = GraphAttributes::new(format!("Uptime of {hostname}"))
        .with_category(category::SYSTEM)
        .with_vertical_label("Uptime [minutes]")
        .with_scale(false)
        .with_arguments("--base 1000 --lower-limit 0");

    let attributes = FieldAttributes::new(FieldName::new(UPTIME_FIELD_NAME)?, hostname)?
        .with_graph_style(GraphStyle::Area);
    let field: Arc<dyn Field> = Arc::new(FnField::new(attributes, move || {
        Some(started.elapsed().as_secs_f64() / 60.0)
    }));

    BasicPlugin::new(UPTIME_PLUGIN_NAME, graph, vec![field])
}
