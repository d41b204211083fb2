//! Plugins, plugin providers and the session callbacks they receive.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{PluginError, PluginResult};
use crate::field::Field;
use crate::graph::GraphAttributes;

/// Future returned by [`SessionCallback`] methods.
pub type CallbackFuture<'a> = Pin<Box<dyn Future<Output = PluginResult<()>> + Send + 'a>>;

/// Notifications bracketing one collector session.
///
/// Both methods default to doing nothing. Providers typically use
/// `session_started` to collect every plugin's data in one batch.
pub trait SessionCallback: Send + Sync {
    /// Called when a session starts, before any command is processed.
    fn session_started<'a>(
        &'a self,
        _session_id: &'a str,
        _cancel: &'a CancellationToken,
    ) -> CallbackFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    /// Called when a session ends, whatever the reason.
    fn session_closed<'a>(
        &'a self,
        _session_id: &'a str,
        _cancel: &'a CancellationToken,
    ) -> CallbackFuture<'a> {
        Box::pin(async { Ok(()) })
    }
}

/// A named metrics source: graph metadata plus an ordered set of fields.
pub trait Plugin: SessionCallback {
    /// The service name used by `list`, `config` and `fetch`.
    fn name(&self) -> &str;

    /// Graph-level attributes.
    fn graph_attributes(&self) -> &GraphAttributes;

    /// Fields in emission order.
    fn fields(&self) -> &[Arc<dyn Field>];

    /// Looks up a field by name.
    fn field(&self, name: &str) -> Option<&Arc<dyn Field>> {
        self.fields().iter().find(|f| f.name() == name)
    }
}

/// The set of plugins served by the node.
///
/// The collection must not change while a session is in progress.
pub trait PluginProvider: SessionCallback {
    /// Plugins in listing order.
    fn plugins(&self) -> &[Arc<dyn Plugin>];

    /// Looks up a plugin by exact name.
    fn plugin(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins().iter().find(|p| p.name() == name)
    }
}

/// A plugin built from fixed graph attributes and fields.
pub struct BasicPlugin {
    name: String,
    graph: GraphAttributes,
    fields: Vec<Arc<dyn Field>>,
}

impl BasicPlugin {
    /// Creates a plugin.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::EmptyPluginName` for an empty name and
    /// `PluginError::DuplicateField` if two fields share a name.
    pub fn new(
        name: impl Into<String>,
        graph: GraphAttributes,
        fields: Vec<Arc<dyn Field>>,
    ) -> PluginResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(PluginError::EmptyPluginName);
        }

        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name()) {
                return Err(PluginError::DuplicateField {
                    plugin: name,
                    field: field.name().to_string(),
                });
            }
        }

        Ok(Self {
            name,
            graph,
            fields,
        })
    }
}

impl SessionCallback for BasicPlugin {}

impl Plugin for BasicPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn graph_attributes(&self) -> &GraphAttributes {
        &self.graph
    }

    fn fields(&self) -> &[Arc<dyn Field>] {
        &self.fields
    }
}

impl fmt::Debug for BasicPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields.iter().map(|f| f.name()).collect();
        f.debug_struct("BasicPlugin")
            .field("name", &self.name)
            .field("graph", &self.graph)
            .field("fields", &fields)
            .finish()
    }
}

/// A provider over a fixed list of plugins.
#[derive(Default)]
pub struct StaticPluginProvider {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl StaticPluginProvider {
    /// Creates a provider serving `plugins` in the given order.
    #[must_use]
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        debug!(count = plugins.len(), "plugin provider created");
        Self { plugins }
    }

    /// Number of plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns true if no plugin is served.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl SessionCallback for StaticPluginProvider {}

impl PluginProvider for StaticPluginProvider {
    fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }
}

impl fmt::Debug for StaticPluginProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.plugins.iter().map(|p| p.name()).collect();
        f.debug_struct("StaticPluginProvider")
            .field("plugins", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldAttributes, FnField};
    use crate::types::FieldName;

    fn field(name: &str) -> Arc<dyn Field> {
        let attrs = FieldAttributes::new(FieldName::new(name).unwrap(), name).unwrap();
        Arc::new(FnField::new(attrs, || Some(0.0)))
    }

    fn plugin(name: &str, fields: &[&str]) -> Arc<dyn Plugin> {
        let fields = fields.iter().map(|f| field(f)).collect();
        Arc::new(BasicPlugin::new(name, GraphAttributes::new(name), fields).unwrap())
    }

    #[test]
    fn basic_plugin_accessors() {
        let p = plugin("cpu", &["user", "system"]);

        assert_eq!(p.name(), "cpu");
        assert_eq!(p.graph_attributes().title, "cpu");
        assert_eq!(p.fields().len(), 2);
        assert!(p.field("system").is_some());
        assert!(p.field("idle").is_none());
    }

    #[test]
    fn basic_plugin_rejects_empty_name() {
        let result = BasicPlugin::new("", GraphAttributes::default(), vec![]);
        assert!(matches!(result, Err(PluginError::EmptyPluginName)));
    }

    #[test]
    fn basic_plugin_rejects_duplicate_fields() {
        let result = BasicPlugin::new(
            "if_eth0",
            GraphAttributes::default(),
            vec![field("down"), field("down")],
        );
        assert!(matches!(result, Err(PluginError::DuplicateField { .. })));
    }

    #[test]
    fn provider_lookup_is_exact() {
        let provider = StaticPluginProvider::new(vec![plugin("cpu", &[]), plugin("uptime", &[])]);

        assert_eq!(provider.len(), 2);
        assert!(provider.plugin("uptime").is_some());
        assert!(provider.plugin("Uptime").is_none());
        assert!(provider.plugin("up").is_none());
    }

    #[test]
    fn empty_provider() {
        let provider = StaticPluginProvider::default();
        assert!(provider.is_empty());
        assert!(provider.plugins().is_empty());
    }

    #[tokio::test]
    async fn default_callbacks_succeed() {
        let provider = StaticPluginProvider::new(vec![plugin("cpu", &[])]);
        let cancel = CancellationToken::new();

        assert!(provider.session_started("id", &cancel).await.is_ok());
        assert!(provider.plugins()[0].session_closed("id", &cancel).await.is_ok());
    }
}
