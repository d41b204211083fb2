//! The munin node protocol commands.
//!
//! | Command | Response |
//! |---|---|
//! | `cap` | `cap` (no optional capabilities) |
//! | `list` | space-joined plugin names |
//! | `nodes` | host name, `.` |
//! | `version` | `munins node on <host> version: <version>` |
//! | `config <plugin>` | graph and field attributes, `.` |
//! | `fetch <plugin>` | one `<field>.value <v>` line per field, `.` |
//!
//! Anything else gets the [`HelpCommand`] usage line.

use std::sync::Arc;

use munin_plugin::{config_lines, fetch_formatted, PluginProvider, END_OF_BLOCK};
use tokio_util::sync::CancellationToken;

use crate::command::{Command, CommandFuture, CommandRegistry, CommandResult};

/// First line of the response to an unknown plugin name.
pub const UNKNOWN_SERVICE: &str = "# Unknown service";

/// Response line of the fallback command.
pub const USAGE: &str = "# Unknown command. Try cap, list, nodes, config, fetch, version or quit";

/// Product name reported by `version`.
pub const PRODUCT: &str = "munins node";

fn unknown_service() -> CommandResult {
    CommandResult::continue_with(vec![UNKNOWN_SERVICE.to_string(), END_OF_BLOCK.to_string()])
}

fn ready(result: CommandResult) -> CommandFuture<'static> {
    Box::pin(async move { Ok(result) })
}

/// `cap`: capability negotiation. Arguments are ignored and no optional
/// capability (`multigraph`, `dirtyconfig`) is advertised.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapCommand;

impl Command for CapCommand {
    fn name(&self) -> &str {
        "cap"
    }

    fn process<'a>(&'a self, _args: &'a str, _cancel: &'a CancellationToken) -> CommandFuture<'a> {
        ready(CommandResult::continue_with(vec!["cap".to_string()]))
    }
}

/// `list`: the names of all plugins.
pub struct ListCommand {
    provider: Arc<dyn PluginProvider>,
}

impl ListCommand {
    /// Creates the command over `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn PluginProvider>) -> Self {
        Self { provider }
    }
}

impl Command for ListCommand {
    fn name(&self) -> &str {
        "list"
    }

    fn process<'a>(&'a self, _args: &'a str, _cancel: &'a CancellationToken) -> CommandFuture<'a> {
        let names: Vec<&str> = self.provider.plugins().iter().map(|p| p.name()).collect();
        ready(CommandResult::continue_with(vec![names.join(" ")]))
    }
}

/// `nodes`: the host name of this node.
#[derive(Debug, Clone)]
pub struct NodesCommand {
    hostname: String,
}

impl NodesCommand {
    /// Creates the command reporting `hostname`.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }
}

impl Command for NodesCommand {
    fn name(&self) -> &str {
        "nodes"
    }

    fn process<'a>(&'a self, _args: &'a str, _cancel: &'a CancellationToken) -> CommandFuture<'a> {
        ready(CommandResult::continue_with(vec![
            self.hostname.clone(),
            END_OF_BLOCK.to_string(),
        ]))
    }
}

/// `version`: product, host name and version.
#[derive(Debug, Clone)]
pub struct VersionCommand {
    line: String,
}

impl VersionCommand {
    /// Creates the command reporting `version` for `hostname`.
    #[must_use]
    pub fn new(hostname: &str, version: &str) -> Self {
        Self {
            line: format!("{PRODUCT} on {hostname} version: {version}"),
        }
    }
}

impl Command for VersionCommand {
    fn name(&self) -> &str {
        "version"
    }

    fn process<'a>(&'a self, _args: &'a str, _cancel: &'a CancellationToken) -> CommandFuture<'a> {
        ready(CommandResult::continue_with(vec![self.line.clone()]))
    }
}

/// `config <plugin>`: the plugin's graph and field attributes.
pub struct ConfigCommand {
    provider: Arc<dyn PluginProvider>,
}

impl ConfigCommand {
    /// Creates the command over `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn PluginProvider>) -> Self {
        Self { provider }
    }
}

impl Command for ConfigCommand {
    fn name(&self) -> &str {
        "config"
    }

    fn process<'a>(&'a self, args: &'a str, _cancel: &'a CancellationToken) -> CommandFuture<'a> {
        let result = match self.provider.plugin(args) {
            Some(plugin) => CommandResult::continue_with(config_lines(&**plugin)),
            None => unknown_service(),
        };
        ready(result)
    }
}

/// `fetch <plugin>`: the current value of every field of the plugin.
///
/// Fields are read one after another in declaration order. The first fetch
/// error aborts the command.
pub struct FetchCommand {
    provider: Arc<dyn PluginProvider>,
}

impl FetchCommand {
    /// Creates the command over `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn PluginProvider>) -> Self {
        Self { provider }
    }
}

impl Command for FetchCommand {
    fn name(&self) -> &str {
        "fetch"
    }

    fn process<'a>(&'a self, args: &'a str, cancel: &'a CancellationToken) -> CommandFuture<'a> {
        Box::pin(async move {
            let Some(plugin) = self.provider.plugin(args) else {
                return Ok(unknown_service());
            };

            let fields = plugin.fields();
            let mut lines = Vec::with_capacity(fields.len() + 1);
            for field in fields {
                let value = fetch_formatted(&**field, cancel).await?;
                lines.push(format!("{}.value {value}", field.name()));
            }
            lines.push(END_OF_BLOCK.to_string());

            Ok(CommandResult::continue_with(lines))
        })
    }
}

/// Fallback for unrecognized lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct HelpCommand;

impl Command for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn process<'a>(&'a self, _args: &'a str, _cancel: &'a CancellationToken) -> CommandFuture<'a> {
        ready(CommandResult::continue_with(vec![USAGE.to_string()]))
    }
}

/// Builds the registry of all protocol commands.
#[must_use]
pub fn standard_registry(
    hostname: &str,
    version: &str,
    provider: &Arc<dyn PluginProvider>,
) -> CommandRegistry {
    CommandRegistry::new(Arc::new(HelpCommand))
        .with_command(Arc::new(FetchCommand::new(provider.clone())))
        .with_command(Arc::new(NodesCommand::new(hostname)))
        .with_command(Arc::new(ListCommand::new(provider.clone())))
        .with_command(Arc::new(ConfigCommand::new(provider.clone())))
        .with_command(Arc::new(CapCommand))
        .with_command(Arc::new(VersionCommand::new(hostname, version)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use munin_plugin::{
        BasicPlugin, Field, FieldAttributes, FieldName, FnField, GraphAttributes, Plugin,
        PluginError, StaticPluginProvider, ValueFuture,
    };
    use test_case::test_case;

    use crate::command::Status;
    use crate::error::ServerError;

    struct FailingField(FieldAttributes);

    impl Field for FailingField {
        fn attributes(&self) -> &FieldAttributes {
            &self.0
        }

        fn fetch_value<'a>(&'a self, _cancel: &'a CancellationToken) -> ValueFuture<'a> {
            let field = self.name().to_string();
            Box::pin(async move {
                Err(PluginError::FetchFailed {
                    field,
                    reason: "sensor offline".to_string(),
                })
            })
        }
    }

    fn attrs(name: &str) -> FieldAttributes {
        FieldAttributes::new(FieldName::new(name).unwrap(), name).unwrap()
    }

    fn value_field(name: &str, value: Option<f64>) -> Arc<dyn Field> {
        Arc::new(FnField::new(attrs(name), move || value))
    }

    fn plugin(name: &str, fields: Vec<Arc<dyn Field>>) -> Arc<dyn Plugin> {
        Arc::new(BasicPlugin::new(name, GraphAttributes::new(name), fields).unwrap())
    }

    fn provider() -> Arc<dyn PluginProvider> {
        Arc::new(StaticPluginProvider::new(vec![
            plugin(
                "load",
                vec![value_field("load", Some(0.25)), value_field("procs", None)],
            ),
            plugin("uptime", vec![value_field("uptime", Some(42.0))]),
            plugin(
                "broken",
                vec![Arc::new(FailingField(attrs("temp"))) as Arc<dyn Field>],
            ),
        ]))
    }

    async fn run(line: &str) -> CommandResult {
        let registry = standard_registry("node1.example.com", "1.2.3", &provider());
        registry.dispatch(line, &CancellationToken::new()).await.unwrap()
    }

    #[tokio::test]
    async fn test_cap() {
        let result = run("cap multigraph dirtyconfig").await;
        assert_eq!(result.lines, vec!["cap"]);
        assert_eq!(result.status, Status::Continue);
    }

    #[tokio::test]
    async fn test_list() {
        assert_eq!(run("list").await.lines, vec!["load uptime broken"]);
    }

    #[tokio::test]
    async fn test_list_empty_provider() {
        let provider: Arc<dyn PluginProvider> = Arc::new(StaticPluginProvider::default());
        let registry = standard_registry("h", "1", &provider);
        let result = registry.dispatch("list", &CancellationToken::new()).await.unwrap();
        assert_eq!(result.lines, vec![""]);
    }

    #[tokio::test]
    async fn test_nodes() {
        assert_eq!(run("nodes").await.lines, vec!["node1.example.com", "."]);
    }

    #[tokio::test]
    async fn test_version() {
        assert_eq!(
            run("version").await.lines,
            vec!["munins node on node1.example.com version: 1.2.3"]
        );
    }

    #[tokio::test]
    async fn test_config() {
        assert_eq!(
            run("config uptime").await.lines,
            vec!["graph_title uptime", "uptime.label uptime", "."]
        );
    }

    #[tokio::test]
    async fn test_fetch() {
        let result = run("fetch load").await;
        assert_eq!(result.lines, vec!["load.value 0.25", "procs.value U", "."]);
        assert_eq!(result.status, Status::Continue);
    }

    #[test_case("fetch unknownname" ; "fetch unknown")]
    #[test_case("config unknownname" ; "config unknown")]
    #[test_case("fetch" ; "fetch without name")]
    #[test_case("fetch Load" ; "name is case sensitive")]
    #[tokio::test]
    async fn test_unknown_service(line: &str) {
        let result = run(line).await;
        assert_eq!(result.lines, vec!["# Unknown service", "."]);
        assert_eq!(result.status, Status::Continue);
    }

    #[test_case("" ; "empty line")]
    #[test_case("hello" ; "unknown word")]
    #[test_case("listx" ; "command suffix")]
    #[test_case("LIST" ; "upper case")]
    #[tokio::test]
    async fn test_help(line: &str) {
        let result = run(line).await;
        assert_eq!(result.lines, vec![USAGE]);
        assert_eq!(result.status, Status::Continue);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let registry = standard_registry("h", "1", &provider());
        let err = registry
            .dispatch("fetch broken", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Plugin(PluginError::FetchFailed { .. })));
    }

    #[tokio::test]
    async fn test_fetch_observes_cancellation() {
        let registry = standard_registry("h", "1", &provider());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = registry.dispatch("fetch load", &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_registry_order() {
        let registry = standard_registry("h", "1", &provider());
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["fetch", "nodes", "list", "config", "cap", "version"]
        );
    }
}
