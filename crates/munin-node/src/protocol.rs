//! The protocol engine: banner, session callbacks and command dispatch.

use std::fmt;
use std::sync::Arc;

use munin_plugin::PluginProvider;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::command::{CommandRegistry, CommandResult};
use crate::commands::standard_registry;
use crate::config::NodeConfig;
use crate::error::ServerResult;

/// Speaks the munin node protocol on behalf of a plugin provider.
pub struct MuninProtocol {
    hostname: String,
    provider: Arc<dyn PluginProvider>,
    registry: CommandRegistry,
}

impl MuninProtocol {
    /// Creates an engine serving `provider` with the standard command set.
    #[must_use]
    pub fn new(config: &NodeConfig, provider: Arc<dyn PluginProvider>) -> Self {
        let registry = standard_registry(&config.hostname, &config.version, &provider);
        Self::with_registry(config.hostname.clone(), provider, registry)
    }

    /// Creates an engine with a custom command registry.
    #[must_use]
    pub fn with_registry(
        hostname: impl Into<String>,
        provider: Arc<dyn PluginProvider>,
        registry: CommandRegistry,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            provider,
            registry,
        }
    }

    /// The greeting sent once a connection is authorized, newline included.
    #[must_use]
    pub fn banner(&self) -> String {
        format!("# munin node at {}\n", self.hostname)
    }

    /// The plugin provider.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn PluginProvider> {
        &self.provider
    }

    /// Notifies the provider, then every plugin in order, that a session started.
    ///
    /// # Errors
    ///
    /// Returns the first callback error; later callbacks are not run.
    pub async fn session_started(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> ServerResult<()> {
        self.provider.session_started(session_id, cancel).await?;

        for plugin in self.provider.plugins() {
            plugin.session_started(session_id, cancel).await?;
        }

        debug!(session_id, "session start callbacks completed");
        Ok(())
    }

    /// Notifies every plugin in order, then the provider, that a session ended.
    ///
    /// # Errors
    ///
    /// Returns the first callback error; later callbacks are not run.
    pub async fn session_closed(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> ServerResult<()> {
        for plugin in self.provider.plugins() {
            plugin.session_closed(session_id, cancel).await?;
        }

        self.provider.session_closed(session_id, cancel).await?;

        debug!(session_id, "session close callbacks completed");
        Ok(())
    }

    /// Handles one framed command line. Invalid UTF-8 is replaced, not rejected.
    ///
    /// # Errors
    ///
    /// Returns the command's error.
    pub async fn handle_command(
        &self,
        line: &[u8],
        cancel: &CancellationToken,
    ) -> ServerResult<CommandResult> {
        let line = String::from_utf8_lossy(line);
        self.registry.dispatch(&line, cancel).await
    }
}

impl fmt::Debug for MuninProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MuninProtocol")
            .field("hostname", &self.hostname)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use munin_plugin::{
        CallbackFuture, Field, GraphAttributes, Plugin, PluginError, SessionCallback,
    };

    use crate::command::Status;
    use crate::commands::USAGE;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recording {
        name: String,
        log: Log,
        fail_start: bool,
        graph: GraphAttributes,
        plugins: Vec<Arc<dyn Plugin>>,
    }

    impl Recording {
        fn new(name: &str, log: &Log) -> Self {
            Self {
                name: name.to_string(),
                log: log.clone(),
                fail_start: false,
                graph: GraphAttributes::new(name),
                plugins: Vec::new(),
            }
        }

        fn record(&self, event: &str) {
            self.log.lock().unwrap().push(format!("{}.{event}", self.name));
        }
    }

    impl SessionCallback for Recording {
        fn session_started<'a>(
            &'a self,
            _session_id: &'a str,
            _cancel: &'a CancellationToken,
        ) -> CallbackFuture<'a> {
            self.record("start");
            let fail = self.fail_start;
            Box::pin(async move {
                if fail {
                    Err(PluginError::Callback("refused".to_string()))
                } else {
                    Ok(())
                }
            })
        }

        fn session_closed<'a>(
            &'a self,
            _session_id: &'a str,
            _cancel: &'a CancellationToken,
        ) -> CallbackFuture<'a> {
            self.record("end");
            Box::pin(async { Ok(()) })
        }
    }

    impl Plugin for Recording {
        fn name(&self) -> &str {
            &self.name
        }

        fn graph_attributes(&self) -> &GraphAttributes {
            &self.graph
        }

        fn fields(&self) -> &[Arc<dyn Field>] {
            &[]
        }
    }

    impl PluginProvider for Recording {
        fn plugins(&self) -> &[Arc<dyn Plugin>] {
            &self.plugins
        }
    }

    fn engine(log: &Log, fail_plugin: Option<&str>) -> MuninProtocol {
        let plugins: Vec<Arc<dyn Plugin>> = ["X", "Y"]
            .into_iter()
            .map(|name| {
                let mut plugin = Recording::new(name, log);
                plugin.fail_start = fail_plugin == Some(name);
                Arc::new(plugin) as Arc<dyn Plugin>
            })
            .collect();

        let mut provider = Recording::new("P", log);
        provider.plugins = plugins;

        let config = NodeConfig::new().with_hostname("node1");
        MuninProtocol::new(&config, Arc::new(provider))
    }

    #[test]
    fn test_banner() {
        let log = Log::default();
        assert_eq!(engine(&log, None).banner(), "# munin node at node1\n");
    }

    #[tokio::test]
    async fn test_bracketing_order() {
        let log = Log::default();
        let engine = engine(&log, None);
        let cancel = CancellationToken::new();

        engine.session_started("s1", &cancel).await.unwrap();
        engine.session_closed("s1", &cancel).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["P.start", "X.start", "Y.start", "X.end", "Y.end", "P.end"]
        );
    }

    #[tokio::test]
    async fn test_start_stops_at_first_failure() {
        let log = Log::default();
        let engine = engine(&log, Some("X"));

        let err = engine
            .session_started("s1", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("refused"));
        assert_eq!(*log.lock().unwrap(), vec!["P.start", "X.start"]);
    }

    #[tokio::test]
    async fn test_handle_command() {
        let log = Log::default();
        let engine = engine(&log, None);
        let cancel = CancellationToken::new();

        let list = engine.handle_command(b"list", &cancel).await.unwrap();
        assert_eq!(list.lines, vec!["X Y"]);

        let quit = engine.handle_command(b".", &cancel).await.unwrap();
        assert_eq!(quit.status, Status::Quit);
    }

    #[tokio::test]
    async fn test_invalid_utf8_gets_help() {
        let log = Log::default();
        let engine = engine(&log, None);

        let result = engine
            .handle_command(&[0xff, 0xfe, b'x'], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.lines, vec![USAGE]);
    }
}
