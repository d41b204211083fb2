//! Node configuration.
//!
//! Configuration for the munin node daemon, including:
//! - Listen address and port
//! - Host name reported to the collector
//! - Addresses allowed to connect
//! - Per-session buffering limits

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Default TCP port of the munin node protocol.
pub const DEFAULT_PORT: u16 = 4949;

/// Host name used when the system host name cannot be determined.
pub const FALLBACK_HOSTNAME: &str = "localhost";

/// Default minimum number of bytes requested per socket read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 256;

/// Default number of received chunks buffered ahead of the command processor.
pub const DEFAULT_MAX_PENDING_CHUNKS: usize = 16;

/// Buffering limits of a single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minimum number of bytes requested per socket read.
    pub read_chunk_size: usize,
    /// Received chunks that may wait for the command processor before the
    /// receiver stops reading from the socket.
    pub max_pending_chunks: usize,
}

impl SessionConfig {
    /// Create a session configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            max_pending_chunks: DEFAULT_MAX_PENDING_CHUNKS,
        }
    }

    /// Set the read chunk size.
    #[must_use]
    pub const fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Set the number of pending chunks.
    #[must_use]
    pub const fn with_max_pending_chunks(mut self, max: usize) -> Self {
        self.max_pending_chunks = max;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Main node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address to listen on.
    pub listen: IpAddr,
    /// Port to listen on.
    pub port: u16,
    /// Host name reported by the banner, `nodes` and `version`.
    pub hostname: String,
    /// Remote addresses allowed to open a session.
    pub allow_from: Vec<IpAddr>,
    /// Version reported by `version`.
    pub version: String,
    /// Session buffering limits.
    pub session: SessionConfig,
}

impl NodeConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listen: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            hostname: default_hostname(),
            allow_from: default_allow_from(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            session: SessionConfig::new(),
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> ServerResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ServerError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> ServerResult<()> {
        if self.hostname.trim().is_empty() {
            return Err(ServerError::Config("hostname cannot be empty".to_string()));
        }

        if self.hostname.contains(['\r', '\n']) {
            return Err(ServerError::Config(
                "hostname cannot contain line breaks".to_string(),
            ));
        }

        if self.session.read_chunk_size == 0 {
            return Err(ServerError::Config(
                "session.read_chunk_size must be greater than zero".to_string(),
            ));
        }

        if self.session.max_pending_chunks == 0 {
            return Err(ServerError::Config(
                "session.max_pending_chunks must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// The socket address to bind.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen, self.port)
    }

    /// Set the listen address.
    #[must_use]
    pub const fn with_listen(mut self, listen: IpAddr) -> Self {
        self.listen = listen;
        self
    }

    /// Set the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the reported host name.
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Set the allowed remote addresses.
    #[must_use]
    pub fn with_allow_from(mut self, allow_from: Vec<IpAddr>) -> Self {
        self.allow_from = allow_from;
        self
    }

    /// Set the reported version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the session configuration.
    #[must_use]
    pub const fn with_session_config(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The system host name, or [`FALLBACK_HOSTNAME`].
#[must_use]
pub fn default_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_HOSTNAME.to_string())
}

/// Loopback addresses of both families.
#[must_use]
pub fn default_allow_from() -> Vec<IpAddr> {
    vec![IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V6(Ipv6Addr::LOCALHOST)]
}

/// Parses a list of IP addresses separated by spaces, commas or semicolons.
///
/// Entries that are not valid addresses are skipped.
#[must_use]
pub fn parse_address_list(list: &str) -> Vec<IpAddr> {
    list.split([' ', ',', ';'])
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| entry.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    // ==================== SessionConfig Tests ====================

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.read_chunk_size, DEFAULT_READ_CHUNK_SIZE);
        assert_eq!(config.max_pending_chunks, DEFAULT_MAX_PENDING_CHUNKS);
    }

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfig::new()
            .with_read_chunk_size(4)
            .with_max_pending_chunks(1);
        assert_eq!(config.read_chunk_size, 4);
        assert_eq!(config.max_pending_chunks, 1);
    }

    // ==================== NodeConfig Tests ====================

    #[test]
    fn test_node_config_defaults() {
        let config = NodeConfig::default();

        assert_eq!(config.listen, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(!config.hostname.is_empty());
        assert_eq!(config.allow_from, default_allow_from());
        assert_eq!(config.version, env!("CARGO_PKG_VERSION"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_node_config_builder() {
        let config = NodeConfig::new()
            .with_listen("0.0.0.0".parse().unwrap())
            .with_port(14949)
            .with_hostname("node1.example.com")
            .with_allow_from(vec!["10.0.0.1".parse().unwrap()])
            .with_version("2.0.0")
            .with_session_config(SessionConfig::new().with_read_chunk_size(64));

        assert_eq!(config.bind_addr(), "0.0.0.0:14949".parse().unwrap());
        assert_eq!(config.hostname, "node1.example.com");
        assert_eq!(config.allow_from.len(), 1);
        assert_eq!(config.version, "2.0.0");
        assert_eq!(config.session.read_chunk_size, 64);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = NodeConfig::from_toml(
            r#"
            port = 5000
            hostname = "db1"
            allow_from = ["192.168.1.10", "::1"]

            [session]
            max_pending_chunks = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.hostname, "db1");
        assert_eq!(config.allow_from.len(), 2);
        assert_eq!(config.listen, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.session.max_pending_chunks, 2);
        assert_eq!(config.session.read_chunk_size, DEFAULT_READ_CHUNK_SIZE);
    }

    #[test]
    fn test_from_toml_empty_uses_defaults() {
        let config = NodeConfig::from_toml("").unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.allow_from, default_allow_from());
    }

    #[test]
    fn test_from_toml_invalid() {
        let result = NodeConfig::from_toml("port = \"not a number\"");
        assert!(matches!(result, Err(ServerError::Config(_))));
    }

    #[test]
    fn test_from_file_missing() {
        let result = NodeConfig::from_file("/nonexistent/munin-node.toml");
        assert!(matches!(result, Err(ServerError::Config(msg)) if msg.contains("failed to read")));
    }

    #[test]
    fn test_validate_rejects_empty_hostname() {
        let config = NodeConfig::new().with_hostname("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_multiline_hostname() {
        let config = NodeConfig::new().with_hostname("a\nb");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_session_limits() {
        let config =
            NodeConfig::new().with_session_config(SessionConfig::new().with_read_chunk_size(0));
        assert!(config.validate().is_err());

        let config =
            NodeConfig::new().with_session_config(SessionConfig::new().with_max_pending_chunks(0));
        assert!(config.validate().is_err());
    }

    // ==================== Address List Tests ====================

    #[test_case("127.0.0.1", 1 ; "single")]
    #[test_case("127.0.0.1 ::1", 2 ; "space separated")]
    #[test_case("10.0.0.1,10.0.0.2;10.0.0.3", 3 ; "mixed separators")]
    #[test_case("10.0.0.1, 10.0.0.2", 2 ; "comma and space")]
    #[test_case("", 0 ; "empty")]
    #[test_case("10.0.0.1 nonsense 10.0.0.2", 2 ; "invalid entries skipped")]
    fn test_parse_address_list(input: &str, expected: usize) {
        assert_eq!(parse_address_list(input).len(), expected);
    }

    #[test]
    fn test_parse_address_list_preserves_order() {
        let list = parse_address_list("::1;127.0.0.1");
        assert_eq!(list, default_allow_from().into_iter().rev().collect::<Vec<_>>());
    }
}
