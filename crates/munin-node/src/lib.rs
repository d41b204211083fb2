//! # munin-node
//!
//! A munin node daemon: serves plugin metrics to a munin collector over the
//! line-oriented munin node protocol.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   TCP (4949)   ┌──────────────────────────────────────┐
//! │  munin    │◄──────────────►│  MuninServer (one session at a time) │
//! │ collector │                │                                      │
//! └───────────┘                │  ┌────────────────┐  ┌────────────┐  │
//!                              │  │ SessionManager │─►│ AccessRule │  │
//!                              │  └───────┬────────┘  └────────────┘  │
//!                              │          │ lines                     │
//!                              │  ┌───────▼────────┐  ┌────────────┐  │
//!                              │  │ MuninProtocol  │─►│ Plugin-    │  │
//!                              │  │ + commands     │  │  Provider  │  │
//!                              │  └────────────────┘  └────────────┘  │
//!                              └──────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Instant;
//! use munin_node::{uptime_plugin, MuninServer, NodeConfig};
//! use munin_plugin::{Plugin, StaticPluginProvider};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = NodeConfig::new().with_port(4949);
//!     let uptime: Arc<dyn Plugin> = Arc::new(uptime_plugin(&config.hostname, Instant::now())?);
//!     let provider = Arc::new(StaticPluginProvider::new(vec![uptime]));
//!
//!     let server = MuninServer::new(config, provider);
//!     server.run(&CancellationToken::new(), false).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Protocol
//!
//! On connect the node greets with `# munin node at <hostname>`. The
//! collector then sends one command per line:
//!
//! - **cap**: capability negotiation (none advertised)
//! - **list**: plugin names
//! - **nodes**: the node's host name
//! - **config** `<plugin>`: graph and field attributes
//! - **fetch** `<plugin>`: current field values
//! - **version**: product and version
//! - **quit** or `.`: close the connection

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod access;
pub mod command;
pub mod commands;
pub mod config;
pub mod error;
pub mod framing;
pub mod protocol;
pub mod response;
pub mod server;
pub mod session;
pub mod uptime;

// Re-export main types
pub use access::{AccessRule, AddressListAccessRule};
pub use command::{
    is_quit_line, match_command, Command, CommandFuture, CommandRegistry, CommandResult, Status,
};
pub use commands::{
    standard_registry, CapCommand, ConfigCommand, FetchCommand, HelpCommand, ListCommand,
    NodesCommand, VersionCommand,
};
pub use config::{parse_address_list, NodeConfig, SessionConfig, DEFAULT_PORT};
pub use error::{ServerError, ServerResult, SessionPhase};
pub use framing::LineFramer;
pub use protocol::MuninProtocol;
pub use server::{bind, MuninServer};
pub use session::{derive_session_id, Session, SessionManager, SessionState};
pub use uptime::uptime_plugin;
