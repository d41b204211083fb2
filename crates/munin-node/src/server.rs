//! The node listener.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use munin_plugin::PluginProvider;
use tokio::net::{TcpListener, TcpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::access::{AccessRule, AddressListAccessRule};
use crate::config::NodeConfig;
use crate::error::{ServerError, ServerResult};
use crate::protocol::MuninProtocol;
use crate::session::SessionManager;

/// Pending connections queued by the kernel while a session is served.
pub const LISTEN_BACKLOG: u32 = 1;

/// A munin node: accepts collector connections and serves them one at a time.
///
/// The accept loop waits for each session to finish completely before it
/// accepts the next connection.
#[derive(Debug)]
pub struct MuninServer {
    config: NodeConfig,
    sessions: SessionManager,
    sessions_served: AtomicU64,
}

impl MuninServer {
    /// Create a server for `provider`, allowing the configured addresses.
    #[must_use]
    pub fn new(config: NodeConfig, provider: Arc<dyn PluginProvider>) -> Self {
        let access = Arc::new(AddressListAccessRule::new(config.allow_from.clone()));
        Self::with_access_rule(config, provider, access)
    }

    /// Create a server with a custom access rule.
    #[must_use]
    pub fn with_access_rule(
        config: NodeConfig,
        provider: Arc<dyn PluginProvider>,
        access: Arc<dyn AccessRule>,
    ) -> Self {
        let protocol = Arc::new(MuninProtocol::new(&config, provider));
        let sessions = SessionManager::new(protocol, access, config.session);
        Self {
            config,
            sessions,
            sessions_served: AtomicU64::new(0),
        }
    }

    /// Get the server configuration.
    #[must_use]
    pub const fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Number of connections handled so far, refused ones included.
    #[must_use]
    pub fn sessions_served(&self) -> u64 {
        self.sessions_served.load(Ordering::Relaxed)
    }

    /// Bind the configured address with `SO_REUSEADDR` and a backlog of one.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::BindFailed` if the socket cannot be bound.
    pub fn bind(&self) -> ServerResult<TcpListener> {
        bind(self.config.bind_addr())
    }

    /// Bind the configured address and serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::BindFailed` if binding fails, and
    /// `ServerError::Cancelled` on cancellation if `error_on_cancel` is set.
    pub async fn run(&self, cancel: &CancellationToken, error_on_cancel: bool) -> ServerResult<()> {
        let listener = self.bind()?;
        self.serve(listener, cancel, error_on_cancel).await
    }

    /// Accept and serve connections on `listener`, one session at a time.
    ///
    /// Session failures are logged and never stop the loop.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Cancelled` when `cancel` fires if
    /// `error_on_cancel` is set; otherwise cancellation returns `Ok(())`.
    pub async fn serve(
        &self,
        listener: TcpListener,
        cancel: &CancellationToken,
        error_on_cancel: bool,
    ) -> ServerResult<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, hostname = %self.config.hostname, "munin node listening");
        }

        let result = self.accept_loop(&listener, cancel).await;

        info!(
            sessions_served = self.sessions_served(),
            "munin node shutting down"
        );

        match result {
            Err(e) if e.is_cancelled() && !error_on_cancel => Ok(()),
            other => other,
        }
    }

    async fn accept_loop(&self, listener: &TcpListener, cancel: &CancellationToken) -> ServerResult<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(ServerError::Cancelled);
            }

            info!("accepting...");
            let accepted = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ServerError::Cancelled),
                accepted = listener.accept() => accepted,
            };

            let (stream, remote) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(remote = %remote, "connection accepted");
            let result = self.sessions.handle_connection(stream, remote, cancel).await;
            self.sessions_served.fetch_add(1, Ordering::Relaxed);
            info!(remote = %remote, "connection closed");

            match result {
                Err(_) if cancel.is_cancelled() => return Err(ServerError::Cancelled),
                Err(e) => warn!(remote = %remote, error = %e, "session failed"),
                Ok(()) => {}
            }
        }
    }
}

/// Bind `addr` with `SO_REUSEADDR` and a backlog of [`LISTEN_BACKLOG`].
///
/// # Errors
///
/// Returns `ServerError::BindFailed` if the socket cannot be created, bound or
/// put into listening state.
pub fn bind(addr: SocketAddr) -> ServerResult<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
    .map_err(|e| ServerError::BindFailed(addr, e))?;

    socket
        .set_reuseaddr(true)
        .map_err(|e| ServerError::BindFailed(addr, e))?;
    socket
        .bind(addr)
        .map_err(|e| ServerError::BindFailed(addr, e))?;
    socket
        .listen(LISTEN_BACKLOG)
        .map_err(|e| ServerError::BindFailed(addr, e))
}
