//! Per-connection session handling.
//!
//! A session moves through [`SessionState`]s:
//!
//! ```text
//! Accepted -> Authorized -> BannerSent -> Active -> Closing -> Closed
//!     |            |
//!     +------------+----------------------------------> Closing
//! ```
//!
//! While `Active`, a receive pump reads socket bytes into a bounded channel
//! and a process pump frames lines, dispatches commands and writes each
//! response before taking the next line. Session close callbacks run
//! whenever the start callbacks were attempted, whatever ended the session.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::access::AccessRule;
use crate::command::Status;
use crate::config::SessionConfig;
use crate::error::{ServerError, ServerResult, SessionPhase};
use crate::framing::LineFramer;
use crate::protocol::MuninProtocol;
use crate::response::{write_all, write_lines};

/// State of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Connection accepted, remote address not yet checked.
    Accepted,
    /// Remote address passed the access rule.
    Authorized,
    /// Greeting banner written.
    BannerSent,
    /// Commands are being served.
    Active,
    /// The session is shutting down.
    Closing,
    /// The socket is closed.
    Closed,
}

impl SessionState {
    /// Check if commands may be served in this state.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if the session has finished.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Accepted => "accepted",
            Self::Authorized => "authorized",
            Self::BannerSent => "banner-sent",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Derives a session id from the endpoints and accept time.
///
/// The id only correlates log lines and callbacks; it is not a secret.
#[must_use]
pub fn derive_session_id(local: SocketAddr, remote: SocketAddr, accepted_at: DateTime<Utc>) -> String {
    let identity = format!("{local}\n{remote}\n{}", accepted_at.to_rfc3339());
    BASE64.encode(Sha256::digest(identity.as_bytes()))
}

/// Bookkeeping for one accepted connection.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    local: SocketAddr,
    remote: SocketAddr,
    accepted_at: DateTime<Utc>,
    state: SessionState,
}

impl Session {
    /// Create a session for a connection accepted now.
    #[must_use]
    pub fn new(local: SocketAddr, remote: SocketAddr) -> Self {
        let accepted_at = Utc::now();
        Self {
            id: derive_session_id(local, remote, accepted_at),
            local,
            remote,
            accepted_at,
            state: SessionState::Accepted,
        }
    }

    /// The session id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The local endpoint.
    #[must_use]
    pub const fn local(&self) -> SocketAddr {
        self.local
    }

    /// The remote endpoint.
    #[must_use]
    pub const fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// When the connection was accepted.
    #[must_use]
    pub const fn accepted_at(&self) -> DateTime<Utc> {
        self.accepted_at
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!(
            remote = %self.remote,
            from = %self.state,
            to = %next,
            "session state change"
        );
        self.state = next;
    }
}

/// Runs sessions: access check, banner, callbacks and the command pumps.
pub struct SessionManager {
    protocol: Arc<MuninProtocol>,
    access: Arc<dyn AccessRule>,
    config: SessionConfig,
}

impl SessionManager {
    /// Create a session manager.
    #[must_use]
    pub fn new(
        protocol: Arc<MuninProtocol>,
        access: Arc<dyn AccessRule>,
        config: SessionConfig,
    ) -> Self {
        Self {
            protocol,
            access,
            config,
        }
    }

    /// The protocol engine.
    #[must_use]
    pub fn protocol(&self) -> &Arc<MuninProtocol> {
        &self.protocol
    }

    /// Serves an accepted TCP connection until it closes.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Cancelled` if `cancel` fired. Every other failure
    /// is logged and ends only this session.
    pub async fn handle_connection(
        &self,
        stream: TcpStream,
        remote: SocketAddr,
        cancel: &CancellationToken,
    ) -> ServerResult<()> {
        let local = match stream.local_addr() {
            Ok(local) => local,
            Err(e) => {
                warn!(remote = %remote, error = %e, "cannot determine local endpoint");
                return Ok(());
            }
        };

        let (reader, writer) = stream.into_split();
        self.run(reader, writer, local, remote, cancel).await
    }

    /// Serves one session over an arbitrary byte stream.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Cancelled` if `cancel` fired. Every other failure
    /// is logged and ends only this session.
    pub async fn run<R, W>(
        &self,
        reader: R,
        mut writer: W,
        local: SocketAddr,
        remote: SocketAddr,
        cancel: &CancellationToken,
    ) -> ServerResult<()>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let mut session = Session::new(local, remote);

        if !self.access.is_acceptable(&remote) {
            warn!(remote = %remote, "access refused");
            session.transition(SessionState::Closing);
            session.transition(SessionState::Closed);
            return Ok(());
        }
        session.transition(SessionState::Authorized);

        if cancel.is_cancelled() {
            return Err(ServerError::Cancelled);
        }

        debug!(remote = %remote, "sending banner");
        let banner = self.protocol.banner();
        if let Err(e) = write_all(&mut writer, banner.as_bytes(), SessionPhase::Banner, cancel).await {
            session.transition(SessionState::Closing);
            let outcome = if cancel.is_cancelled() {
                Err(ServerError::Cancelled)
            } else {
                if e.is_expected_disconnect() {
                    warn!(remote = %remote, error = %e, "client closed session while sending banner");
                } else {
                    error!(remote = %remote, error = %e, "unexpected error while sending banner");
                }
                Ok(())
            };
            session.transition(SessionState::Closed);
            return outcome;
        }
        session.transition(SessionState::BannerSent);

        info!(remote = %remote, session_id = %session.id(), "session started");

        let served = match self.protocol.session_started(session.id(), cancel).await {
            Ok(()) => {
                session.transition(SessionState::Active);
                self.serve(reader, &mut writer, remote, cancel).await
            }
            Err(e) => Err(e),
        };

        session.transition(SessionState::Closing);

        if let Err(e) = self.protocol.session_closed(session.id(), cancel).await {
            error!(remote = %remote, session_id = %session.id(), error = %e, "session close callback failed");
        }

        if let Err(e) = writer.shutdown().await {
            debug!(remote = %remote, error = %e, "socket shutdown failed");
        }
        drop(writer);
        session.transition(SessionState::Closed);

        info!(remote = %remote, session_id = %session.id(), "session closed");

        if cancel.is_cancelled() {
            info!(remote = %remote, "session cancelled");
            return Err(ServerError::Cancelled);
        }

        if let Err(e) = served {
            log_session_error(remote, &e);
        }
        Ok(())
    }

    /// Runs the receive and process pumps until both finish.
    async fn serve<R, W>(
        &self,
        reader: R,
        writer: &mut W,
        remote: SocketAddr,
        cancel: &CancellationToken,
    ) -> ServerResult<()>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let session_cancel = cancel.child_token();
        let (tx, rx) = mpsc::channel::<Bytes>(self.config.max_pending_chunks);

        let receive = async {
            let result = receive_pump(reader, tx, self.config.read_chunk_size, remote, &session_cancel).await;
            if result.is_err() {
                session_cancel.cancel();
            }
            result
        };

        let process = async {
            let result = self.process_pump(rx, writer, remote, &session_cancel).await;
            session_cancel.cancel();
            result
        };

        let (received, processed) = tokio::join!(receive, process);

        if cancel.is_cancelled() {
            return Err(ServerError::Cancelled);
        }

        // The pump that failed first cancelled the other one. A plugin that
        // reports cancellation while the server runs has failed the command.
        match (processed, received) {
            (Err(e), _) if !e.is_cancelled() => Err(e),
            (_, Err(e)) if !e.is_cancelled() => Err(e),
            (Err(e @ ServerError::Plugin(_)), _) => Err(e),
            (Ok(Status::Quit), _) => {
                debug!(remote = %remote, "session ended by quit");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Frames received bytes into lines and answers each command in order.
    ///
    /// Returns `Status::Quit` on `quit`, `Status::Continue` once the receive
    /// pump has finished and every complete line was answered.
    async fn process_pump<W>(
        &self,
        mut rx: mpsc::Receiver<Bytes>,
        writer: &mut W,
        remote: SocketAddr,
        cancel: &CancellationToken,
    ) -> ServerResult<Status>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut framer = LineFramer::new();
        let mut pending = BytesMut::new();

        loop {
            if cancel.is_cancelled() {
                return Err(ServerError::Cancelled);
            }

            let chunk = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ServerError::Cancelled),
                chunk = rx.recv() => chunk,
            };
            let Some(chunk) = chunk else {
                if !pending.is_empty() {
                    debug!(remote = %remote, bytes = pending.len(), "discarding unterminated line");
                }
                return Ok(Status::Continue);
            };
            pending.extend_from_slice(&chunk);

            while let Some(line) = framer.next_line(&mut pending) {
                if cancel.is_cancelled() {
                    return Err(ServerError::Cancelled);
                }

                debug!(remote = %remote, line = %String::from_utf8_lossy(&line), "command received");
                let result = self.protocol.handle_command(&line, cancel).await?;
                if result.is_quit() {
                    return Ok(Status::Quit);
                }

                write_lines(writer, &result.lines, cancel).await?;
            }
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("protocol", &self.protocol)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Reads socket bytes in chunks of at least `chunk_size` into `tx`.
///
/// Stops at EOF, on an expected disconnect, when the processor is gone, or
/// on cancellation. A full channel suspends reading.
async fn receive_pump<R>(
    mut reader: R,
    tx: mpsc::Sender<Bytes>,
    chunk_size: usize,
    remote: SocketAddr,
    cancel: &CancellationToken,
) -> ServerResult<()>
where
    R: AsyncRead + Unpin + Send,
{
    let mut buf = BytesMut::with_capacity(chunk_size);

    loop {
        if cancel.is_cancelled() {
            return Err(ServerError::Cancelled);
        }

        buf.reserve(chunk_size);
        let read = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ServerError::Cancelled),
            read = reader.read_buf(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                debug!(remote = %remote, "peer closed connection");
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => {
                let err = ServerError::transport(SessionPhase::Receiving, e);
                if err.is_expected_disconnect() {
                    info!(remote = %remote, error = %err, "expected socket error");
                    return Ok(());
                }
                return Err(err);
            }
        }

        let chunk = buf.split().freeze();
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ServerError::Cancelled),
            sent = tx.send(chunk) => {
                if sent.is_err() {
                    return Ok(());
                }
            }
        }
    }
}

fn log_session_error(remote: SocketAddr, err: &ServerError) {
    if err.is_expected_disconnect() {
        info!(remote = %remote, error = %err, "client disconnected");
    } else if let ServerError::Transport { phase, .. } = err {
        error!(remote = %remote, phase = %phase, error = %err, "unexpected transport error");
    } else {
        error!(
            remote = %remote,
            phase = %SessionPhase::Processing,
            error = %err,
            "unexpected error while processing command"
        );
    }
}
