//! Command matching and dispatch.
//!
//! A command line is `<name>` or `<name> <arguments>`; everything after the
//! first space is passed to the command verbatim. `quit` and `.` are checked
//! before any registered command and end the session.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ServerResult;

/// Name of the command that ends a session.
pub const QUIT_COMMAND: &str = "quit";

/// One-byte shorthand for [`QUIT_COMMAND`].
pub const QUIT_SHORTHAND: &str = ".";

/// What the session does after a command's response is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Keep reading commands.
    Continue,
    /// Close the connection without sending anything further.
    Quit,
}

/// Outcome of a command: response lines and the next session step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Response lines, without terminators.
    pub lines: Vec<String>,
    /// Whether the session continues.
    pub status: Status,
}

impl CommandResult {
    /// A response after which the session continues.
    #[must_use]
    pub const fn continue_with(lines: Vec<String>) -> Self {
        Self {
            lines,
            status: Status::Continue,
        }
    }

    /// An empty response that ends the session.
    #[must_use]
    pub const fn quit() -> Self {
        Self {
            lines: Vec::new(),
            status: Status::Quit,
        }
    }

    /// Returns true if the session should end.
    #[must_use]
    pub fn is_quit(&self) -> bool {
        self.status == Status::Quit
    }
}

/// Future returned by [`Command::process`].
pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = ServerResult<CommandResult>> + Send + 'a>>;

/// A protocol command.
pub trait Command: Send + Sync {
    /// The token that selects this command.
    fn name(&self) -> &str;

    /// Runs the command with the raw argument text.
    fn process<'a>(&'a self, args: &'a str, cancel: &'a CancellationToken) -> CommandFuture<'a>;
}

/// Matches `line` against a command name.
///
/// Returns the argument text on a match: empty when the line is exactly the
/// name, otherwise everything after the single separating space.
#[must_use]
pub fn match_command<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix(' ')
    }
}

/// Returns true for `quit` (with or without arguments) and `.`.
#[must_use]
pub fn is_quit_line(line: &str) -> bool {
    line == QUIT_SHORTHAND || match_command(line, QUIT_COMMAND).is_some()
}

/// Ordered command table with a fallback.
pub struct CommandRegistry {
    commands: Vec<Arc<dyn Command>>,
    fallback: Arc<dyn Command>,
}

impl CommandRegistry {
    /// Creates an empty registry answering every line with `fallback`.
    #[must_use]
    pub fn new(fallback: Arc<dyn Command>) -> Self {
        Self {
            commands: Vec::new(),
            fallback,
        }
    }

    /// Adds a command. Earlier registrations are matched first.
    #[must_use]
    pub fn with_command(mut self, command: Arc<dyn Command>) -> Self {
        self.commands.push(command);
        self
    }

    /// Names of the registered commands, in matching order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|c| c.name())
    }

    /// Runs the command selected by `line`.
    ///
    /// # Errors
    ///
    /// Returns the selected command's error.
    pub async fn dispatch(
        &self,
        line: &str,
        cancel: &CancellationToken,
    ) -> ServerResult<CommandResult> {
        if is_quit_line(line) {
            debug!("quit requested");
            return Ok(CommandResult::quit());
        }

        for command in &self.commands {
            if let Some(args) = match_command(line, command.name()) {
                debug!(command = command.name(), args, "dispatching command");
                return command.process(args, cancel).await;
            }
        }

        debug!(line, "no matching command");
        self.fallback.process("", cancel).await
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names().collect::<Vec<_>>())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}
