//! Error types for the munin-plugin crate.

use thiserror::Error;

/// Errors that can occur while building or querying plugins.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The field name does not match `[a-zA-Z_][a-zA-Z0-9_]*`.
    #[error("invalid field name '{name}': {reason}")]
    InvalidFieldName {
        /// The rejected name.
        name: String,
        /// The reason the name is invalid.
        reason: String,
    },

    /// The field label is empty or contains `#` or `\`.
    #[error("invalid field label '{label}': {reason}")]
    InvalidLabel {
        /// The rejected label.
        label: String,
        /// The reason the label is invalid.
        reason: String,
    },

    /// A plugin was constructed without a name.
    #[error("plugin name cannot be empty")]
    EmptyPluginName,

    /// Two fields of one plugin share a name.
    #[error("duplicate field '{field}' in plugin '{plugin}'")]
    DuplicateField {
        /// The plugin being built.
        plugin: String,
        /// The repeated field name.
        field: String,
    },

    /// Producing a field value failed.
    #[error("failed to fetch value of field '{field}': {reason}")]
    FetchFailed {
        /// The field whose value was requested.
        field: String,
        /// The reason the fetch failed.
        reason: String,
    },

    /// A session start/end callback failed.
    #[error("session callback failed: {0}")]
    Callback(String),

    /// The operation observed cancellation.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type for plugin operations.
pub type PluginResult<T> = std::result::Result<T, PluginError>;
