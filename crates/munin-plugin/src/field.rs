//! Fields: one time series within a plugin.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::error::{PluginError, PluginResult};
use crate::types::{format_value, validate_label, FieldName, GraphStyle, ValueRange};

/// Future returned by [`Field::fetch_value`].
pub type ValueFuture<'a> = Pin<Box<dyn Future<Output = PluginResult<Option<f64>>> + Send + 'a>>;

/// Display and alerting attributes of a field (`{fieldname}.*` lines).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAttributes {
    name: FieldName,
    label: String,
    graph_style: GraphStyle,
    warning: ValueRange,
    critical: ValueRange,
    negative: Option<FieldName>,
}

impl FieldAttributes {
    /// Creates attributes with the given name and label, default style and no ranges.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::InvalidLabel` if the label is empty or contains `#` or `\`.
    pub fn new(name: FieldName, label: impl Into<String>) -> PluginResult<Self> {
        let label = label.into();
        validate_label(&label)?;

        Ok(Self {
            name,
            label,
            graph_style: GraphStyle::default(),
            warning: ValueRange::NONE,
            critical: ValueRange::NONE,
            negative: None,
        })
    }

    /// Sets the draw style.
    #[must_use]
    pub const fn with_graph_style(mut self, style: GraphStyle) -> Self {
        self.graph_style = style;
        self
    }

    /// Sets the normal range outside of which a warning is raised.
    #[must_use]
    pub const fn with_warning(mut self, range: ValueRange) -> Self {
        self.warning = range;
        self
    }

    /// Sets the normal range outside of which a critical alert is raised.
    #[must_use]
    pub const fn with_critical(mut self, range: ValueRange) -> Self {
        self.critical = range;
        self
    }

    /// Draws `field` as the negative side of this field.
    ///
    /// The referenced field is then not graphed on its own.
    #[must_use]
    pub fn with_negative(mut self, field: FieldName) -> Self {
        self.negative = Some(field);
        self
    }

    /// The field name.
    #[must_use]
    pub const fn name(&self) -> &FieldName {
        &self.name
    }

    /// The field label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The draw style.
    #[must_use]
    pub const fn graph_style(&self) -> GraphStyle {
        self.graph_style
    }

    /// The warning range.
    #[must_use]
    pub const fn warning(&self) -> &ValueRange {
        &self.warning
    }

    /// The critical range.
    #[must_use]
    pub const fn critical(&self) -> &ValueRange {
        &self.critical
    }

    /// The field drawn as this field's negative side, if any.
    #[must_use]
    pub const fn negative(&self) -> Option<&FieldName> {
        self.negative.as_ref()
    }
}

/// A single time series exposed by a plugin.
pub trait Field: Send + Sync {
    /// The attributes emitted by `config`.
    fn attributes(&self) -> &FieldAttributes;

    /// Produces the current sample. `Ok(None)` means the value is unknown.
    fn fetch_value<'a>(&'a self, cancel: &'a CancellationToken) -> ValueFuture<'a>;

    /// The field name.
    fn name(&self) -> &str {
        self.attributes().name().as_str()
    }
}

/// Fetches a field's sample and renders it for a `.value` line.
///
/// # Errors
///
/// Returns `PluginError::Cancelled` if `cancel` fired before the fetch, or the
/// field's own fetch error.
pub async fn fetch_formatted(field: &dyn Field, cancel: &CancellationToken) -> PluginResult<String> {
    if cancel.is_cancelled() {
        return Err(PluginError::Cancelled);
    }
    let value = field.fetch_value(cancel).await?;
    Ok(format_value(value))
}

/// A field whose value comes from a synchronous closure.
pub struct FnField<F> {
    attributes: FieldAttributes,
    fetch: F,
}

impl<F> FnField<F>
where
    F: Fn() -> Option<f64> + Send + Sync,
{
    /// Creates a field reading its value from `fetch`.
    pub const fn new(attributes: FieldAttributes, fetch: F) -> Self {
        Self { attributes, fetch }
    }
}

impl<F> Field for FnField<F>
where
    F: Fn() -> Option<f64> + Send + Sync,
{
    fn attributes(&self) -> &FieldAttributes {
        &self.attributes
    }

    fn fetch_value<'a>(&'a self, _cancel: &'a CancellationToken) -> ValueFuture<'a> {
        let value = (self.fetch)();
        Box::pin(async move { Ok(value) })
    }
}

impl<F> fmt::Debug for FnField<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnField")
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}
