//! Core value types shared by fields and graphs.
//!
//! - [`GraphStyle`]: how a field is drawn (`{fieldname}.draw`)
//! - [`ValueRange`]: a warning/critical range with optional bounds
//! - [`FieldName`]: a validated field name
//! - [`format_value`]: protocol rendering of a fetched sample

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{PluginError, PluginResult};

/// Token emitted for a sample that could not be produced.
pub const UNKNOWN_VALUE: &str = "U";

static VALID_FIELD_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap_or_else(|_| unreachable!())
});

static INVALID_NAME_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9_]+").unwrap_or_else(|_| unreachable!()));

static INVALID_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_]").unwrap_or_else(|_| unreachable!()));

/// The style used to draw a field on its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GraphStyle {
    /// Leave the choice to the renderer; no `.draw` line is emitted.
    #[default]
    Default,
    /// `AREA`
    Area,
    /// `STACK`
    Stack,
    /// `AREASTACK`
    AreaStack,
    /// `LINE`
    Line,
    /// `LINE1`
    LineWidth1,
    /// `LINE2`
    LineWidth2,
    /// `LINE3`
    LineWidth3,
    /// `LINESTACK`
    LineStack,
    /// `LINE1STACK`
    LineStackWidth1,
    /// `LINE2STACK`
    LineStackWidth2,
    /// `LINE3STACK`
    LineStackWidth3,
}

impl GraphStyle {
    /// The `{fieldname}.draw` token, or `None` for [`GraphStyle::Default`].
    #[must_use]
    pub const fn draw_token(self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::Area => Some("AREA"),
            Self::Stack => Some("STACK"),
            Self::AreaStack => Some("AREASTACK"),
            Self::Line => Some("LINE"),
            Self::LineWidth1 => Some("LINE1"),
            Self::LineWidth2 => Some("LINE2"),
            Self::LineWidth3 => Some("LINE3"),
            Self::LineStack => Some("LINESTACK"),
            Self::LineStackWidth1 => Some("LINE1STACK"),
            Self::LineStackWidth2 => Some("LINE2STACK"),
            Self::LineStackWidth3 => Some("LINE3STACK"),
        }
    }
}

/// Range of normal values for a `warning` or `critical` attribute.
///
/// Bounds are not cross-checked: `min <= max` is the caller's concern.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ValueRange {
    /// Lower bound, if any.
    pub min: Option<f64>,
    /// Upper bound, if any.
    pub max: Option<f64>,
}

impl ValueRange {
    /// A range with neither bound; renders to nothing.
    pub const NONE: Self = Self {
        min: None,
        max: None,
    };

    /// Creates a range bounded on both sides.
    #[must_use]
    pub const fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Creates a range with only a lower bound.
    #[must_use]
    pub const fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// Creates a range with only an upper bound.
    #[must_use]
    pub const fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// Returns true if at least one bound is set.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// Renders the range as `min:max`, `min:` or `:max`.
    ///
    /// Returns `None` when neither bound is present.
    #[must_use]
    pub fn to_protocol_string(&self) -> Option<String> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some(format!("{}:{}", format_number(min), format_number(max))),
            (Some(min), None) => Some(format!("{}:", format_number(min))),
            (None, Some(max)) => Some(format!(":{}", format_number(max))),
            (None, None) => None,
        }
    }
}

/// A validated field name.
///
/// Field names must match `[a-zA-Z_][a-zA-Z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldName(String);

impl FieldName {
    /// Creates a new validated field name.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::InvalidFieldName` if the name is empty or contains
    /// characters outside the allowed set.
    pub fn new(name: impl Into<String>) -> PluginResult<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(PluginError::InvalidFieldName {
                name,
                reason: "field name cannot be empty".to_string(),
            });
        }

        if !VALID_FIELD_NAME.is_match(&name) {
            return Err(PluginError::InvalidFieldName {
                name,
                reason: "must match [a-zA-Z_][a-zA-Z0-9_]*".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Derives a field name from a label.
    ///
    /// Strips a leading run of digits and underscores, then drops every
    /// character outside `[a-zA-Z0-9_]`.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::InvalidFieldName` if nothing usable remains.
    pub fn from_label(label: &str) -> PluginResult<Self> {
        let without_prefix = INVALID_NAME_PREFIX.replace(label, "");
        let cleaned = INVALID_NAME_CHARS.replace_all(&without_prefix, "");
        Self::new(cleaned.into_owned())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FieldName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Checks a `{fieldname}.label` value: non-empty, no `#` and no `\`.
///
/// # Errors
///
/// Returns `PluginError::InvalidLabel` describing the first violation.
pub fn validate_label(label: &str) -> PluginResult<()> {
    if label.is_empty() {
        return Err(PluginError::InvalidLabel {
            label: label.to_string(),
            reason: "label cannot be empty".to_string(),
        });
    }

    if let Some(c) = label.chars().find(|c| matches!(c, '#' | '\\')) {
        return Err(PluginError::InvalidLabel {
            label: label.to_string(),
            reason: format!("invalid character '{c}' in label"),
        });
    }

    Ok(())
}

/// Formats a number using the locale-independent shortest representation.
#[must_use]
pub fn format_number(value: f64) -> String {
    value.to_string()
}

/// Renders a fetched sample for a `{fieldname}.value` line.
///
/// Missing and non-finite samples render as [`UNKNOWN_VALUE`].
#[must_use]
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format_number(v),
        _ => UNKNOWN_VALUE.to_string(),
    }
}
