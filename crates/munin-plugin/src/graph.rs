//! Graph-level attributes of a plugin (`graph_*` lines of a config block).

use std::fmt;
use std::time::Duration;

use crate::types::FieldName;

/// Well-known values for `graph_category`.
pub mod category {
    /// Per-second sampled graphs.
    pub const ONE_SEC: &str = "1sec";
    /// Antivirus tools.
    pub const ANTIVIRUS: &str = "antivirus";
    /// Application servers.
    pub const APPSERVER: &str = "appserver";
    /// Authentication servers and services.
    pub const AUTH: &str = "auth";
    /// Backup creation.
    pub const BACKUP: &str = "backup";
    /// Messaging servers.
    pub const CHAT: &str = "chat";
    /// Cloud providers and components.
    pub const CLOUD: &str = "cloud";
    /// Content management systems.
    pub const CMS: &str = "cms";
    /// CPU measurements.
    pub const CPU: &str = "cpu";
    /// Database servers.
    pub const DB: &str = "db";
    /// Development tools.
    pub const DEVEL: &str = "devel";
    /// Disk and storage measurements.
    pub const DISK: &str = "disk";
    /// Domain name servers.
    pub const DNS: &str = "dns";
    /// File transfer tools and servers.
    pub const FILETRANSFER: &str = "filetransfer";
    /// Forum applications.
    pub const FORUM: &str = "forum";
    /// Filesystem activity.
    pub const FS: &str = "fs";
    /// Network filtering.
    pub const FW: &str = "fw";
    /// Game servers.
    pub const GAMES: &str = "games";
    /// High-throughput computing.
    pub const HTC: &str = "htc";
    /// Load balancers and proxies.
    pub const LOADBALANCER: &str = "loadbalancer";
    /// Mail throughput and queues.
    pub const MAIL: &str = "mail";
    /// List servers.
    pub const MAILINGLIST: &str = "mailinglist";
    /// Memory measurements.
    pub const MEMORY: &str = "memory";
    /// Monitoring the monitoring.
    pub const MUNIN: &str = "munin";
    /// General networking metrics.
    pub const NETWORK: &str = "network";
    /// Default category for plugins that declare none.
    pub const OTHER: &str = "other";
    /// Printers and print jobs.
    pub const PRINTING: &str = "printing";
    /// Process and kernel measurements.
    pub const PROCESSES: &str = "processes";
    /// Receivers and signal quality.
    pub const RADIO: &str = "radio";
    /// Storage area networks.
    pub const SAN: &str = "san";
    /// Search engines.
    pub const SEARCH: &str = "search";
    /// Security information.
    pub const SECURITY: &str = "security";
    /// Device and environment sensors.
    pub const SENSORS: &str = "sensors";
    /// Spam filters.
    pub const SPAMFILTER: &str = "spamfilter";
    /// Streaming servers.
    pub const STREAMING: &str = "streaming";
    /// General operating system metrics.
    pub const SYSTEM: &str = "system";
    /// Time synchronization.
    pub const TIME: &str = "time";
    /// Video devices and servers.
    pub const TV: &str = "tv";
    /// Virtualization.
    pub const VIRTUALIZATION: &str = "virtualization";
    /// Voice over IP servers.
    pub const VOIP: &str = "voip";
    /// Web servers and caches.
    pub const WEBSERVER: &str = "webserver";
    /// Wiki applications.
    pub const WIKI: &str = "wiki";
    /// Wireless networks.
    pub const WIRELESS: &str = "wireless";
}

/// Unit of time used for rate (`DERIVE`/`COUNTER`) graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphPeriod {
    /// Per second.
    Second,
    /// Per minute.
    Minute,
    /// Per hour.
    Hour,
}

impl fmt::Display for GraphPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
        };
        f.write_str(s)
    }
}

/// Rendering metadata for the aggregate graph of a plugin's fields.
///
/// Every attribute except the title is optional; unset attributes are not
/// emitted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphAttributes {
    /// `graph_title`.
    pub title: String,
    /// `graph_category`.
    pub category: Option<String>,
    /// `graph_vlabel`.
    pub vertical_label: Option<String>,
    /// `graph_scale`.
    pub scale: Option<bool>,
    /// `graph_args`, passed through to the renderer.
    pub arguments: Option<String>,
    /// `graph_period`.
    pub period: Option<GraphPeriod>,
    /// `update_rate`.
    pub update_rate: Option<Duration>,
    /// `graph_width` in pixels.
    pub width: Option<u32>,
    /// `graph_height` in pixels.
    pub height: Option<u32>,
    /// `graph_order`.
    pub order: Vec<FieldName>,
    /// `graph_total`, the label of a summary line.
    pub total_label: Option<String>,
}

impl GraphAttributes {
    /// Creates graph attributes with the given title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets the vertical axis label.
    #[must_use]
    pub fn with_vertical_label(mut self, label: impl Into<String>) -> Self {
        self.vertical_label = Some(label.into());
        self
    }

    /// Sets whether values are scaled with SI prefixes.
    #[must_use]
    pub const fn with_scale(mut self, scale: bool) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Sets the renderer arguments.
    #[must_use]
    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = Some(arguments.into());
        self
    }

    /// Sets the rate period.
    #[must_use]
    pub const fn with_period(mut self, period: GraphPeriod) -> Self {
        self.period = Some(period);
        self
    }

    /// Sets the update rate.
    #[must_use]
    pub const fn with_update_rate(mut self, rate: Duration) -> Self {
        self.update_rate = Some(rate);
        self
    }

    /// Sets the graph size in pixels.
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Sets the drawing order of fields.
    #[must_use]
    pub fn with_order(mut self, order: Vec<FieldName>) -> Self {
        self.order = order;
        self
    }

    /// Sets the label of the summary line.
    #[must_use]
    pub fn with_total_label(mut self, label: impl Into<String>) -> Self {
        self.total_label = Some(label.into());
        self
    }

    /// Renders one `graph_<attr> <value>` line per set attribute.
    #[must_use]
    pub fn attribute_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(6);

        if !self.title.is_empty() {
            lines.push(format!("graph_title {}", self.title));
        }
        if let Some(category) = &self.category {
            lines.push(format!("graph_category {category}"));
        }
        if let Some(label) = &self.vertical_label {
            lines.push(format!("graph_vlabel {label}"));
        }
        if let Some(scale) = self.scale {
            lines.push(format!("graph_scale {}", if scale { "yes" } else { "no" }));
        }
        if let Some(arguments) = &self.arguments {
            lines.push(format!("graph_args {arguments}"));
        }
        if let Some(period) = self.period {
            lines.push(format!("graph_period {period}"));
        }
        if let Some(rate) = self.update_rate {
            lines.push(format!("update_rate {}", rate.as_secs()));
        }
        if let Some(width) = self.width {
            lines.push(format!("graph_width {width}"));
        }
        if let Some(height) = self.height {
            lines.push(format!("graph_height {height}"));
        }
        if !self.order.is_empty() {
            let order: Vec<&str> = self.order.iter().map(FieldName::as_str).collect();
            lines.push(format!("graph_order {}", order.join(" ")));
        }
        if let Some(total) = &self.total_label {
            lines.push(format!("graph_total {total}"));
        }

        lines
    }
}
