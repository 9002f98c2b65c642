//! Fire-and-forget alert delivery.
//!
//! Notifiers are called from ancillary failure paths. [`Notifier::notify`]
//! is synchronous, must return promptly and must never fail; transports that
//! do I/O hand the alert to a background task.

#[cfg(feature = "webhook")]
mod teams;

#[cfg(feature = "webhook")]
pub use teams::TeamsWebhookNotifier;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

/// How urgent an alert is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Informational.
    Info,
    /// Degraded but running.
    Warning,
    /// Needs attention.
    Critical,
}

impl AlertSeverity {
    /// Hex theme color used by card-based transports.
    #[must_use]
    pub fn theme_color(&self) -> &'static str {
        match self {
            Self::Info => "00FF00",
            Self::Warning => "FFA500",
            Self::Critical => "FF0000",
        }
    }
}

impl Default for AlertSeverity {
    fn default() -> Self {
        Self::Warning
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// A message for humans watching the pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Destination channel.
    pub channel: String,
    /// One-line headline.
    pub title: String,
    /// Body text.
    pub text: String,
    /// Urgency.
    pub severity: AlertSeverity,
}

impl Alert {
    /// Creates a warning-level alert.
    #[must_use]
    pub fn new(channel: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            title: title.into(),
            text: text.into(),
            severity: AlertSeverity::default(),
        }
    }

    /// Sets the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: AlertSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Delivers alerts.
pub trait Notifier: Send + Sync {
    /// Hands `alert` to the transport. Never blocks, never fails.
    fn notify(&self, alert: Alert);
}

/// A notifier that discards all alerts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotifier;

impl Notifier for NoOpNotifier {
    fn notify(&self, _alert: Alert) {}
}

/// A notifier that writes alerts to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, alert: Alert) {
        match alert.severity {
            AlertSeverity::Info => info!(channel = %alert.channel, title = %alert.title, text = %alert.text, "Alert"),
            AlertSeverity::Warning => {
                warn!(channel = %alert.channel, title = %alert.title, text = %alert.text, "Alert");
            }
            AlertSeverity::Critical => {
                error!(channel = %alert.channel, title = %alert.title, text = %alert.text, "Alert");
            }
        }
    }
}

/// A collecting notifier for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    alerts: parking_lot::RwLock<Vec<Alert>>,
}

impl CollectingNotifier {
    /// Creates a new collecting notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected alerts.
    #[must_use]
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.read().clone()
    }

    /// Returns the number of collected alerts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alerts.read().len()
    }

    /// Returns true if no alerts have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alerts.read().is_empty()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, alert: Alert) {
        self.alerts.write().push(alert);
    }
}
