//! Microsoft Teams incoming-webhook transport.

use super::{Alert, Notifier};
use serde_json::json;
use tracing::{debug, warn};

/// Posts alerts to a Teams incoming webhook as a `MessageCard`.
///
/// Each alert is sent on a spawned tokio task. Outside a tokio runtime the
/// alert is logged and dropped.
#[derive(Debug, Clone)]
pub struct TeamsWebhookNotifier {
    client: reqwest::Client,
    webhook_url: String,
    markdown: bool,
}

impl TeamsWebhookNotifier {
    /// Creates a notifier posting to `webhook_url`.
    #[must_use]
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            webhook_url: webhook_url.into(),
            markdown: false,
        }
    }

    /// Renders the body as markdown.
    #[must_use]
    pub fn with_markdown(mut self, markdown: bool) -> Self {
        self.markdown = markdown;
        self
    }

    /// Builds the card payload for `alert`.
    #[must_use]
    pub fn card(&self, alert: &Alert) -> serde_json::Value {
        json!({
            "@type": "MessageCard",
            "@context": "http://schema.org/extensions",
            "themeColor": alert.severity.theme_color(),
            "summary": alert.title,
            "title": alert.title,
            "sections": [{ "text": alert.text, "markdown": self.markdown }],
        })
    }
}

impl Notifier for TeamsWebhookNotifier {
    fn notify(&self, alert: Alert) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(title = %alert.title, "No async runtime available; Teams alert dropped");
            return;
        };

        let card = self.card(&alert);
        let client = self.client.clone();
        let url = self.webhook_url.clone();
        handle.spawn(async move {
            match client.post(&url).json(&card).send().await {
                Ok(response) if response.status() == reqwest::StatusCode::OK => {
                    debug!(title = %alert.title, "Teams alert delivered");
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_else(|_| "<unable to read body>".to_string());
                    warn!(status = %status, body = %body, "Teams webhook rejected alert");
                }
                Err(err) => warn!(error = %err, "Teams webhook request failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::AlertSeverity;

    #[test]
    fn test_card_shape() {
        let notifier = TeamsWebhookNotifier::new("http://localhost/hook").with_markdown(true);
        let alert = Alert::new("data-alerts", "Monitor init failed", "sales.orders").with_severity(AlertSeverity::Critical);

        let card = notifier.card(&alert);
        assert_eq!(card["@type"], "MessageCard");
        assert_eq!(card["themeColor"], "FF0000");
        assert_eq!(card["title"], "Monitor init failed");
        assert_eq!(card["sections"][0]["text"], "sales.orders");
        assert_eq!(card["sections"][0]["markdown"], true);
    }

    #[test]
    fn test_notify_outside_runtime_does_not_panic() {
        let notifier = TeamsWebhookNotifier::new("http://localhost/hook");
        notifier.notify(Alert::new("data-alerts", "title", "text"));
    }
}
