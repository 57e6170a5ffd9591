//! Alert delivery channels.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use riskdesk_core::{AlertPayload, Notifier, Result, RiskError, Urgency};

/// Writes alerts to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &AlertPayload) -> Result<()> {
        let suggestions = alert.suggestions.join("; ");
        match alert.urgency {
            Urgency::Red | Urgency::Yellow => warn!(
                title = %alert.title,
                urgency = ?alert.urgency,
                %suggestions,
                "{}",
                alert.body
            ),
            Urgency::Green | Urgency::Info => info!(
                title = %alert.title,
                urgency = ?alert.urgency,
                %suggestions,
                "{}",
                alert.body
            ),
        }
        Ok(())
    }
}

/// POSTs alerts as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: String,
    timeout: Duration,
}

impl WebhookNotifier {
    /// # Errors
    /// Returns `Config` if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RiskError::Config(format!("failed to build webhook client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            timeout,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &AlertPayload) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .json(alert)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RiskError::timeout("notify", self.timeout)
                } else {
                    RiskError::collaborator("notify", e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RiskError::collaborator(
                "notify",
                format!("webhook returned {}: {text}", status.as_u16()),
            ));
        }
        tracing::debug!(url = %self.url, title = %alert.title, "Alert delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert() -> AlertPayload {
        AlertPayload {
            title: "Risk alert U1: neutral_volatility".to_string(),
            body: "vega -8000 vs limit -4800".to_string(),
            urgency: Urgency::Red,
            suggestions: vec!["#1 [7] BUY 4 SPX 4800P 2026-11-20 (score 0.6123)".to_string()],
        }
    }

    #[tokio::test]
    async fn posts_payload_as_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/risk"))
            .and(body_json(serde_json::json!({
                "title": "Risk alert U1: neutral_volatility",
                "body": "vega -8000 vs limit -4800",
                "urgency": "red",
                "suggestions": ["#1 [7] BUY 4 SPX 4800P 2026-11-20 (score 0.6123)"]
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier =
            WebhookNotifier::new(format!("{}/hooks/risk", server.uri()), Duration::from_secs(5))
                .unwrap();
        notifier.notify(&alert()).await.unwrap();
    }

    #[tokio::test]
    async fn server_error_is_collaborator_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = notifier.notify(&alert()).await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn slow_webhook_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(server.uri(), Duration::from_millis(50)).unwrap();
        let err = notifier.notify(&alert()).await.unwrap_err();
        assert!(matches!(err, RiskError::CollaboratorTimeout { .. }));
    }

    #[tokio::test]
    async fn log_notifier_never_fails() {
        LogNotifier.notify(&alert()).await.unwrap();
    }
}
