//! Notification delivery: an HTTP mail relay, or the log.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use triage::adapters::{AdapterError, AdapterResult, Mail, Notifier};

use crate::config::MailConfig;

const DEPENDENCY: &str = "mail relay";

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// POSTs each mail as JSON to a relay that speaks SMTP on our behalf.
pub struct RelayNotifier {
    url: String,
    from: String,
    http: reqwest::Client,
}

impl RelayNotifier {
    pub fn new(url: impl Into<String>, config: &MailConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            url: url.into(),
            from: config.from.clone(),
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
        })
    }
}

#[async_trait]
impl Notifier for RelayNotifier {
    async fn deliver(&self, mail: &Mail) -> AdapterResult<()> {
        let message = RelayMessage {
            from: &self.from,
            to: &mail.to,
            subject: &mail.subject,
            body: &mail.body,
        };

        let response = self
            .http
            .post(&self.url)
            .header("Idempotency-Key", &mail.idempotency_key)
            .json(&message)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::timeout(DEPENDENCY)
                } else {
                    AdapterError::unavailable(DEPENDENCY, e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("HTTP {}: {}", status, body);
            return Err(if is_permanent(status) {
                AdapterError::rejected(DEPENDENCY, message)
            } else {
                AdapterError::unavailable(DEPENDENCY, message)
            });
        }

        debug!(to = %mail.to, key = %mail.idempotency_key, "Mail relayed");
        Ok(())
    }
}

/// A 4xx other than timeout and throttling will not change on retry.
fn is_permanent(status: reqwest::StatusCode) -> bool {
    status.is_client_error()
        && status != reqwest::StatusCode::REQUEST_TIMEOUT
        && status != reqwest::StatusCode::TOO_MANY_REQUESTS
}

/// Logs mail instead of sending it.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, mail: &Mail) -> AdapterResult<()> {
        info!(
            to = %mail.to,
            subject = %mail.subject,
            key = %mail.idempotency_key,
            body = %mail.body,
            "Mail (dry run)"
        );
        Ok(())
    }
}
