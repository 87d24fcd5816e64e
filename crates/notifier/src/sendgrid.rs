//! SendGrid v3 HTTP API adapter.
//!
//! Used as the secondary tier when outbound SMTP is blocked by the network.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

use prize_common::config::Timeouts;

use crate::adapter::{ProviderAdapter, SendReceipt};
use crate::error::{DeliveryError, DeliveryErrorCode, io_error_kind};
use crate::message::EmailMessage;

pub struct SendGridAdapter {
    name: String,
    api_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl SendGridAdapter {
    pub fn new(
        name: impl Into<String>,
        api_url: &str,
        api_key: impl Into<String>,
        timeouts: Timeouts,
    ) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connection)
            .timeout(timeouts.connection + timeouts.greeting + timeouts.socket)
            .build()
            .map_err(|e| DeliveryError::new(DeliveryErrorCode::Transport, e.to_string()))?;

        Ok(Self {
            name: name.into(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    fn payload(message: &EmailMessage) -> serde_json::Value {
        json!({
            "personalizations": [{
                "to": [{ "email": message.to }]
            }],
            "from": {
                "email": message.from.address,
                "name": message.from.name
            },
            "subject": message.subject,
            "content": [
                { "type": "text/plain", "value": message.text_or_subject() },
                { "type": "text/html", "value": message.html }
            ]
        })
    }
}

#[async_trait]
impl ProviderAdapter for SendGridAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    // Every API call authenticates, so a separate pre-flight only adds latency.
    fn requires_preflight(&self) -> bool {
        false
    }

    async fn verify(&self) -> Result<(), DeliveryError> {
        let response = self
            .client
            .get(format!("{}/v3/scopes", self.api_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| classify_request(&e))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(provider = %self.name, "SendGrid API key verified");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }

    async fn send(&self, message: &EmailMessage) -> Result<SendReceipt, DeliveryError> {
        let response = self
            .client
            .post(format!("{}/v3/mail/send", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&Self::payload(message))
            .send()
            .await
            .map_err(|e| classify_request(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| format!("sendgrid-{}", Uuid::new_v4()));

        Ok(SendReceipt {
            message_id,
            provider_name: self.name.clone(),
        })
    }
}

fn status_error(status: StatusCode, body: &str) -> DeliveryError {
    let code = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DeliveryErrorCode::AuthenticationFailed,
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE => DeliveryErrorCode::Rejected,
        _ => DeliveryErrorCode::Transport,
    };
    let mut detail = format!("HTTP {}", status.as_u16());
    let body = body.trim();
    if !body.is_empty() {
        detail.push_str(": ");
        detail.extend(body.chars().take(300));
    }
    DeliveryError::new(code, detail)
}

fn classify_request(err: &reqwest::Error) -> DeliveryError {
    let chain = error_chain(err);
    let lower = chain.to_lowercase();

    let code = if err.is_timeout() {
        DeliveryErrorCode::Timeout
    } else if io_error_kind(err) == Some(std::io::ErrorKind::ConnectionRefused) {
        DeliveryErrorCode::ConnectionRefused
    } else if lower.contains("dns error") || lower.contains("failed to lookup address") {
        DeliveryErrorCode::HostNotFound
    } else if lower.contains("certificate") || lower.contains("tls") {
        DeliveryErrorCode::Tls
    } else {
        DeliveryErrorCode::Transport
    };

    DeliveryError::new(code, chain)
}

/// Render an error and all its sources as one line.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(e) = source {
        parts.push(e.to_string());
        source = e.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Sender;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn timeouts() -> Timeouts {
        Timeouts {
            connection: Duration::from_secs(5),
            greeting: Duration::from_secs(5),
            socket: Duration::from_secs(5),
        }
    }

    fn message() -> EmailMessage {
        EmailMessage {
            from: Sender::new("Glampling", "bot@glampling.com"),
            to: "winner@x.com".into(),
            subject: "You won".into(),
            html: "<p>Tent Upgrade</p>".into(),
            text: Some("Tent Upgrade".into()),
        }
    }

    #[tokio::test]
    async fn test_send_returns_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .and(header("authorization", "Bearer SG.test"))
            .and(body_partial_json(json!({
                "personalizations": [{ "to": [{ "email": "winner@x.com" }] }],
                "from": { "email": "bot@glampling.com", "name": "Glampling" },
                "subject": "You won"
            })))
            .respond_with(ResponseTemplate::new(202).insert_header("x-message-id", "abc123"))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = SendGridAdapter::new("sendgrid", &server.uri(), "SG.test", timeouts()).unwrap();
        let receipt = adapter.send(&message()).await.unwrap();

        assert_eq!(receipt.message_id, "abc123");
        assert_eq!(receipt.provider_name, "sendgrid");
    }

    #[tokio::test]
    async fn test_send_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .respond_with(ResponseTemplate::new(401).set_body_string("{\"errors\":[]}"))
            .mount(&server)
            .await;

        let adapter = SendGridAdapter::new("sendgrid", &server.uri(), "SG.bad", timeouts()).unwrap();
        let err = adapter.send(&message()).await.unwrap_err();

        assert_eq!(err.code, DeliveryErrorCode::AuthenticationFailed);
        assert!(err.detail.starts_with("HTTP 401"));
    }

    #[tokio::test]
    async fn test_send_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let adapter = SendGridAdapter::new("sendgrid", &server.uri(), "SG.x", timeouts()).unwrap();
        let err = adapter.send(&message()).await.unwrap_err();
        assert_eq!(err.code, DeliveryErrorCode::Transport);
    }

    #[tokio::test]
    async fn test_verify() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/scopes"))
            .and(header("authorization", "Bearer SG.good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "scopes": ["mail.send"] })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3/scopes"))
            .and(header("authorization", "Bearer SG.bad"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let good = SendGridAdapter::new("sg", &server.uri(), "SG.good", timeouts()).unwrap();
        assert!(good.verify().await.is_ok());

        let bad = SendGridAdapter::new("sg", &server.uri(), "SG.bad", timeouts()).unwrap();
        assert_eq!(
            bad.verify().await.unwrap_err().code,
            DeliveryErrorCode::AuthenticationFailed
        );
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let adapter = SendGridAdapter::new("sg", &url, "SG.x", timeouts()).unwrap();
        let err = adapter.send(&message()).await.unwrap_err();
        assert_eq!(err.code, DeliveryErrorCode::ConnectionRefused);
    }

    #[test]
    fn test_no_preflight() {
        let adapter = SendGridAdapter::new("sg", "http://localhost", "k", timeouts()).unwrap();
        assert!(!adapter.requires_preflight());
    }
}
