//! Email delivery.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::RenderedEmail;
use crate::error::{Error, Result};

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// Proof that a delivery provider accepted an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub provider: String,
    pub status: u16,
    pub message_id: Option<String>,
}

/// Sends a rendered email. Called at most once per run, without retries.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn send(&self, email: &RenderedEmail, recipient: &str) -> Result<DeliveryReceipt>;
}

/// SendGrid v3 request body.
///
/// Plain text goes first; SendGrid rejects other content orders.
pub fn sendgrid_payload(email: &RenderedEmail, from: &str, recipient: &str) -> Value {
    let mut content = Vec::new();
    if let Some(text) = &email.plain_text_fallback {
        content.push(json!({ "type": "text/plain", "value": text }));
    }
    content.push(json!({ "type": "text/html", "value": email.html }));
    json!({
        "personalizations": [{ "to": [{ "email": recipient }] }],
        "from": { "email": from },
        "subject": email.subject,
        "content": content,
    })
}

/// Delivery through the SendGrid API.
#[derive(Clone)]
pub struct SendGridDelivery {
    api_key: String,
    from_email: String,
    endpoint: String,
}

impl SendGridDelivery {
    pub fn new(api_key: impl Into<String>, from_email: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            from_email: from_email.into(),
            endpoint: SENDGRID_ENDPOINT.to_string(),
        }
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }
}

#[async_trait]
impl Delivery for SendGridDelivery {
    async fn send(&self, email: &RenderedEmail, recipient: &str) -> Result<DeliveryReceipt> {
        let payload = sendgrid_payload(email, &self.from_email, recipient);
        let url = self.endpoint.clone();
        let auth = format!("Bearer {}", self.api_key);

        let (status, message_id) = tokio::task::spawn_blocking(move || -> Result<(u16, Option<String>)> {
            let response = ureq::post(&url)
                .header("Authorization", &auth)
                .send_json(&payload)?;
            let message_id = response
                .headers()
                .get("X-Message-Id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            Ok((response.status().as_u16(), message_id))
        })
        .await
        .map_err(|e| Error::Delivery(format!("send task failed: {}", e)))?
        .map_err(|e| Error::Delivery(e.to_string()))?;

        info!(status, recipient, "email accepted by SendGrid");
        Ok(DeliveryReceipt {
            provider: "sendgrid".to_string(),
            status,
            message_id,
        })
    }
}

/// Delivery that records what it was asked to send.
#[cfg(test)]
pub(crate) struct RecordingDelivery {
    pub sent: std::sync::Mutex<Vec<(RenderedEmail, String)>>,
    fail: bool,
}

#[cfg(test)]
impl RecordingDelivery {
    pub fn new() -> Self {
        Self {
            sent: std::sync::Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            sent: std::sync::Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Delivery for RecordingDelivery {
    async fn send(&self, email: &RenderedEmail, recipient: &str) -> Result<DeliveryReceipt> {
        self.sent
            .lock()
            .unwrap()
            .push((email.clone(), recipient.to_string()));
        if self.fail {
            return Err(Error::Delivery("mailbox unavailable".to_string()));
        }
        Ok(DeliveryReceipt {
            provider: "recording".to_string(),
            status: 202,
            message_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> RenderedEmail {
        RenderedEmail {
            subject: "Brief".to_string(),
            html: "<p>hi</p>".to_string(),
            plain_text_fallback: Some("hi".to_string()),
        }
    }

    #[test]
    fn test_sendgrid_payload() {
        let payload = sendgrid_payload(&email(), "from@example.com", "to@example.com");
        assert_eq!(payload["personalizations"][0]["to"][0]["email"], "to@example.com");
        assert_eq!(payload["from"]["email"], "from@example.com");
        assert_eq!(payload["subject"], "Brief");
        assert_eq!(payload["content"][0]["type"], "text/plain");
        assert_eq!(payload["content"][1]["value"], "<p>hi</p>");
    }

    #[test]
    fn test_payload_without_fallback() {
        let mut email = email();
        email.plain_text_fallback = None;
        let payload = sendgrid_payload(&email, "a@b.co", "c@d.co");
        assert_eq!(payload["content"].as_array().unwrap().len(), 1);
        assert_eq!(payload["content"][0]["type"], "text/html");
    }

    #[tokio::test]
    async fn test_recording_delivery() {
        let delivery = RecordingDelivery::new();
        let receipt = delivery.send(&email(), "to@example.com").await.unwrap();
        assert_eq!(receipt.status, 202);
        assert_eq!(delivery.count(), 1);
        assert!(RecordingDelivery::failing().send(&email(), "x@y.z").await.is_err());
    }
}
