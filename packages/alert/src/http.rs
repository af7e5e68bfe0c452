//! Transactional email delivery over HTTP.
//!
//! Posts `{"from", "to", "subject", "html"}` as JSON to the provider's send
//! endpoint with a bearer API key, the request shape shared by the common
//! hosted email APIs.

use std::time::Duration;

use serde::Serialize;

use crate::{AlertError, EmailMessage, EmailSender};

/// Bound on a single delivery request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Email sender backed by an HTTP API.
#[derive(Debug, Clone)]
pub struct HttpEmailSender {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpEmailSender {
    /// Creates a sender posting to `api_url` as `from`.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::NotConfigured`] if any setting is blank or the
    /// HTTP client cannot be built.
    pub fn new(api_url: &str, api_key: &str, from: &str) -> Result<Self, AlertError> {
        for (name, value) in [("API URL", api_url), ("API key", api_key), ("sender", from)] {
            if value.trim().is_empty() {
                return Err(AlertError::NotConfigured {
                    message: format!("email {name} is empty"),
                });
            }
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| AlertError::NotConfigured {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_url: api_url.trim().to_string(),
            api_key: api_key.trim().to_string(),
            from: from.trim().to_string(),
        })
    }
}

#[async_trait::async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), AlertError> {
        let request = SendRequest {
            from: &self.from,
            to: [&message.to],
            subject: &message.subject,
            html: &message.html,
        };

        let delivery_error = |detail: String| AlertError::Delivery {
            recipient: message.to.clone(),
            message: detail,
        };

        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| delivery_error(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            log::error!("Email provider rejected message to {}: HTTP {status}: {body}", message.to);
            return Err(delivery_error(format!("HTTP {status}: {body}")));
        }

        log::info!("Delivered alert email to {}", message.to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            to: "sam@example.com".to_string(),
            subject: "EMERGENCY SOS ALERT".to_string(),
            html: "<p>help</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn posts_message_with_bearer_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(json!({
                "from": "alerts@saferoute.test",
                "to": ["sam@example.com"],
                "subject": "EMERGENCY SOS ALERT",
                "html": "<p>help</p>"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "abc" })))
            .expect(1)
            .mount(&server)
            .await;

        let sender = HttpEmailSender::new(
            &format!("{}/emails", server.uri()),
            "secret",
            "alerts@saferoute.test",
        )
        .unwrap();
        sender.send(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn provider_rejection_is_a_delivery_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid recipient"))
            .mount(&server)
            .await;

        let sender = HttpEmailSender::new(&server.uri(), "secret", "alerts@saferoute.test").unwrap();
        let err = sender.send(&message()).await.unwrap_err();
        match err {
            AlertError::Delivery { recipient, message } => {
                assert_eq!(recipient, "sam@example.com");
                assert!(message.contains("422"));
                assert!(message.contains("invalid recipient"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_settings_are_rejected() {
        assert!(matches!(
            HttpEmailSender::new("", "key", "from@example.com"),
            Err(AlertError::NotConfigured { .. })
        ));
        assert!(matches!(
            HttpEmailSender::new("http://localhost", " ", "from@example.com"),
            Err(AlertError::NotConfigured { .. })
        ));
    }
}
