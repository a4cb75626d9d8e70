//! Email delivery providers.

use crate::config::env::{EnvResolver, EMAIL_API_KEY};
use crate::config::{EmailSettings, SmtpSettings};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport,
    AsyncTransport,
    Message,
    Tokio1Executor,
};
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Send error: {0}")]
    SendFailed(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Authentication error: {0}")]
    Authentication(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub provider_id: Option<String>,
    pub success: bool,
}

impl ProviderResponse {
    pub fn success(provider_id: Option<String>) -> Self {
        Self {
            provider_id,
            success: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub reply_to: Option<String>,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<ProviderResponse, ProviderError>;
    async fn health_check(&self) -> Result<(), ProviderError>;
    fn is_enabled(&self) -> bool;
}

fn record_provider_call(provider: &'static str, status: &'static str) {
    metrics::counter!("email_provider_calls_total", "provider" => provider, "status" => status)
        .increment(1);
}

/// JSON email API. The key is resolved on every send so rotation needs no restart.
pub struct HttpEmailProvider {
    client: reqwest::Client,
    api_base_url: String,
    from: String,
    resolver: EnvResolver,
}

#[derive(Debug, Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SendEmailReply {
    #[serde(default)]
    id: Option<String>,
}

impl HttpEmailProvider {
    pub fn new(settings: &EmailSettings, resolver: EnvResolver, client: reqwest::Client) -> Self {
        Self {
            client,
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            from: format!("{} <{}>", settings.from_name, settings.from_address),
            resolver,
        }
    }
}

#[async_trait]
impl EmailProvider for HttpEmailProvider {
    async fn send(&self, email: &EmailMessage) -> Result<ProviderResponse, ProviderError> {
        let api_key = self
            .resolver
            .require(EMAIL_API_KEY)
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        if email.body_html.is_none() && email.body_text.is_none() {
            return Err(ProviderError::SendFailed(
                "Email must have either text or HTML body".to_string(),
            ));
        }

        let body = SendEmailBody {
            from: &self.from,
            to: [email.to.as_str()],
            subject: &email.subject,
            html: email.body_html.as_deref(),
            text: email.body_text.as_deref(),
            reply_to: email.reply_to.as_deref(),
        };

        let response = self
            .client
            .traced_post(&format!("{}/emails", self.api_base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                record_provider_call("http", "connection_error");
                ProviderError::Connection(format!("Failed to reach email API: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            record_provider_call("http", "error");
            let detail = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ProviderError::Authentication(format!("Email API rejected key ({})", status))
                }
                StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(detail),
                StatusCode::UNPROCESSABLE_ENTITY => ProviderError::InvalidRecipient(detail),
                _ => ProviderError::SendFailed(format!(
                    "Email API returned error status {}: {}",
                    status, detail
                )),
            });
        }

        let reply: SendEmailReply = response.json().await.map_err(|e| {
            ProviderError::SendFailed(format!("Failed to parse email API response: {}", e))
        })?;
        record_provider_call("http", "success");

        tracing::info!(subject = %email.subject, provider_id = ?reply.id, "Email sent");
        Ok(ProviderResponse::success(reply.id))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.resolver
            .require(EMAIL_API_KEY)
            .map(|_| ())
            .map_err(|e| ProviderError::Configuration(e.to_string()))
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

pub struct SmtpProvider {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpProvider {
    pub fn new(smtp: &SmtpSettings, email: &EmailSettings) -> Result<Self, ProviderError> {
        let creds = Credentials::new(smtp.user.clone(), smtp.password.expose_secret().clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .map_err(|e| {
                ProviderError::Configuration(format!("Failed to create SMTP relay: {}", e))
            })?
            .port(smtp.port)
            .credentials(creds)
            .build();

        let from = format!("{} <{}>", email.from_name, email.from_address)
            .parse()
            .map_err(|e| ProviderError::Configuration(format!("Invalid from address: {}", e)))?;

        Ok(Self { from, transport })
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, email: &EmailMessage) -> Result<ProviderResponse, ProviderError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| ProviderError::InvalidRecipient(format!("Invalid recipient: {}", e)))?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject);

        if let Some(reply_to) = &email.reply_to {
            let mailbox: Mailbox = reply_to.parse().map_err(|e| {
                ProviderError::InvalidRecipient(format!("Invalid reply-to address: {}", e))
            })?;
            builder = builder.reply_to(mailbox);
        }

        let build_error = |e: lettre::error::Error| {
            ProviderError::SendFailed(format!("Failed to build message: {}", e))
        };

        let message = match (&email.body_text, &email.body_html) {
            (Some(text), Some(html)) => builder
                .multipart(MultiPart::alternative_plain_html(text.clone(), html.clone()))
                .map_err(build_error)?,
            (Some(text), None) => builder
                .singlepart(SinglePart::plain(text.clone()))
                .map_err(build_error)?,
            (None, Some(html)) => builder
                .header(ContentType::TEXT_HTML)
                .body(html.clone())
                .map_err(build_error)?,
            (None, None) => {
                return Err(ProviderError::SendFailed(
                    "Email must have either text or HTML body".to_string(),
                ));
            }
        };

        let response = self.transport.send(message).await.map_err(|e| {
            record_provider_call("smtp", "error");
            ProviderError::SendFailed(format!("Failed to send email: {}", e))
        })?;
        record_provider_call("smtp", "success");

        let provider_id = response.message().next().map(|s| s.to_string());
        tracing::info!(subject = %email.subject, "Email sent via SMTP");

        Ok(ProviderResponse::success(provider_id))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.transport.test_connection().await.map_err(|e| {
            ProviderError::Connection(format!("SMTP connection test failed: {}", e))
        })?;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Logs instead of sending. Keeps what it was asked to send for inspection.
#[derive(Default)]
pub struct MockEmailProvider {
    send_count: AtomicU64,
    sent: Mutex<Vec<EmailMessage>>,
}

impl MockEmailProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, email: &EmailMessage) -> Result<ProviderResponse, ProviderError> {
        let count = self.send_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }

        tracing::info!(subject = %email.subject, "[MOCK] Email would be sent");
        Ok(ProviderResponse::success(Some(format!("mock-email-{}", count))))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::MapEnv;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> EmailMessage {
        EmailMessage {
            to: "owner@example.com".to_string(),
            subject: "New enquiry".to_string(),
            body_text: Some("hello".to_string()),
            body_html: None,
            reply_to: Some("ada@example.com".to_string()),
        }
    }

    fn provider(base_url: &str, env: MapEnv) -> HttpEmailProvider {
        let settings = EmailSettings {
            api_base_url: base_url.to_string(),
            ..Default::default()
        };
        HttpEmailProvider::new(&settings, EnvResolver::new(Arc::new(env)), reqwest::Client::new())
    }

    #[tokio::test]
    async fn http_provider_posts_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer re_test"))
            .and(body_partial_json(serde_json::json!({
                "to": ["owner@example.com"],
                "reply_to": "ada@example.com"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "em_1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = provider(&server.uri(), MapEnv::new().with(EMAIL_API_KEY, "re_test"))
            .send(&message())
            .await
            .unwrap();
        assert_eq!(response.provider_id.as_deref(), Some("em_1"));
    }

    #[tokio::test]
    async fn http_provider_without_key_is_a_configuration_error() {
        let err = provider("http://127.0.0.1:9", MapEnv::new())
            .send(&message())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(msg) if msg.contains("EMAIL_API_KEY")));
    }

    #[tokio::test]
    async fn http_provider_maps_rejected_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = provider(&server.uri(), MapEnv::new().with(EMAIL_API_KEY, "bad"))
            .send(&message())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Authentication(_)));
    }

    #[tokio::test]
    async fn http_provider_health_needs_the_key() {
        let missing = provider("http://127.0.0.1:9", MapEnv::new());
        assert!(missing.is_enabled());
        assert!(matches!(
            missing.health_check().await,
            Err(ProviderError::Configuration(msg)) if msg.contains("EMAIL_API_KEY")
        ));

        let configured = provider(
            "http://127.0.0.1:9",
            MapEnv::new().with(EMAIL_API_KEY, "re_test"),
        );
        assert!(configured.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn mock_provider_records_messages() {
        let mock = MockEmailProvider::new();
        assert!(!mock.is_enabled());
        assert!(mock.health_check().await.is_ok());

        mock.send(&message()).await.unwrap();
        assert_eq!(mock.send_count(), 1);
        assert_eq!(mock.sent()[0].subject, "New enquiry");
    }
}
